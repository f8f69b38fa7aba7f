//! IMAP command builders and tag generation.
//!
//! Only the commands a mailbox watcher needs are modeled: capability
//! negotiation, STARTTLS, LOGIN, read-only mailbox selection, IDLE/DONE,
//! NOOP keep-alives and LOGOUT.

use std::sync::atomic::{AtomicU32, Ordering};

/// An IMAP command.
///
/// `Debug` redacts the LOGIN password; only `serialize` ever sees it.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// CAPABILITY - request server capabilities.
    Capability,
    /// STARTTLS - upgrade a plaintext connection to TLS (RFC 3501 §6.2.1).
    StartTls,
    /// LOGIN - authenticate with username and password.
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// EXAMINE - select a mailbox read-only.
    Examine {
        /// Mailbox name.
        mailbox: String,
    },
    /// NOOP - keep-alive; also flushes pending unsolicited responses.
    Noop,
    /// IDLE - enter idle mode for push notifications (RFC 2177).
    Idle,
    /// DONE - exit idle mode (sent without a tag).
    Done,
    /// LOGOUT - end the session gracefully.
    Logout,
}

impl Command {
    /// Serializes the command with the given tag into wire format.
    #[must_use]
    pub fn serialize(&self, tag: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64);

        // DONE is the continuation terminator for IDLE and carries no tag.
        if !matches!(self, Self::Done) {
            buf.extend_from_slice(tag.as_bytes());
            buf.push(b' ');
        }

        match self {
            Self::Capability => buf.extend_from_slice(b"CAPABILITY"),
            Self::StartTls => buf.extend_from_slice(b"STARTTLS"),
            Self::Login { username, password } => {
                buf.extend_from_slice(b"LOGIN ");
                write_astring(&mut buf, username);
                buf.push(b' ');
                write_astring(&mut buf, password);
            }
            Self::Examine { mailbox } => {
                buf.extend_from_slice(b"EXAMINE ");
                write_astring(&mut buf, mailbox);
            }
            Self::Noop => buf.extend_from_slice(b"NOOP"),
            Self::Idle => buf.extend_from_slice(b"IDLE"),
            Self::Done => buf.extend_from_slice(b"DONE"),
            Self::Logout => buf.extend_from_slice(b"LOGOUT"),
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Capability => f.write_str("Capability"),
            Self::StartTls => f.write_str("StartTls"),
            Self::Login { username, .. } => f
                .debug_struct("Login")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Examine { mailbox } => {
                f.debug_struct("Examine").field("mailbox", mailbox).finish()
            }
            Self::Noop => f.write_str("Noop"),
            Self::Idle => f.write_str("Idle"),
            Self::Done => f.write_str("Done"),
            Self::Logout => f.write_str("Logout"),
        }
    }
}

/// Writes an astring (atom or quoted string).
pub fn write_astring(buf: &mut Vec<u8>, s: &str) {
    if s.is_empty() || s.bytes().any(needs_quoting) {
        buf.push(b'"');
        for b in s.bytes() {
            if b == b'"' || b == b'\\' {
                buf.push(b'\\');
            }
            buf.push(b);
        }
        buf.push(b'"');
    } else {
        buf.extend_from_slice(s.as_bytes());
    }
}

/// Returns true if the byte needs quoting.
const fn needs_quoting(b: u8) -> bool {
    matches!(b, b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*') || b < 0x20 || b == 0x7F
}

/// Tag generator for IMAP commands.
///
/// Generates unique sequential tags in the format "A0001", "A0002", etc.
/// Tags are used to match commands with their responses.
#[derive(Debug)]
pub struct TagGenerator {
    counter: AtomicU32,
    prefix: char,
}

impl TagGenerator {
    /// Creates a new tag generator with the given prefix.
    #[must_use]
    pub const fn new(prefix: char) -> Self {
        Self {
            counter: AtomicU32::new(0),
            prefix,
        }
    }

    /// Generates the next tag.
    #[must_use]
    pub fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}{:04}", self.prefix, n)
    }

    /// Returns the current counter value without incrementing.
    #[must_use]
    pub fn current(&self) -> u32 {
        self.counter.load(Ordering::Relaxed)
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new('A')
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_capability() {
        let cmd = Command::Capability.serialize("A0000");
        assert_eq!(cmd, b"A0000 CAPABILITY\r\n");
    }

    #[test]
    fn test_serialize_login_plain_atoms() {
        let cmd = Command::Login {
            username: "user".to_string(),
            password: "hunter2".to_string(),
        }
        .serialize("A0001");
        assert_eq!(cmd, b"A0001 LOGIN user hunter2\r\n");
    }

    #[test]
    fn test_serialize_login_quotes_specials() {
        let cmd = Command::Login {
            username: "user@example.com".to_string(),
            password: "pass word \"x\"".to_string(),
        }
        .serialize("A0001");
        assert_eq!(
            cmd,
            b"A0001 LOGIN user@example.com \"pass word \\\"x\\\"\"\r\n"
        );
    }

    #[test]
    fn test_serialize_examine() {
        let cmd = Command::Examine {
            mailbox: "INBOX".to_string(),
        }
        .serialize("A0002");
        assert_eq!(cmd, b"A0002 EXAMINE INBOX\r\n");
    }

    #[test]
    fn test_serialize_done_has_no_tag() {
        let cmd = Command::Done.serialize("A0009");
        assert_eq!(cmd, b"DONE\r\n");
    }

    #[test]
    fn test_debug_redacts_password() {
        let cmd = Command::Login {
            username: "user@example.com".to_string(),
            password: "hunter2".to_string(),
        };
        let debug = format!("{cmd:?}");
        assert!(debug.contains("user@example.com"));
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_tag_generator_sequence() {
        let tags = TagGenerator::default();
        assert_eq!(tags.next(), "A0000");
        assert_eq!(tags.next(), "A0001");
        assert_eq!(tags.current(), 2);
    }

    #[test]
    fn test_astring_empty_is_quoted() {
        let mut buf = Vec::new();
        write_astring(&mut buf, "");
        assert_eq!(buf, b"\"\"");
    }
}
