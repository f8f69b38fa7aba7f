//! Server response model and line parser.
//!
//! Covers the response subset a mailbox watcher can receive: the greeting,
//! CAPABILITY data, tagged completions, and the unsolicited EXISTS / RECENT /
//! EXPUNGE / FETCH responses that drive change notifications. Everything else
//! is preserved as [`UntaggedResponse::Other`] so callers can log it.

use crate::{Error, Result};

/// Response status from a tagged response or status-style untagged response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Command completed successfully.
    Ok,
    /// Command failed (operational error).
    No,
    /// Command failed (protocol/syntax error).
    Bad,
    /// Server greeting (pre-authenticated).
    PreAuth,
    /// Server is closing connection.
    Bye,
}

impl Status {
    /// Returns true if this is a successful status.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok | Self::PreAuth)
    }

    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "OK" => Some(Self::Ok),
            "NO" => Some(Self::No),
            "BAD" => Some(Self::Bad),
            "PREAUTH" => Some(Self::PreAuth),
            "BYE" => Some(Self::Bye),
            _ => None,
        }
    }
}

/// Server capability.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `IMAP4rev1` (RFC 3501)
    Imap4Rev1,
    /// `IMAP4rev2` (RFC 9051)
    Imap4Rev2,
    /// IDLE command support (RFC 2177)
    Idle,
    /// STARTTLS support
    StartTls,
    /// LOGIN disabled
    LoginDisabled,
    /// AUTH mechanism
    Auth(String),
    /// Unknown capability
    Unknown(String),
}

impl Capability {
    /// Parses a capability string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let upper = s.to_uppercase();
        match upper.as_str() {
            "IMAP4REV1" => Self::Imap4Rev1,
            "IMAP4REV2" => Self::Imap4Rev2,
            "IDLE" => Self::Idle,
            "STARTTLS" => Self::StartTls,
            "LOGINDISABLED" => Self::LoginDisabled,
            _ if upper.starts_with("AUTH=") => Self::Auth(s[5..].to_string()),
            _ => Self::Unknown(s.to_string()),
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Imap4Rev1 => write!(f, "IMAP4rev1"),
            Self::Imap4Rev2 => write!(f, "IMAP4rev2"),
            Self::Idle => write!(f, "IDLE"),
            Self::StartTls => write!(f, "STARTTLS"),
            Self::LoginDisabled => write!(f, "LOGINDISABLED"),
            Self::Auth(mech) => write!(f, "AUTH={mech}"),
            Self::Unknown(s) => write!(f, "{s}"),
        }
    }
}

/// Message flags.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Flag {
    /// Message has been read.
    Seen,
    /// Message has been answered.
    Answered,
    /// Message is flagged for special attention.
    Flagged,
    /// Message is marked for deletion.
    Deleted,
    /// Message is a draft.
    Draft,
    /// Message is recent (first session to see it).
    Recent,
    /// Custom keyword flag.
    Keyword(String),
}

impl Flag {
    /// Parses a flag string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "\\SEEN" => Self::Seen,
            "\\ANSWERED" => Self::Answered,
            "\\FLAGGED" => Self::Flagged,
            "\\DELETED" => Self::Deleted,
            "\\DRAFT" => Self::Draft,
            "\\RECENT" => Self::Recent,
            _ => Self::Keyword(s.to_string()),
        }
    }

    /// Returns the flag as an IMAP string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Seen => "\\Seen",
            Self::Answered => "\\Answered",
            Self::Flagged => "\\Flagged",
            Self::Deleted => "\\Deleted",
            Self::Draft => "\\Draft",
            Self::Recent => "\\Recent",
            Self::Keyword(s) => s,
        }
    }
}

impl std::fmt::Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Collection of message flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flags {
    flags: Vec<Flag>,
}

impl Flags {
    /// Creates an empty flags collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates flags from a vector.
    #[must_use]
    pub fn from_vec(flags: Vec<Flag>) -> Self {
        Self { flags }
    }

    /// Returns true if the flag is present.
    #[must_use]
    pub fn contains(&self, flag: &Flag) -> bool {
        self.flags.contains(flag)
    }

    /// Returns true if there are no flags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Iterates over the flags.
    pub fn iter(&self) -> std::slice::Iter<'_, Flag> {
        self.flags.iter()
    }
}

impl std::fmt::Display for Flags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, flag) in self.flags.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{flag}")?;
        }
        Ok(())
    }
}

/// Mailbox state reported by EXAMINE.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MailboxStatus {
    /// Total number of messages (EXISTS).
    pub exists: u32,
    /// Number of recent messages (RECENT).
    pub recent: u32,
    /// UID validity value, if reported.
    pub uid_validity: Option<u32>,
}

/// Response code carried in brackets after a status keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// `[CAPABILITY ...]`
    Capability(Vec<Capability>),
    /// `[UIDVALIDITY n]`
    UidValidity(u32),
    /// Any other code, kept verbatim.
    Other(String),
}

impl ResponseCode {
    fn parse(code: &str) -> Self {
        let mut parts = code.split_ascii_whitespace();
        match parts.next().map(str::to_ascii_uppercase).as_deref() {
            Some("CAPABILITY") => Self::Capability(parts.map(Capability::parse).collect()),
            Some("UIDVALIDITY") => parts
                .next()
                .and_then(|n| n.parse().ok())
                .map_or_else(|| Self::Other(code.to_string()), Self::UidValidity),
            _ => Self::Other(code.to_string()),
        }
    }
}

/// An untagged (`*`) server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntaggedResponse {
    /// `* CAPABILITY ...` data.
    Capability(Vec<Capability>),
    /// `* n EXISTS` - total message count.
    Exists(u32),
    /// `* n RECENT` - recent message count.
    Recent(u32),
    /// `* n EXPUNGE` - message removed at sequence number n.
    Expunge(u32),
    /// `* n FETCH (FLAGS (...))` - unsolicited flag change.
    Fetch {
        /// Message sequence number.
        seq: u32,
        /// Updated flags.
        flags: Flags,
    },
    /// Status-style untagged response (OK/NO/BAD/BYE/PREAUTH).
    Status {
        /// Status keyword.
        status: Status,
        /// Optional bracketed response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// Anything else (LIST, FLAGS, SEARCH, ...), kept verbatim.
    Other(String),
}

/// A parsed server response line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Untagged response.
    Untagged(UntaggedResponse),
    /// Tagged command completion.
    Tagged {
        /// The command tag.
        tag: String,
        /// Completion status.
        status: Status,
        /// Optional bracketed response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// Continuation request (`+`).
    Continuation {
        /// Text after the `+`.
        text: String,
    },
}

impl Response {
    /// Parses a single response line (CRLF already stripped or not).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the line is not a recognizable IMAP
    /// response.
    pub fn parse(line: &[u8]) -> Result<Self> {
        let line = String::from_utf8_lossy(line);
        let line = line.trim_end_matches(['\r', '\n']);

        if let Some(rest) = line.strip_prefix('+') {
            return Ok(Self::Continuation {
                text: rest.trim_start().to_string(),
            });
        }

        if let Some(rest) = line.strip_prefix("* ") {
            return Ok(Self::Untagged(parse_untagged(rest)));
        }

        // Tagged: "tag SP status SP [code] text"
        let (tag, rest) = line
            .split_once(' ')
            .ok_or_else(|| Error::Protocol(format!("malformed response line: {line:?}")))?;
        let (status_word, text) = rest.split_once(' ').unwrap_or((rest, ""));
        let status = Status::parse(status_word)
            .ok_or_else(|| Error::Protocol(format!("unknown response status: {status_word:?}")))?;
        let (code, text) = split_response_code(text);

        Ok(Self::Tagged {
            tag: tag.to_string(),
            status,
            code,
            text,
        })
    }
}

fn parse_untagged(rest: &str) -> UntaggedResponse {
    let (first, remainder) = rest.split_once(' ').unwrap_or((rest, ""));

    // Numeric responses: "* 23 EXISTS", "* 4 EXPUNGE", "* 12 FETCH (...)"
    if let Ok(n) = first.parse::<u32>() {
        let (keyword, args) = remainder.split_once(' ').unwrap_or((remainder, ""));
        return match keyword.to_ascii_uppercase().as_str() {
            "EXISTS" => UntaggedResponse::Exists(n),
            "RECENT" => UntaggedResponse::Recent(n),
            "EXPUNGE" => UntaggedResponse::Expunge(n),
            "FETCH" => UntaggedResponse::Fetch {
                seq: n,
                flags: parse_fetch_flags(args),
            },
            _ => UntaggedResponse::Other(rest.to_string()),
        };
    }

    match first.to_ascii_uppercase().as_str() {
        "CAPABILITY" => UntaggedResponse::Capability(
            remainder
                .split_ascii_whitespace()
                .map(Capability::parse)
                .collect(),
        ),
        _ => {
            if let Some(status) = Status::parse(first) {
                let (code, text) = split_response_code(remainder);
                UntaggedResponse::Status { status, code, text }
            } else {
                UntaggedResponse::Other(rest.to_string())
            }
        }
    }
}

/// Splits an optional leading `[code]` off a status text.
fn split_response_code(text: &str) -> (Option<ResponseCode>, String) {
    let trimmed = text.trim_start();
    if let Some(rest) = trimmed.strip_prefix('[')
        && let Some(end) = rest.find(']')
    {
        let code = ResponseCode::parse(&rest[..end]);
        let text = rest[end + 1..].trim_start().to_string();
        return (Some(code), text);
    }
    (None, trimmed.to_string())
}

/// Extracts the FLAGS list from FETCH arguments like `(FLAGS (\Seen \Old))`.
fn parse_fetch_flags(args: &str) -> Flags {
    let upper = args.to_ascii_uppercase();
    let Some(start) = upper.find("FLAGS (") else {
        return Flags::new();
    };
    let list_start = start + "FLAGS (".len();
    let Some(len) = args[list_start..].find(')') else {
        return Flags::new();
    };
    Flags::from_vec(
        args[list_start..list_start + len]
            .split_ascii_whitespace()
            .map(Flag::parse)
            .collect(),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_greeting_with_capability_code() {
        let parsed = Response::parse(b"* OK [CAPABILITY IMAP4rev1 IDLE STARTTLS] ready\r\n")
            .unwrap();
        match parsed {
            Response::Untagged(UntaggedResponse::Status {
                status,
                code: Some(ResponseCode::Capability(caps)),
                text,
            }) => {
                assert_eq!(status, Status::Ok);
                assert!(caps.contains(&Capability::Idle));
                assert!(caps.contains(&Capability::StartTls));
                assert_eq!(text, "ready");
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_parse_capability_data() {
        let parsed = Response::parse(b"* CAPABILITY IMAP4rev1 AUTH=PLAIN IDLE\r\n").unwrap();
        match parsed {
            Response::Untagged(UntaggedResponse::Capability(caps)) => {
                assert!(caps.contains(&Capability::Imap4Rev1));
                assert!(caps.contains(&Capability::Auth("PLAIN".to_string())));
                assert!(caps.contains(&Capability::Idle));
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_parse_exists() {
        let parsed = Response::parse(b"* 23 EXISTS\r\n").unwrap();
        assert_eq!(parsed, Response::Untagged(UntaggedResponse::Exists(23)));
    }

    #[test]
    fn test_parse_expunge() {
        let parsed = Response::parse(b"* 4 EXPUNGE\r\n").unwrap();
        assert_eq!(parsed, Response::Untagged(UntaggedResponse::Expunge(4)));
    }

    #[test]
    fn test_parse_fetch_flags() {
        let parsed = Response::parse(b"* 12 FETCH (FLAGS (\\Seen custom))\r\n").unwrap();
        match parsed {
            Response::Untagged(UntaggedResponse::Fetch { seq, flags }) => {
                assert_eq!(seq, 12);
                assert!(flags.contains(&Flag::Seen));
                assert!(flags.contains(&Flag::Keyword("custom".to_string())));
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_parse_fetch_without_flags_list() {
        let parsed = Response::parse(b"* 7 FETCH (UID 1001)\r\n").unwrap();
        match parsed {
            Response::Untagged(UntaggedResponse::Fetch { seq, flags }) => {
                assert_eq!(seq, 7);
                assert!(flags.is_empty());
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_parse_tagged_ok_with_code() {
        let parsed = Response::parse(b"A0003 OK [UIDVALIDITY 857529045] done\r\n").unwrap();
        match parsed {
            Response::Tagged {
                tag,
                status,
                code: Some(ResponseCode::UidValidity(v)),
                text,
            } => {
                assert_eq!(tag, "A0003");
                assert_eq!(status, Status::Ok);
                assert_eq!(v, 857_529_045);
                assert_eq!(text, "done");
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_parse_tagged_no() {
        let parsed = Response::parse(b"A0001 NO LOGIN failed\r\n").unwrap();
        match parsed {
            Response::Tagged { status, text, .. } => {
                assert_eq!(status, Status::No);
                assert_eq!(text, "LOGIN failed");
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_parse_continuation() {
        let parsed = Response::parse(b"+ idling\r\n").unwrap();
        assert_eq!(
            parsed,
            Response::Continuation {
                text: "idling".to_string()
            }
        );
    }

    #[test]
    fn test_parse_bye() {
        let parsed = Response::parse(b"* BYE server shutting down\r\n").unwrap();
        match parsed {
            Response::Untagged(UntaggedResponse::Status { status, text, .. }) => {
                assert_eq!(status, Status::Bye);
                assert_eq!(text, "server shutting down");
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_parse_unknown_untagged_is_other() {
        let parsed = Response::parse(b"* LIST (\\HasNoChildren) \".\" INBOX\r\n").unwrap();
        assert!(matches!(
            parsed,
            Response::Untagged(UntaggedResponse::Other(_))
        ));
    }

    #[test]
    fn test_parse_garbage_is_error() {
        assert!(Response::parse(b"garbage\r\n").is_err());
    }

    #[test]
    fn test_flag_roundtrip() {
        for s in ["\\Seen", "\\Answered", "\\Flagged", "\\Deleted", "\\Draft"] {
            assert_eq!(Flag::parse(s).as_str(), s);
        }
    }
}
