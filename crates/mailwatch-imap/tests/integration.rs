//! Integration tests for the IMAP client.
//!
//! These tests use a mock stream to simulate IMAP server responses
//! without requiring a real server connection.

#![allow(clippy::unwrap_used)]

use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use mailwatch_imap::{Capability, Client, Error, Flag, IdleOutcome, MailboxUpdate};

/// Mock stream that returns predefined responses.
struct MockStream {
    /// Responses to return (in order).
    responses: Cursor<Vec<u8>>,
    /// Captured commands sent by the client (shared with the test).
    sent: Arc<Mutex<Vec<u8>>>,
}

impl MockStream {
    fn new(responses: &[u8]) -> Self {
        Self {
            responses: Cursor::new(responses.to_vec()),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn sent_log(&self) -> SentLog {
        SentLog(Arc::clone(&self.sent))
    }
}

/// Test-side view of everything the client wrote.
struct SentLog(Arc<Mutex<Vec<u8>>>);

impl SentLog {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl AsyncRead for MockStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let data = self.responses.get_ref();
        let pos = usize::try_from(self.responses.position()).unwrap();

        if pos >= data.len() {
            return Poll::Ready(Ok(()));
        }

        let remaining = &data[pos..];
        let to_read = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..to_read]);
        self.responses.set_position((pos + to_read) as u64);

        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.sent.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[tokio::test]
async fn test_greeting_with_capability_code() {
    let stream = MockStream::new(b"* OK [CAPABILITY IMAP4rev1 IDLE] ready\r\n");
    let client = Client::from_stream(stream).await.unwrap();

    assert!(client.supports_idle());
    assert!(client.capabilities().contains(&Capability::Imap4Rev1));
}

#[tokio::test]
async fn test_greeting_without_code_triggers_capability_round() {
    let stream = MockStream::new(
        b"* OK ready\r\n\
          * CAPABILITY IMAP4rev1 STARTTLS\r\n\
          A0000 OK done\r\n",
    );
    let client = Client::from_stream(stream).await.unwrap();

    assert!(client.supports_starttls());
    assert!(!client.supports_idle());
}

#[tokio::test]
async fn test_bye_greeting_is_error() {
    let stream = MockStream::new(b"* BYE overloaded\r\n");
    assert!(matches!(
        Client::from_stream(stream).await,
        Err(Error::Bye(_))
    ));
}

#[tokio::test]
async fn test_login_ok_refreshes_capabilities() {
    let stream = MockStream::new(
        b"* OK [CAPABILITY IMAP4rev1] ready\r\n\
          * CAPABILITY IMAP4rev1 IDLE\r\n\
          A0000 OK logged in\r\n",
    );
    let mut client = Client::from_stream(stream).await.unwrap();
    client.login("user@example.com", "secret").await.unwrap();

    // IDLE only appeared post-login.
    assert!(client.supports_idle());
}

#[tokio::test]
async fn test_login_rejected_is_auth_error() {
    let stream = MockStream::new(
        b"* OK [CAPABILITY IMAP4rev1] ready\r\n\
          A0000 NO [AUTHENTICATIONFAILED] bad credentials\r\n",
    );
    let mut client = Client::from_stream(stream).await.unwrap();

    let err = client.login("user", "wrong").await.unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
}

#[tokio::test]
async fn test_examine_parses_status() {
    let stream = MockStream::new(
        b"* OK [CAPABILITY IMAP4rev1 IDLE] ready\r\n\
          * 17 EXISTS\r\n\
          * 2 RECENT\r\n\
          * OK [UIDVALIDITY 857529045] UIDs valid\r\n\
          A0000 OK [READ-ONLY] EXAMINE completed\r\n",
    );
    let mut client = Client::from_stream(stream).await.unwrap();
    let status = client.examine("INBOX").await.unwrap();

    assert_eq!(status.exists, 17);
    assert_eq!(status.recent, 2);
    assert_eq!(status.uid_validity, Some(857_529_045));
}

#[tokio::test]
async fn test_idle_round_returns_pushed_update() {
    let stream = MockStream::new(
        b"* OK [CAPABILITY IMAP4rev1 IDLE] ready\r\n\
          + idling\r\n\
          * 18 EXISTS\r\n\
          A0000 OK IDLE terminated\r\n",
    );
    let mut client = Client::from_stream(stream).await.unwrap();

    let mut handle = client.idle().await.unwrap();
    let outcome = handle.wait(Duration::from_secs(60)).await.unwrap();
    assert_eq!(outcome, IdleOutcome::Update(MailboxUpdate::Exists(18)));
    let drained = handle.done().await.unwrap();
    assert!(drained.is_empty());
}

#[tokio::test]
async fn test_idle_done_drains_burst() {
    // Two EXISTS arrive back to back; the second races our DONE and must
    // still be delivered.
    let stream = MockStream::new(
        b"* OK [CAPABILITY IMAP4rev1 IDLE] ready\r\n\
          + idling\r\n\
          * 18 EXISTS\r\n\
          * 19 EXISTS\r\n\
          A0000 OK IDLE terminated\r\n",
    );
    let mut client = Client::from_stream(stream).await.unwrap();

    let mut handle = client.idle().await.unwrap();
    let outcome = handle.wait(Duration::from_secs(60)).await.unwrap();
    assert_eq!(outcome, IdleOutcome::Update(MailboxUpdate::Exists(18)));
    let drained = handle.done().await.unwrap();
    assert_eq!(drained, vec![MailboxUpdate::Exists(19)]);
}

#[tokio::test]
async fn test_idle_rejected_when_unsupported() {
    let stream = MockStream::new(
        b"* OK [CAPABILITY IMAP4rev1] ready\r\n\
          A0000 BAD unknown command\r\n",
    );
    let mut client = Client::from_stream(stream).await.unwrap();

    assert!(matches!(client.idle().await, Err(Error::Bad(_))));
}

#[tokio::test]
async fn test_noop_flushes_updates() {
    let stream = MockStream::new(
        b"* OK [CAPABILITY IMAP4rev1] ready\r\n\
          * 3 EXPUNGE\r\n\
          * 12 FETCH (FLAGS (\\Seen))\r\n\
          A0000 OK NOOP completed\r\n",
    );
    let mut client = Client::from_stream(stream).await.unwrap();
    let updates = client.noop().await.unwrap();

    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0], MailboxUpdate::Expunge(3));
    match &updates[1] {
        MailboxUpdate::FlagsChanged { seq, flags } => {
            assert_eq!(*seq, 12);
            assert!(flags.contains(&Flag::Seen));
        }
        other => panic!("unexpected update: {other:?}"),
    }
}

#[tokio::test]
async fn test_starttls_required_but_not_advertised() {
    let stream = MockStream::new(b"* OK [CAPABILITY IMAP4rev1 IDLE] ready\r\n");
    let client = Client::from_stream(stream).await.unwrap();

    assert!(!client.supports_starttls());
    let err = client.require_starttls().unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
    assert!(err.to_string().contains("STARTTLS"));
}

#[tokio::test]
async fn test_starttls_advertised_passes_requirement() {
    let stream = MockStream::new(b"* OK [CAPABILITY IMAP4rev1 STARTTLS] ready\r\n");
    let client = Client::from_stream(stream).await.unwrap();

    client.require_starttls().unwrap();
}

#[tokio::test]
async fn test_logout_accepts_bye() {
    let stream = MockStream::new(
        b"* OK [CAPABILITY IMAP4rev1] ready\r\n\
          * BYE logging out\r\n\
          A0000 OK LOGOUT completed\r\n",
    );
    let mut client = Client::from_stream(stream).await.unwrap();
    client.logout().await.unwrap();
}

#[tokio::test]
async fn test_login_command_quotes_secret() {
    let stream = MockStream::new(
        b"* OK [CAPABILITY IMAP4rev1 IDLE] ready\r\n\
          A0000 OK [CAPABILITY IMAP4rev1 IDLE] logged in\r\n",
    );
    let sent = stream.sent_log();
    let mut client = Client::from_stream(stream).await.unwrap();
    client.login("user@example.com", "p w").await.unwrap();

    assert_eq!(sent.text(), "A0000 LOGIN user@example.com \"p w\"\r\n");
}

#[tokio::test]
async fn test_truncated_stream_is_io_error() {
    let stream = MockStream::new(b"* OK [CAPABILITY IMAP4rev1] ready\r\n");
    let mut client = Client::from_stream(stream).await.unwrap();

    // No more scripted responses: NOOP hits EOF.
    assert!(matches!(client.noop().await, Err(Error::Io(_))));
}

mod astring_props {
    use proptest::prelude::*;

    use mailwatch_imap::Command;

    proptest! {
        #[test]
        fn plain_atoms_pass_through(user in "[A-Za-z0-9@._-]{1,32}") {
            let cmd = Command::Login {
                username: user.clone(),
                password: "x".to_string(),
            }
            .serialize("A0001");
            let text = String::from_utf8(cmd).unwrap();
            prop_assert_eq!(text, format!("A0001 LOGIN {} x\r\n", user));
        }

        #[test]
        fn specials_are_quoted(pass in "[A-Za-z0-9 \"()*%]{1,32}") {
            prop_assume!(pass.contains([' ', '"', '(', ')', '*', '%']));
            let cmd = Command::Login {
                username: "user".to_string(),
                password: pass,
            }
            .serialize("A0001");
            let text = String::from_utf8(cmd).unwrap();
            let rest = text.strip_prefix("A0001 LOGIN user ").unwrap();
            prop_assert!(rest.starts_with('"'));
            prop_assert!(rest.ends_with("\"\r\n"));
        }
    }
}
