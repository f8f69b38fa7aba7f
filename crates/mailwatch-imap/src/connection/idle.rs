//! IMAP IDLE support (RFC 2177).
//!
//! IDLE lets the client block until the server pushes a mailbox change,
//! instead of polling. One round is: enter IDLE, wait (bounded), send DONE,
//! drain anything that raced the DONE. Updates seen while draining are
//! returned rather than discarded so that a burst of pushes (two EXISTS back
//! to back) never loses its tail.

#![allow(clippy::missing_errors_doc)]

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;

use super::framed::FramedStream;
use crate::command::Command;
use crate::response::{Flags, Response, Status, UntaggedResponse};
use crate::{Error, Result};

/// A mailbox change reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailboxUpdate {
    /// New total message count (EXISTS).
    Exists(u32),
    /// New recent message count (RECENT).
    Recent(u32),
    /// Message removed at the given sequence number (EXPUNGE).
    Expunge(u32),
    /// Flags changed on a message (unsolicited FETCH).
    FlagsChanged {
        /// Message sequence number.
        seq: u32,
        /// Updated flags.
        flags: Flags,
    },
}

impl MailboxUpdate {
    /// Converts an untagged response into an update, if it is one.
    #[must_use]
    pub fn from_untagged(untagged: &UntaggedResponse) -> Option<Self> {
        match untagged {
            UntaggedResponse::Exists(n) => Some(Self::Exists(*n)),
            UntaggedResponse::Recent(n) => Some(Self::Recent(*n)),
            UntaggedResponse::Expunge(seq) => Some(Self::Expunge(*seq)),
            UntaggedResponse::Fetch { seq, flags } => Some(Self::FlagsChanged {
                seq: *seq,
                flags: flags.clone(),
            }),
            _ => None,
        }
    }
}

/// Outcome of a bounded IDLE wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdleOutcome {
    /// The server pushed a mailbox update.
    Update(MailboxUpdate),
    /// The bound elapsed with nothing pushed. Normal; re-enter IDLE.
    Timeout,
}

/// Handle for an active IDLE round.
///
/// Holds the stream borrow for the duration of the round. Call
/// [`wait`](Self::wait) to block for one event, then [`done`](Self::done)
/// to exit IDLE mode.
pub struct IdleHandle<'a, S> {
    stream: &'a mut FramedStream<S>,
    tag: String,
}

impl<'a, S> IdleHandle<'a, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new IDLE handle.
    pub(crate) const fn new(stream: &'a mut FramedStream<S>, tag: String) -> Self {
        Self { stream, tag }
    }

    /// Waits for a server push or the bound to elapse.
    ///
    /// Servers are only obliged to keep an idle connection for 30 minutes
    /// and many drop it far earlier, so callers should keep the bound well
    /// under that.
    pub async fn wait(&mut self, bound: Duration) -> Result<IdleOutcome> {
        loop {
            match timeout(bound, self.stream.read_response()).await {
                Ok(Ok(response)) => {
                    if let Some(outcome) = self.interpret(&response)? {
                        return Ok(outcome);
                    }
                    // Irrelevant untagged chatter; keep waiting. The bound
                    // restarts, which only ever lengthens the round.
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => return Ok(IdleOutcome::Timeout),
            }
        }
    }

    /// Interprets one response received during IDLE.
    fn interpret(&self, response: &[u8]) -> Result<Option<IdleOutcome>> {
        match Response::parse(response)? {
            Response::Untagged(UntaggedResponse::Status {
                status: Status::Bye,
                text,
                ..
            }) => Err(Error::Bye(text)),
            Response::Untagged(untagged) => {
                Ok(MailboxUpdate::from_untagged(&untagged).map(IdleOutcome::Update))
            }
            Response::Continuation { .. } => Err(Error::Protocol(
                "unexpected continuation during IDLE".to_string(),
            )),
            Response::Tagged {
                tag, status, text, ..
            } => {
                if tag == self.tag {
                    match status {
                        // Server ended the round on its own. Unusual but valid.
                        Status::Ok => Ok(Some(IdleOutcome::Timeout)),
                        Status::No => Err(Error::No(text)),
                        Status::Bad => Err(Error::Bad(text)),
                        Status::Bye => Err(Error::Bye(text)),
                        Status::PreAuth => {
                            Err(Error::Protocol("unexpected PREAUTH in IDLE".to_string()))
                        }
                    }
                } else {
                    Err(Error::Protocol(format!(
                        "unexpected tag {tag} during IDLE"
                    )))
                }
            }
        }
    }

    /// Exits IDLE mode by sending DONE.
    ///
    /// Returns any updates the server pushed between our DONE and its tagged
    /// completion; the caller must deliver them like any other push.
    pub async fn done(self) -> Result<Vec<MailboxUpdate>> {
        let cmd = Command::Done.serialize("");
        self.stream.write_command(&cmd).await?;

        let mut drained = Vec::new();
        loop {
            let response = self.stream.read_response().await?;
            match Response::parse(&response)? {
                Response::Untagged(UntaggedResponse::Status {
                    status: Status::Bye,
                    text,
                    ..
                }) => return Err(Error::Bye(text)),
                Response::Untagged(untagged) => {
                    if let Some(update) = MailboxUpdate::from_untagged(&untagged) {
                        drained.push(update);
                    }
                }
                Response::Tagged {
                    tag, status, text, ..
                } if tag == self.tag => {
                    return match status {
                        Status::Ok => Ok(drained),
                        Status::No => Err(Error::No(text)),
                        Status::Bad => Err(Error::Bad(text)),
                        Status::Bye => Err(Error::Bye(text)),
                        Status::PreAuth => {
                            Err(Error::Protocol("unexpected PREAUTH after DONE".to_string()))
                        }
                    };
                }
                other => {
                    return Err(Error::Protocol(format!(
                        "unexpected response after DONE: {other:?}"
                    )));
                }
            }
        }
    }
}
