//! IMAP client connection.
//!
//! A single-state client over a framed stream. State bookkeeping (connected,
//! authenticated, examined) lives with the owner of the client; the client
//! itself only knows how to run the watcher's command subset and keep the
//! negotiated capability set current.

#![allow(clippy::missing_errors_doc)]

use tokio::io::{AsyncRead, AsyncWrite};

use super::framed::FramedStream;
use super::idle::{IdleHandle, MailboxUpdate};
use super::stream::ImapStream;
use crate::command::{Command, TagGenerator};
use crate::response::{
    Capability, MailboxStatus, Response, ResponseCode, Status, UntaggedResponse,
};
use crate::{Error, Result};

/// IMAP client connection.
pub struct Client<S> {
    pub(crate) stream: FramedStream<S>,
    pub(crate) tag_gen: TagGenerator,
    capabilities: Vec<Capability>,
}

impl<S> std::fmt::Debug for Client<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

/// Everything received up to and including a tagged completion.
pub(crate) struct CommandOutcome {
    /// Untagged responses received before the tagged line.
    pub untagged: Vec<UntaggedResponse>,
    /// Completion status.
    pub status: Status,
    /// Optional bracketed response code on the tagged line.
    pub code: Option<ResponseCode>,
    /// Human-readable completion text.
    pub text: String,
}

impl CommandOutcome {
    /// Maps NO/BAD completions to errors.
    fn check_ok(self) -> Result<Self> {
        match self.status {
            Status::Ok | Status::PreAuth => Ok(self),
            Status::No => Err(Error::No(self.text)),
            Status::Bad => Err(Error::Bad(self.text)),
            Status::Bye => Err(Error::Bye(self.text)),
        }
    }
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new client from a connected stream.
    ///
    /// Reads the server greeting; if the greeting does not carry a
    /// `[CAPABILITY ...]` code, an explicit CAPABILITY round is issued.
    pub async fn from_stream(stream: S) -> Result<Self> {
        let mut client = Self {
            stream: FramedStream::new(stream),
            tag_gen: TagGenerator::default(),
            capabilities: Vec::new(),
        };

        let greeting = client.stream.read_response().await?;
        match Response::parse(&greeting)? {
            Response::Untagged(UntaggedResponse::Status {
                status: Status::Ok | Status::PreAuth,
                code,
                ..
            }) => {
                if let Some(ResponseCode::Capability(caps)) = code {
                    client.capabilities = caps;
                }
            }
            Response::Untagged(UntaggedResponse::Status {
                status: Status::Bye,
                text,
                ..
            }) => return Err(Error::Bye(text)),
            other => {
                return Err(Error::Protocol(format!(
                    "unexpected greeting: {other:?}"
                )));
            }
        }

        if client.capabilities.is_empty() {
            client.refresh_capabilities().await?;
        }

        tracing::debug!(capabilities = %client.capability_list(), "IMAP greeting received");
        Ok(client)
    }

    /// Returns the negotiated capability set.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Returns true if the server supports IDLE (RFC 2177).
    #[must_use]
    pub fn supports_idle(&self) -> bool {
        self.capabilities.contains(&Capability::Idle)
    }

    /// Returns true if the server advertises STARTTLS.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.capabilities.contains(&Capability::StartTls)
    }

    /// Fails unless the server advertises STARTTLS.
    ///
    /// Callers that must not fall back to plaintext check this before
    /// upgrading.
    pub fn require_starttls(&self) -> Result<()> {
        if self.supports_starttls() {
            Ok(())
        } else {
            Err(Error::Protocol(
                "server does not advertise STARTTLS".to_string(),
            ))
        }
    }

    /// Issues a CAPABILITY command and stores the result.
    pub async fn refresh_capabilities(&mut self) -> Result<()> {
        let outcome = self.run(&Command::Capability).await?.check_ok()?;
        for untagged in outcome.untagged {
            if let UntaggedResponse::Capability(caps) = untagged {
                self.capabilities = caps;
            }
        }
        Ok(())
    }

    /// Authenticates with LOGIN.
    ///
    /// A NO completion is a credential rejection and maps to [`Error::Auth`].
    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let outcome = self
            .run(&Command::Login {
                username: username.to_string(),
                password: password.to_string(),
            })
            .await?;

        match outcome.status {
            Status::Ok | Status::PreAuth => {}
            Status::No => return Err(Error::Auth(outcome.text)),
            Status::Bad => return Err(Error::Bad(outcome.text)),
            Status::Bye => return Err(Error::Bye(outcome.text)),
        }

        // Servers commonly advertise a different capability set once
        // authenticated (IDLE in particular may only appear here). Take it
        // from the completion code or untagged data; ask only as a last
        // resort.
        let mut announced = false;
        if let Some(ResponseCode::Capability(caps)) = outcome.code {
            self.capabilities = caps;
            announced = true;
        }
        for untagged in outcome.untagged {
            if let UntaggedResponse::Capability(caps) = untagged {
                self.capabilities = caps;
                announced = true;
            }
        }
        if !announced {
            self.refresh_capabilities().await?;
        }

        tracing::debug!(username, "authenticated");
        Ok(())
    }

    /// Opens a mailbox read-only with EXAMINE.
    pub async fn examine(&mut self, mailbox: &str) -> Result<MailboxStatus> {
        let outcome = self
            .run(&Command::Examine {
                mailbox: mailbox.to_string(),
            })
            .await?
            .check_ok()?;

        let mut status = MailboxStatus::default();
        for untagged in &outcome.untagged {
            match untagged {
                UntaggedResponse::Exists(n) => status.exists = *n,
                UntaggedResponse::Recent(n) => status.recent = *n,
                UntaggedResponse::Status {
                    code: Some(ResponseCode::UidValidity(v)),
                    ..
                } => status.uid_validity = Some(*v),
                _ => {}
            }
        }
        if let Some(ResponseCode::UidValidity(v)) = outcome.code {
            status.uid_validity = Some(v);
        }

        tracing::debug!(mailbox, exists = status.exists, "mailbox examined");
        Ok(status)
    }

    /// Sends NOOP and returns any mailbox updates flushed by the server.
    pub async fn noop(&mut self) -> Result<Vec<MailboxUpdate>> {
        let outcome = self.run(&Command::Noop).await?.check_ok()?;
        Ok(collect_updates(&outcome.untagged))
    }

    /// Enters IDLE mode for push notifications.
    ///
    /// Check [`Self::supports_idle`] first. Call
    /// [`IdleHandle::done`](super::idle::IdleHandle::done) to exit.
    pub async fn idle(&mut self) -> Result<IdleHandle<'_, S>> {
        let tag = self.tag_gen.next();
        let cmd = Command::Idle.serialize(&tag);
        self.stream.write_command(&cmd).await?;

        loop {
            let response = self.stream.read_response().await?;
            match Response::parse(&response)? {
                Response::Continuation { .. } => {
                    return Ok(IdleHandle::new(&mut self.stream, tag));
                }
                Response::Tagged {
                    tag: t,
                    status,
                    text,
                    ..
                } if t == tag => {
                    return match status {
                        Status::No => Err(Error::No(text)),
                        Status::Bad => Err(Error::Bad(text)),
                        Status::Bye => Err(Error::Bye(text)),
                        _ => Err(Error::Protocol(
                            "unexpected completion of IDLE before continuation".to_string(),
                        )),
                    };
                }
                // Unsolicited responses may arrive before the continuation;
                // the IDLE wait will pick up anything that matters next.
                Response::Untagged(_) => {}
                Response::Tagged { tag: t, .. } => {
                    return Err(Error::Protocol(format!("unexpected tag {t} before IDLE")));
                }
            }
        }
    }

    /// Ends the session with LOGOUT.
    ///
    /// The server answers with an untagged BYE followed by a tagged OK;
    /// both shapes are accepted.
    pub async fn logout(&mut self) -> Result<()> {
        let tag = self.tag_gen.next();
        let cmd = Command::Logout.serialize(&tag);
        self.stream.write_command(&cmd).await?;

        loop {
            let response = self.stream.read_response().await?;
            match Response::parse(&response)? {
                Response::Tagged { tag: t, .. } if t == tag => return Ok(()),
                // BYE and other untagged responses are expected here.
                Response::Untagged(_) => {}
                other => {
                    return Err(Error::Protocol(format!(
                        "unexpected response to LOGOUT: {other:?}"
                    )));
                }
            }
        }
    }

    /// Runs a command to its tagged completion, collecting untagged responses.
    async fn run(&mut self, command: &Command) -> Result<CommandOutcome> {
        let tag = self.tag_gen.next();
        let cmd = command.serialize(&tag);
        self.stream.write_command(&cmd).await?;
        self.read_until_tagged(&tag).await
    }

    async fn read_until_tagged(&mut self, tag: &str) -> Result<CommandOutcome> {
        let mut untagged = Vec::new();

        loop {
            let response = self.stream.read_response().await?;
            match Response::parse(&response)? {
                Response::Untagged(UntaggedResponse::Status {
                    status: Status::Bye,
                    text,
                    ..
                }) => return Err(Error::Bye(text)),
                Response::Untagged(u) => untagged.push(u),
                Response::Tagged {
                    tag: t,
                    status,
                    code,
                    text,
                } => {
                    if t == tag {
                        return Ok(CommandOutcome {
                            untagged,
                            status,
                            code,
                            text,
                        });
                    }
                    return Err(Error::Protocol(format!(
                        "response tag mismatch: expected {tag}, got {t}"
                    )));
                }
                Response::Continuation { .. } => {
                    return Err(Error::Protocol(
                        "unexpected continuation request".to_string(),
                    ));
                }
            }
        }
    }

    fn capability_list(&self) -> String {
        self.capabilities
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Client<ImapStream> {
    /// Upgrades the connection to TLS with STARTTLS.
    ///
    /// Consumes the client because the transport is replaced underneath the
    /// framing. Capabilities are re-fetched afterwards; pre-upgrade values
    /// cannot be trusted.
    pub async fn starttls(mut self, host: &str) -> Result<Self> {
        self.run(&Command::StartTls).await?.check_ok()?;

        let plain = self.stream.into_inner();
        let tls = plain.upgrade_to_tls(host).await?;

        let mut client = Self {
            stream: FramedStream::new(tls),
            tag_gen: self.tag_gen,
            capabilities: Vec::new(),
        };
        client.refresh_capabilities().await?;

        tracing::debug!(host, "connection upgraded to TLS");
        Ok(client)
    }
}

/// Filters untagged responses down to mailbox updates, preserving order.
pub(crate) fn collect_updates(untagged: &[UntaggedResponse]) -> Vec<MailboxUpdate> {
    untagged
        .iter()
        .filter_map(MailboxUpdate::from_untagged)
        .collect()
}
