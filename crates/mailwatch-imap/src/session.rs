//! In-place mutable IMAP session.
//!
//! One [`Session`] instance lives for the whole lifetime of its owner and is
//! mutated through connect/authenticate/disconnect transitions, never
//! replaced. Reconnection after a transport failure reuses the same
//! instance: a fatal error drops the dead transport so the next `connect`
//! starts clean.
//!
//! The session deliberately has no retry or reconnect policy of its own;
//! that belongs to the lifecycle manager that owns it.

use std::time::Duration;

use crate::connection::{
    Client, Config, ImapStream, IdleOutcome, MailboxUpdate, Security, connect_plain, connect_tls,
};
use crate::response::{Capability, MailboxStatus};
use crate::{Error, Result};

/// The live connection/authentication state against one IMAP server.
///
/// Invariant: authenticated implies connected. Authentication state lives
/// alongside the client handle and is cleared whenever the transport drops.
#[derive(Debug, Default)]
pub struct Session {
    client: Option<Client<ImapStream>>,
    authenticated: bool,
}

impl Session {
    /// Creates a disconnected session.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            client: None,
            authenticated: false,
        }
    }

    /// Returns true if a transport is established.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    /// Returns true if the session is authenticated.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.client.is_some() && self.authenticated
    }

    /// Returns the negotiated capability set (empty when disconnected).
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        self.client.as_ref().map_or(&[], Client::capabilities)
    }

    /// Returns true if the server supports IDLE.
    #[must_use]
    pub fn supports_idle(&self) -> bool {
        self.client.as_ref().is_some_and(Client::supports_idle)
    }

    /// Establishes the transport per the configured security mode and reads
    /// the greeting. No-op when already connected.
    ///
    /// # Errors
    ///
    /// Transport failures (refused, DNS, TLS) surface as [`Error::Io`] /
    /// [`Error::Tls`]; a server that does not speak IMAP or rejects the
    /// security negotiation surfaces as [`Error::Protocol`] / [`Error::Bye`].
    pub async fn connect(&mut self, config: &Config) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }

        let implicit_tls = match config.security {
            Security::Implicit => true,
            Security::None | Security::StartTls => false,
            Security::Auto => config.port == 993,
        };

        let client = if implicit_tls {
            let stream = connect_tls(config).await?;
            Client::from_stream(stream).await?
        } else {
            let stream = connect_plain(config).await?;
            let client = Client::from_stream(stream).await?;
            match config.security {
                Security::StartTls => {
                    client.require_starttls()?;
                    client.starttls(&config.host).await?
                }
                // Opportunistic upgrade; plaintext is acceptable in Auto.
                Security::Auto if client.supports_starttls() => {
                    client.starttls(&config.host).await?
                }
                _ => client,
            }
        };

        tracing::info!(host = %config.host, port = config.port, "IMAP connected");
        self.client = Some(client);
        self.authenticated = false;
        Ok(())
    }

    /// Authenticates with LOGIN. No-op when already authenticated.
    pub async fn authenticate(&mut self, username: &str, secret: &str) -> Result<()> {
        if self.is_authenticated() {
            return Ok(());
        }

        let result = match self.client.as_mut() {
            Some(client) => client.login(username, secret).await,
            None => Err(not_connected()),
        };
        self.note_failure(result)?;

        tracing::info!(username, "IMAP authenticated");
        self.authenticated = true;
        Ok(())
    }

    /// Opens a mailbox read-only.
    pub async fn examine(&mut self, mailbox: &str) -> Result<MailboxStatus> {
        let result = match self.client.as_mut() {
            Some(client) => client.examine(mailbox).await,
            None => Err(not_connected()),
        };
        self.note_failure(result)
    }

    /// Runs one bounded IDLE round: enter, wait for a push or the bound,
    /// exit with DONE. Returns the updates received, in server order;
    /// an empty vector means the bound elapsed quietly.
    pub async fn idle_wait(&mut self, bound: Duration) -> Result<Vec<MailboxUpdate>> {
        let result = match self.client.as_mut() {
            Some(client) => {
                async {
                    let mut handle = client.idle().await?;
                    let mut updates = match handle.wait(bound).await? {
                        IdleOutcome::Update(update) => vec![update],
                        IdleOutcome::Timeout => Vec::new(),
                    };
                    updates.extend(handle.done().await?);
                    Ok(updates)
                }
                .await
            }
            None => Err(not_connected()),
        };
        self.note_failure(result)
    }

    /// Sends a NOOP keep-alive, returning any updates it flushed.
    pub async fn noop(&mut self) -> Result<Vec<MailboxUpdate>> {
        let result = match self.client.as_mut() {
            Some(client) => client.noop().await,
            None => Err(not_connected()),
        };
        self.note_failure(result)
    }

    /// Gracefully logs out and drops the transport.
    ///
    /// The transport is released even when LOGOUT itself fails.
    pub async fn logout(&mut self) -> Result<()> {
        self.authenticated = false;
        match self.client.take() {
            Some(mut client) => {
                let result = client.logout().await;
                tracing::info!("IMAP disconnected");
                result
            }
            None => Ok(()),
        }
    }

    /// Drops the transport without a goodbye. For dead connections.
    pub fn disconnect(&mut self) {
        if self.client.take().is_some() {
            tracing::debug!("IMAP transport dropped");
        }
        self.authenticated = false;
    }

    /// Drops the transport when an operation failed fatally, so the next
    /// `connect` starts from a clean slate.
    fn note_failure<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result
            && e.is_fatal()
        {
            tracing::warn!(error = %e, "IMAP session lost");
            self.client = None;
            self.authenticated = false;
        }
        result
    }
}

fn not_connected() -> Error {
    Error::InvalidState("not connected".to_string())
}
