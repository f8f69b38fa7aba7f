//! The seam between the lifecycle manager and the concrete IMAP session.
//!
//! [`SessionManager`](crate::SessionManager) and
//! [`MailboxMonitor`](crate::MailboxMonitor) are generic over this trait so
//! their contracts (single connect under contention, reconnect-and-resume,
//! bounded waits) can be exercised against a scripted fake without a server.

use std::future::Future;
use std::time::Duration;

use mailwatch_imap::{Config, MailboxStatus, MailboxUpdate, Session};

use crate::AccountDescriptor;

/// A mutable-in-place session against one mailbox server.
///
/// Invariant: `is_authenticated()` implies `is_connected()`.
pub trait WatchSession: Send {
    /// Returns true if a transport is established.
    fn is_connected(&self) -> bool;

    /// Returns true if the session is authenticated.
    fn is_authenticated(&self) -> bool;

    /// Returns true if the server advertises the IDLE capability.
    fn supports_idle(&self) -> bool;

    /// Establishes the transport and reads the greeting.
    fn connect(
        &mut self,
        account: &AccountDescriptor,
    ) -> impl Future<Output = mailwatch_imap::Result<()>> + Send;

    /// Authenticates the connected session.
    fn authenticate(
        &mut self,
        username: &str,
        secret: &str,
    ) -> impl Future<Output = mailwatch_imap::Result<()>> + Send;

    /// Opens a mailbox read-only.
    fn examine(
        &mut self,
        mailbox: &str,
    ) -> impl Future<Output = mailwatch_imap::Result<MailboxStatus>> + Send;

    /// Runs one bounded long-poll round, returning updates in server order.
    /// An empty vector means the bound elapsed quietly.
    fn idle_wait(
        &mut self,
        bound: Duration,
    ) -> impl Future<Output = mailwatch_imap::Result<Vec<MailboxUpdate>>> + Send;

    /// Sends a keep-alive, returning any updates it flushed.
    fn noop(&mut self) -> impl Future<Output = mailwatch_imap::Result<Vec<MailboxUpdate>>> + Send;

    /// Gracefully logs out; the transport is released either way.
    fn logout(&mut self) -> impl Future<Output = mailwatch_imap::Result<()>> + Send;

    /// Drops the transport without a goodbye. For dead connections.
    fn disconnect(&mut self);
}

impl WatchSession for Session {
    fn is_connected(&self) -> bool {
        Self::is_connected(self)
    }

    fn is_authenticated(&self) -> bool {
        Self::is_authenticated(self)
    }

    fn supports_idle(&self) -> bool {
        Self::supports_idle(self)
    }

    async fn connect(&mut self, account: &AccountDescriptor) -> mailwatch_imap::Result<()> {
        let config = Config::new(account.host.clone())
            .port(account.port)
            .security(account.security);
        Self::connect(self, &config).await
    }

    async fn authenticate(&mut self, username: &str, secret: &str) -> mailwatch_imap::Result<()> {
        Self::authenticate(self, username, secret).await
    }

    async fn examine(&mut self, mailbox: &str) -> mailwatch_imap::Result<MailboxStatus> {
        Self::examine(self, mailbox).await
    }

    async fn idle_wait(&mut self, bound: Duration) -> mailwatch_imap::Result<Vec<MailboxUpdate>> {
        Self::idle_wait(self, bound).await
    }

    async fn noop(&mut self) -> mailwatch_imap::Result<Vec<MailboxUpdate>> {
        Self::noop(self).await
    }

    async fn logout(&mut self) -> mailwatch_imap::Result<()> {
        Self::logout(self).await
    }

    fn disconnect(&mut self) {
        Self::disconnect(self);
    }
}
