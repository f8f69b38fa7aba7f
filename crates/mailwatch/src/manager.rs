//! Session lifecycle manager.
//!
//! Owns exactly one session for its entire lifetime and guarantees a single,
//! race-free path from "no connection" to "connected and authenticated".
//! The session is mutated in place through connect/authenticate/disconnect
//! transitions; reconnection reuses the same instance.

use std::ops::{Deref, DerefMut};

use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::session::WatchSession;
use crate::{AccountDescriptor, Error, Result};

/// Exclusive access to a ready (connected, authenticated) session.
///
/// Holding the guard keeps other callers out of the manager's critical
/// section; drop it to let them in.
pub struct SessionGuard<'a, S: WatchSession> {
    inner: MutexGuard<'a, S>,
}

impl<S: WatchSession> std::fmt::Debug for SessionGuard<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGuard").finish_non_exhaustive()
    }
}

impl<S: WatchSession> Deref for SessionGuard<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.inner
    }
}

impl<S: WatchSession> DerefMut for SessionGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.inner
    }
}

/// Serializes connect/authenticate/release over one shared session.
///
/// The two-step check-then-act in [`acquire`](Self::acquire) runs under a
/// single exclusive section, so concurrent callers can never both attempt
/// to connect or authenticate: the first does the work, the rest find the
/// session ready and take the fast path.
///
/// A released manager must not be reused; construct a new one instead.
pub struct SessionManager<S: WatchSession = mailwatch_imap::Session> {
    account: AccountDescriptor,
    session: Mutex<S>,
}

impl SessionManager {
    /// Creates a manager for the given account with a fresh IMAP session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when the descriptor is missing
    /// connection parameters or credentials. No connection is attempted.
    pub fn new(account: AccountDescriptor) -> Result<Self> {
        Self::with_session(account, mailwatch_imap::Session::new())
    }
}

impl<S: WatchSession> SessionManager<S> {
    /// Creates a manager around a caller-supplied session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when the descriptor is invalid.
    pub fn with_session(account: AccountDescriptor, session: S) -> Result<Self> {
        account.validate()?;
        Ok(Self {
            account,
            session: Mutex::new(session),
        })
    }

    /// Returns the account this manager connects to.
    #[must_use]
    pub const fn account(&self) -> &AccountDescriptor {
        &self.account
    }

    /// Returns a ready session, connecting and authenticating as needed.
    ///
    /// Already connected and authenticated sessions are returned without
    /// any I/O. Callers queue on the exclusive section; each sees either a
    /// ready session or performs the missing transitions itself.
    ///
    /// # Errors
    ///
    /// - [`Error::Connection`] when establishing the transport fails.
    /// - [`Error::Authentication`] when the server rejects the login.
    /// - [`Error::UnexpectedSession`] for failures fitting neither.
    /// - [`Error::Cancelled`] when `cancel` fires first.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<SessionGuard<'_, S>> {
        let mut session = self.session.lock().await;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        if !session.is_connected() {
            tracing::info!(
                host = %self.account.host,
                port = self.account.port,
                "connecting"
            );
            let connected = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Error::Cancelled),
                result = session.connect(&self.account) => result,
            };
            connected
                .map_err(|e| Error::from_connect(&self.account.host, self.account.port, e))?;
        }

        if !session.is_authenticated() {
            tracing::info!(username = %self.account.username, "authenticating");
            let authenticated = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Error::Cancelled),
                result = session.authenticate(&self.account.username, &self.account.secret) => {
                    result
                }
            };
            authenticated.map_err(|e| Error::from_authenticate(&self.account.username, e))?;
        }

        Ok(SessionGuard { inner: session })
    }

    /// Shuts the session down: graceful logout when connected, transport
    /// released regardless of the logout outcome.
    ///
    /// Safe to call when already released (no-op). Callers must not
    /// `acquire` afterwards.
    pub async fn release(&self) {
        let mut session = self.session.lock().await;
        if session.is_connected() {
            if let Err(e) = session.logout().await {
                tracing::warn!(error = %e, "logout failed; dropping transport anyway");
            }
        }
        session.disconnect();
        tracing::info!("session released");
    }
}

impl<S: WatchSession> std::fmt::Debug for SessionManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}
