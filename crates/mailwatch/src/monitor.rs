//! Long-running mailbox watch loop.
//!
//! The monitor acquires a session through its [`SessionManager`], opens the
//! target mailbox read-only and then alternates between IDLE long-poll
//! rounds and a NOOP fallback poll, translating untagged server pushes into
//! [`ChangeEvent`]s for its subscribers. Transport failures mid-wait are
//! recovered locally with reconnect-and-resume and never reach subscribers.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use mailwatch_imap::MailboxUpdate;
use tokio_util::sync::CancellationToken;

use crate::event::{ChangeEvent, ChangeListener, SubscriptionId};
use crate::manager::SessionManager;
use crate::session::WatchSession;
use crate::{Error, Result};

/// Hard upper bound for one IDLE round.
///
/// RFC 2177 requires a DONE at least every 30 minutes; staying a minute
/// under that keeps compliant servers from timing the connection out.
pub const MAX_IDLE_WINDOW: Duration = Duration::from_secs(29 * 60);

/// Pause between NOOP polls when the server lacks the IDLE capability.
pub const FALLBACK_POLL_INTERVAL: Duration = Duration::from_secs(60);

const RECONNECT_BACKOFF_INITIAL: Duration = Duration::from_secs(5);
const RECONNECT_BACKOFF_MAX: Duration = Duration::from_secs(300);

/// Where the watch loop stands.
#[derive(Debug)]
enum State {
    /// First acquire and EXAMINE; failures here propagate to the caller.
    Connecting,
    /// Mailbox open, count synced; running bounded wait cycles.
    Watching,
    /// Connection lost mid-wait; re-acquiring with capped backoff.
    Reconnecting { attempt: u32 },
    /// Terminal.
    Stopped,
}

/// Outcome of a single bounded wait cycle.
enum Cycle {
    /// Updates delivered or the bound elapsed quietly; keep watching.
    Continue,
    /// The stop signal fired.
    Stop,
    /// Transport or protocol failure; the session has been torn down.
    ConnectionLost,
}

/// Watches one mailbox and fans change events out to subscribers.
///
/// Single-use: [`run`](Self::run) drives the watch until [`exit`](Self::exit)
/// is called or startup fails, then releases the session. A stopped monitor
/// cannot be restarted; construct a new one.
pub struct MailboxMonitor<S: WatchSession = mailwatch_imap::Session> {
    manager: SessionManager<S>,
    mailbox: String,
    cancel: CancellationToken,
    started: AtomicBool,
    listeners: Mutex<Vec<(SubscriptionId, Arc<Mutex<dyn ChangeListener>>)>>,
    next_subscription: AtomicU64,
}

impl<S: WatchSession> MailboxMonitor<S> {
    /// Creates a monitor for the given mailbox, taking ownership of the
    /// session manager.
    pub fn new(manager: SessionManager<S>, mailbox: impl Into<String>) -> Self {
        Self {
            manager,
            mailbox: mailbox.into(),
            cancel: CancellationToken::new(),
            started: AtomicBool::new(false),
            listeners: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(0),
        }
    }

    /// Registers a listener. Events are delivered synchronously, in
    /// subscription order.
    ///
    /// Safe to call from inside a listener's `on_change`; the change takes
    /// effect from the next event.
    pub fn subscribe(&self, listener: impl ChangeListener + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.lock_listeners()
            .push((id, Arc::new(Mutex::new(listener))));
        id
    }

    /// Removes a previously registered listener. Returns false when the id
    /// is unknown or already removed.
    ///
    /// Safe to call from inside a listener's `on_change`; the change takes
    /// effect from the next event.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.lock_listeners();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Requests a stop. Non-blocking; the loop observes the signal at the
    /// next boundary or mid-wait, so worst-case latency is one bounded wait.
    pub fn exit(&self) {
        self.cancel.cancel();
    }

    /// Runs the watch loop until stopped.
    ///
    /// Blocks (asynchronously) until [`exit`](Self::exit) is called or the
    /// first connect/authenticate/examine fails. The session is released on
    /// the way out either way.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyStarted`] when called a second time.
    /// - [`Error::Connection`], [`Error::Authentication`] or
    ///   [`Error::UnexpectedSession`] when startup fails; once watching,
    ///   failures are recovered internally and never surface.
    pub async fn run(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyStarted);
        }
        let result = self.watch_loop().await;
        self.manager.release().await;
        tracing::info!(mailbox = %self.mailbox, "monitor stopped");
        result
    }

    async fn watch_loop(&self) -> Result<()> {
        let mut state = State::Connecting;
        let mut count: u32 = 0;

        loop {
            state = match state {
                State::Connecting => match self.open_mailbox().await {
                    Ok(initial) => {
                        count = initial;
                        State::Watching
                    }
                    Err(Error::Cancelled) => State::Stopped,
                    Err(e) => return Err(e),
                },
                State::Watching => match self.wait_cycle(&mut count).await {
                    Cycle::Continue => State::Watching,
                    Cycle::Stop => State::Stopped,
                    Cycle::ConnectionLost => State::Reconnecting { attempt: 0 },
                },
                State::Reconnecting { attempt } => match self.open_mailbox().await {
                    Ok(initial) => {
                        count = initial;
                        tracing::info!(mailbox = %self.mailbox, "watch resumed");
                        State::Watching
                    }
                    Err(Error::Cancelled) => State::Stopped,
                    Err(e) => {
                        let delay = reconnect_backoff(attempt);
                        tracing::warn!(
                            error = %e,
                            delay_secs = delay.as_secs(),
                            "reconnect failed; backing off"
                        );
                        tokio::select! {
                            biased;
                            () = self.cancel.cancelled() => State::Stopped,
                            () = tokio::time::sleep(delay) => State::Reconnecting {
                                attempt: attempt.saturating_add(1),
                            },
                        }
                    }
                },
                State::Stopped => return Ok(()),
            };
        }
    }

    /// Acquires a ready session and opens the mailbox read-only, returning
    /// the current message count.
    async fn open_mailbox(&self) -> Result<u32> {
        let mut session = self.manager.acquire(&self.cancel).await?;
        let status = match session.examine(&self.mailbox).await {
            Ok(status) => status,
            Err(e) => {
                session.disconnect();
                let account = self.manager.account();
                return Err(Error::from_connect(&account.host, account.port, e));
            }
        };
        tracing::info!(
            mailbox = %self.mailbox,
            exists = status.exists,
            recent = status.recent,
            "mailbox opened"
        );
        Ok(status.exists)
    }

    /// Runs one bounded wait: an IDLE round when the server supports it,
    /// otherwise a fixed pause followed by a single NOOP.
    async fn wait_cycle(&self, count: &mut u32) -> Cycle {
        let mut session = match self.manager.acquire(&self.cancel).await {
            Ok(guard) => guard,
            Err(Error::Cancelled) => return Cycle::Stop,
            Err(e) => {
                tracing::warn!(error = %e, "session unavailable mid-watch");
                return Cycle::ConnectionLost;
            }
        };

        if session.supports_idle() {
            let bound = self.manager.account().idle_timeout.min(MAX_IDLE_WINDOW);
            tracing::debug!(bound_secs = bound.as_secs(), "entering idle");
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    // Mid-IDLE stop: the round is abandoned, so the
                    // transport is no longer in a usable protocol state.
                    session.disconnect();
                    Cycle::Stop
                }
                result = session.idle_wait(bound) => match result {
                    Ok(updates) => {
                        self.deliver(updates, count);
                        Cycle::Continue
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "idle round failed");
                        session.disconnect();
                        Cycle::ConnectionLost
                    }
                },
            }
        } else {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Cycle::Stop,
                () = tokio::time::sleep(FALLBACK_POLL_INTERVAL) => {}
            }
            match session.noop().await {
                Ok(updates) => {
                    self.deliver(updates, count);
                    Cycle::Continue
                }
                Err(e) => {
                    tracing::warn!(error = %e, "keep-alive failed");
                    session.disconnect();
                    Cycle::ConnectionLost
                }
            }
        }
    }

    /// Translates session-level updates into change events against the last
    /// known message count and fans them out, preserving server order.
    fn deliver(&self, updates: Vec<MailboxUpdate>, count: &mut u32) {
        for update in updates {
            match update {
                MailboxUpdate::Exists(n) => {
                    if n > *count {
                        self.emit(&ChangeEvent::NewMail);
                    }
                    *count = n;
                }
                MailboxUpdate::Expunge(seq) => {
                    tracing::debug!(seq, "message expunged");
                    *count = count.saturating_sub(1);
                    self.emit(&ChangeEvent::RemovedMail);
                }
                MailboxUpdate::FlagsChanged { seq, flags } => {
                    self.emit(&ChangeEvent::FlagsChanged { index: seq, flags });
                }
                MailboxUpdate::Recent(n) => {
                    tracing::debug!(recent = n, "recent count changed");
                }
            }
        }
    }

    // Delivery runs on a snapshot taken under the lock, so a listener may
    // subscribe or unsubscribe from inside on_change without deadlocking.
    fn emit(&self, event: &ChangeEvent) {
        let snapshot: Vec<Arc<Mutex<dyn ChangeListener>>> = self
            .lock_listeners()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in snapshot {
            listener
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .on_change(event);
        }
    }

    fn lock_listeners(
        &self,
    ) -> std::sync::MutexGuard<'_, Vec<(SubscriptionId, Arc<Mutex<dyn ChangeListener>>)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: WatchSession> std::fmt::Debug for MailboxMonitor<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailboxMonitor")
            .field("mailbox", &self.mailbox)
            .field("started", &self.started.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

fn reconnect_backoff(attempt: u32) -> Duration {
    RECONNECT_BACKOFF_INITIAL
        .saturating_mul(1_u32 << attempt.min(6))
        .min(RECONNECT_BACKOFF_MAX)
}
