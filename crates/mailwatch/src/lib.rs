//! Mailbox watching over IMAP.
//!
//! Keeps one authenticated session alive against a mail server and watches a
//! single mailbox for changes, delivering them as events:
//!
//! - [`SessionManager`] owns the session and guarantees a single race-free
//!   path from disconnected to connected-and-authenticated, no matter how
//!   many callers ask at once.
//! - [`MailboxMonitor`] drives the watch loop: IDLE long-polls when the
//!   server supports them, NOOP polling otherwise, with transparent
//!   reconnect-and-resume when the connection drops mid-wait.
//!
//! # Quick start
//!
//! ```no_run
//! use mailwatch::{AccountDescriptor, LoggingListener, MailboxMonitor, SessionManager};
//! use mailwatch_imap::Security;
//!
//! # async fn example() -> mailwatch::Result<()> {
//! let account = AccountDescriptor::new("imap.example.com", Security::Implicit)
//!     .credentials("user@example.com", "app-password");
//!
//! let manager = SessionManager::new(account)?;
//! let monitor = MailboxMonitor::new(manager, "INBOX");
//! monitor.subscribe(LoggingListener);
//!
//! // Runs until monitor.exit() is called from another task.
//! monitor.run().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Protocol-level access (commands, responses, the raw session) lives in the
//! [`mailwatch_imap`] crate.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod account;
mod error;
mod event;
mod manager;
mod monitor;
mod session;

pub use account::{AccountDescriptor, DEFAULT_IDLE_TIMEOUT};
pub use error::{Error, Result};
pub use event::{
    ChangeEvent, ChangeListener, CollectingListener, LoggingListener, SubscriptionId,
};
pub use manager::{SessionGuard, SessionManager};
pub use monitor::{MailboxMonitor, FALLBACK_POLL_INTERVAL, MAX_IDLE_WINDOW};
pub use session::WatchSession;
