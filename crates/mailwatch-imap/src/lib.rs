//! # mailwatch-imap
//!
//! A minimal async IMAP client built for mailbox monitoring: connect with
//! the desired security mode, LOGIN, EXAMINE a mailbox read-only, then
//! alternate IDLE rounds (RFC 2177) or NOOP keep-alives and collect the
//! unsolicited EXISTS / EXPUNGE / FETCH responses that signal changes.
//!
//! Message retrieval, search and mutation commands are deliberately out of
//! scope; this crate exists to keep one authenticated session alive and to
//! hear about changes.
//!
//! ## Quick start
//!
//! ```ignore
//! use std::time::Duration;
//! use mailwatch_imap::{Config, Security, Session};
//!
//! #[tokio::main]
//! async fn main() -> mailwatch_imap::Result<()> {
//!     let config = Config::new("imap.example.com").security(Security::Implicit);
//!
//!     let mut session = Session::new();
//!     session.connect(&config).await?;
//!     session.authenticate("user@example.com", "password").await?;
//!
//!     let status = session.examine("INBOX").await?;
//!     println!("{} messages", status.exists);
//!
//!     if session.supports_idle() {
//!         for update in session.idle_wait(Duration::from_secs(540)).await? {
//!             println!("{update:?}");
//!         }
//!     }
//!
//!     session.logout().await
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod response;
mod session;

pub use command::{Command, TagGenerator};
pub use connection::{
    Client, Config, FramedStream, IdleHandle, IdleOutcome, ImapStream, MailboxUpdate, Security,
};
pub use error::{Error, Result};
pub use response::{
    Capability, Flag, Flags, MailboxStatus, Response, ResponseCode, Status, UntaggedResponse,
};
pub use session::Session;
