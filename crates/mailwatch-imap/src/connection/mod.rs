//! IMAP connection handling.
//!
//! - Configuration (host, port, security mode)
//! - TLS/plaintext stream abstraction with STARTTLS upgrade
//! - Framed line I/O for the IMAP protocol
//! - Client running the watcher's command subset
//! - IDLE support for push notifications

mod client;
mod config;
mod framed;
mod idle;
mod stream;

pub use client::Client;
pub use config::{Config, Security};
pub use framed::FramedStream;
pub use idle::{IdleHandle, IdleOutcome, MailboxUpdate};
pub use stream::{ImapStream, connect_plain, connect_tls, create_tls_connector};
