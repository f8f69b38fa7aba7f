//! Error taxonomy for session lifecycle and monitoring.

use thiserror::Error;

use mailwatch_imap::Error as ImapError;

/// Errors surfaced to callers of the session manager and monitor.
///
/// Transport and protocol failures that happen *while watching* are never
/// surfaced through this type; the monitor recovers them locally. What
/// reaches the caller is configuration trouble, startup failures and
/// explicit cancellation.
#[derive(Debug, Error)]
pub enum Error {
    /// The account descriptor is missing connection parameters or
    /// credentials. Fatal; surfaced before any connection attempt.
    #[error("invalid account configuration: {0}")]
    Configuration(String),

    /// Connecting to the server failed, either at the transport level
    /// (unreachable, refused, DNS, TLS) or because the server does not
    /// speak IMAP / rejected the security negotiation.
    #[error("failed to connect to {host}:{port}: {source}")]
    Connection {
        /// Server hostname.
        host: String,
        /// Server port.
        port: u16,
        /// The underlying failure.
        #[source]
        source: ImapError,
    },

    /// The server rejected the credentials or the login command.
    /// The message carries the username, never the secret.
    #[error("authentication failed for {username}: {source}")]
    Authentication {
        /// The username that was rejected.
        username: String,
        /// The underlying failure.
        #[source]
        source: ImapError,
    },

    /// Catch-all for failures during connect/authenticate that fit neither
    /// category above.
    #[error("unexpected session error: {source}")]
    UnexpectedSession {
        /// The underlying failure.
        #[source]
        source: ImapError,
    },

    /// The operation was cancelled through the caller's stop signal.
    #[error("operation cancelled")]
    Cancelled,

    /// The monitor has already been started; instances are single-use.
    #[error("monitor already started")]
    AlreadyStarted,
}

impl Error {
    /// Classifies a failure that happened while connecting.
    pub(crate) fn from_connect(host: &str, port: u16, source: ImapError) -> Self {
        match source {
            ImapError::Io(_)
            | ImapError::Tls(_)
            | ImapError::InvalidDnsName(_)
            | ImapError::Protocol(_)
            | ImapError::Bye(_) => Self::Connection {
                host: host.to_string(),
                port,
                source,
            },
            other => Self::UnexpectedSession { source: other },
        }
    }

    /// Classifies a failure that happened while authenticating.
    pub(crate) fn from_authenticate(username: &str, source: ImapError) -> Self {
        match source {
            ImapError::Auth(_) | ImapError::No(_) | ImapError::Bad(_) => Self::Authentication {
                username: username.to_string(),
                source,
            },
            other => Self::UnexpectedSession { source: other },
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
