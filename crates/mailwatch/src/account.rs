//! Account descriptor for the watched mailbox server.

use std::time::Duration;

use mailwatch_imap::Security;

use crate::{Error, Result};

/// How long one IDLE round may last before it is renewed.
///
/// RFC 2177 allows up to 30 minutes, but several large providers silently
/// drop idle connections around the 10-minute mark, so the default stays
/// well under that.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(9 * 60);

/// Immutable description of the account to watch.
///
/// Supplied once by the caller (typically a configuration loader, which is
/// outside this crate) and borrowed read-only by the session manager.
#[derive(Clone)]
pub struct AccountDescriptor {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Login username.
    pub username: String,
    /// Login secret. Redacted from `Debug` output and never logged.
    pub secret: String,
    /// Transport security mode.
    pub security: Security,
    /// Upper bound for one IDLE round.
    pub idle_timeout: Duration,
}

impl AccountDescriptor {
    /// Creates a descriptor with the security mode's default port, no
    /// credentials and the default idle timeout.
    #[must_use]
    pub fn new(host: impl Into<String>, security: Security) -> Self {
        Self {
            host: host.into(),
            port: security.default_port(),
            username: String::new(),
            secret: String::new(),
            security,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, secret: impl Into<String>) -> Self {
        self.username = username.into();
        self.secret = secret.into();
        self
    }

    /// Sets the idle timeout.
    #[must_use]
    pub const fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Checks that the descriptor can be used to open a session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when connection parameters or
    /// credentials are missing.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Configuration("server host is empty".to_string()));
        }
        if self.port == 0 {
            return Err(Error::Configuration("server port is zero".to_string()));
        }
        if self.username.trim().is_empty() || self.secret.trim().is_empty() {
            return Err(Error::Configuration(
                "username and secret must not be blank".to_string(),
            ));
        }
        if self.idle_timeout.is_zero() {
            return Err(Error::Configuration("idle timeout is zero".to_string()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for AccountDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountDescriptor")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .field("security", &self.security)
            .field("idle_timeout", &self.idle_timeout)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn valid() -> AccountDescriptor {
        AccountDescriptor::new("imap.example.com", Security::Implicit)
            .credentials("user@example.com", "hunter2")
    }

    #[test]
    fn test_defaults() {
        let account = valid();
        assert_eq!(account.port, 993);
        assert_eq!(account.idle_timeout, DEFAULT_IDLE_TIMEOUT);
        account.validate().unwrap();
    }

    #[test]
    fn test_blank_secret_rejected() {
        let account = AccountDescriptor::new("imap.example.com", Security::Implicit)
            .credentials("user@example.com", "   ");
        assert!(matches!(
            account.validate(),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_blank_host_rejected() {
        let account = AccountDescriptor::new("", Security::Implicit)
            .credentials("user@example.com", "hunter2");
        assert!(matches!(
            account.validate(),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_zero_port_rejected() {
        let account = valid().port(0);
        assert!(matches!(
            account.validate(),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug = format!("{:?}", valid());
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("hunter2"));
    }
}
