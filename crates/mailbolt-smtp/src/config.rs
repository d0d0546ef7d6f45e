//! Relay host and account configuration.

use std::fmt;

/// Relay configuration. Immutable once a send starts; clone it for
/// isolated reuse across mailers.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Relay hostname.
    pub host: String,
    /// Default relay port, used when no explicit port queue is set.
    pub port: u16,
    /// Whether the session must authenticate before MAIL FROM.
    pub requires_auth: bool,
    /// Whether to upgrade to TLS when the server advertises STARTTLS.
    pub wants_tls: bool,
}

impl HostConfig {
    /// Creates a configuration for a relay host and default port, with
    /// authentication and TLS disabled.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            requires_auth: false,
            wants_tls: false,
        }
    }

    /// Requires authentication before the mail transaction.
    #[must_use]
    pub const fn with_auth(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    /// Requests STARTTLS when the server advertises it.
    #[must_use]
    pub const fn with_tls(mut self) -> Self {
        self.wants_tls = true;
        self
    }

    /// The Gmail relay preset.
    #[must_use]
    pub fn gmail() -> Self {
        Self::new("smtp.gmail.com", 465).with_auth().with_tls()
    }
}

/// Account identity and secrets: the From header name/address and the
/// AUTH login. Login and password may be absent only when the host does
/// not require authentication.
#[derive(Clone)]
pub struct Credentials {
    /// Display name for the From header.
    pub display_name: Option<String>,
    /// Sender address.
    pub email: String,
    /// AUTH login.
    pub login: Option<String>,
    /// AUTH password.
    pub password: Option<String>,
}

impl Credentials {
    /// Creates credentials for an unauthenticated sender address.
    #[must_use]
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            display_name: None,
            email: email.into(),
            login: None,
            password: None,
        }
    }

    /// Adds a display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Adds an AUTH login and password.
    #[must_use]
    pub fn with_login(mut self, login: impl Into<String>, password: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self.password = Some(password.into());
        self
    }
}

// Manual Debug so the password never reaches logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("display_name", &self.display_name)
            .field("email", &self.email)
            .field("login", &self.login)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .finish()
    }
}
