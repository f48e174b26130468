//! Type definitions and wrappers for secure data handling
//!
//! This module provides type-safe wrappers for sensitive data using the
//! secrecy crate to prevent accidental exposure in logs or debug output.

use secrecy::{ExposeSecret, Secret};

/// Wrapper for a password (VPN account or proxy account)
///
/// The value is never printed by `Debug` and only leaves the wrapper
/// through [`Password::expose`].
#[derive(Clone, Debug)]
pub struct Password(Secret<String>);

impl Password {
    /// Create a new password from a raw string
    pub fn new(password: String) -> Self {
        Self(Secret::new(password))
    }

    /// Expose the password value (use with caution!)
    ///
    /// This should only be called when handing the password to the tunnel's
    /// management interface or writing the proxy credentials file.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }
}

impl From<String> for Password {
    fn from(password: String) -> Self {
        Self::new(password)
    }
}

impl From<&str> for Password {
    fn from(password: &str) -> Self {
        Self::new(password.to_string())
    }
}

/// Username/password pair for authenticating against a proxy
#[derive(Clone, Debug)]
pub struct ProxyCredentials {
    pub username: String,
    pub password: Password,
}

impl ProxyCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<Password>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Both halves must be non-empty before an auth file is written
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }

    /// Contents of the proxy auth file: username and password on two lines
    pub(crate) fn auth_file_contents(&self) -> String {
        format!("{}\n{}", self.username, self.password.expose())
    }
}
