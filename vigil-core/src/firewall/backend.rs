//! Firewall backend capability
//!
//! The platform packet filter the kill-switch is programmed through. Each
//! platform supplies one implementation; the coordinator only sees this
//! trait.

use std::net::IpAddr;

/// Opaque failure reported by a firewall backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct BackendError {
    message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<std::io::Error> for BackendError {
    fn from(e: std::io::Error) -> Self {
        Self::new(e.to_string())
    }
}

/// Operations the kill-switch needs from the platform packet filter
///
/// Calls are expected to be bounded local operations. The coordinator
/// serializes all calls, so implementations need no locking of their own
/// beyond what `&self` access requires.
pub trait FirewallBackend: Send + Sync {
    /// Block everything except explicitly allowed traffic
    fn enable(&self) -> Result<(), BackendError>;

    /// Remove all kill-switch rules
    fn disable(&self) -> Result<(), BackendError>;

    fn is_enabled(&self) -> Result<bool, BackendError>;

    /// Keep the kill-switch active across disable requests and reboots
    fn set_persistent(&self, persistent: bool) -> Result<(), BackendError>;

    /// Trust the tunnel interface with local address `addr`
    fn allow_client(&self, addr: IpAddr) -> Result<(), BackendError>;

    /// Stop trusting the tunnel interface
    fn remove_client(&self) -> Result<(), BackendError>;

    fn allow_hosts(&self, hosts: &[IpAddr]) -> Result<(), BackendError>;

    fn allow_lan(&self, allow_lan: bool, allow_multicast: bool) -> Result<(), BackendError>;

    /// Let a user-chosen DNS resolver bypass the kill-switch
    fn allow_dns(&self, addr: IpAddr) -> Result<(), BackendError>;
}
