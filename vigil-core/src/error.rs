//! Error types for the vigil VPN daemon core
//!
//! This module defines all error types used throughout the daemon core,
//! providing consistent error handling and user-facing error messages.

use std::path::PathBuf;
use thiserror::Error;

use crate::firewall::backend::BackendError;

/// Main error type for the vigil daemon
#[derive(Error, Debug)]
pub enum VigilError {
    /// Errors related to configuration loading/parsing
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Errors raised while rendering the tunnel configuration
    #[error("OpenVPN configuration error: {0}")]
    Synthesis(#[from] SynthesisError),

    /// Errors reported by the firewall backend
    #[error("Firewall error: {0}")]
    Firewall(#[from] FirewallError),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing errors
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {path}")]
    LoadFailed { path: String },

    #[error("Failed to save configuration file: {path}")]
    SaveFailed { path: String },

    #[error("Configuration validation error: {message}")]
    ValidationError { message: String },

    #[error("I/O error: {message}")]
    IoError { message: String },
}

/// Tunnel configuration synthesis errors
///
/// Every variant is terminal for the render attempt. The caller decides
/// whether to retry.
#[derive(Error, Debug)]
pub enum SynthesisError {
    /// Bad host or port. A caller bug, never retried.
    #[error("Invalid connection parameters: {reason}")]
    InvalidParameters { reason: String },

    /// Installation problem: a file the tunnel needs is not on disk.
    #[error("{what} not found: {}", path.display())]
    MissingCredentialMaterial { what: &'static str, path: PathBuf },

    /// The local default gateway could not be determined.
    #[error("Failed to get local gateway: {reason}")]
    GatewayUnavailable { reason: String },

    #[error("Failed to save file with proxy credentials {}: {source}", path.display())]
    ProxyCredentialWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to save OpenVPN configuration into {}: {source}", path.display())]
    ConfigWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Firewall coordination errors
#[derive(Error, Debug)]
pub enum FirewallError {
    /// The backend refused or failed an operation. The cause is preserved.
    #[error("Firewall backend failed to {operation}: {source}")]
    BackendOperationFailed {
        operation: &'static str,
        #[source]
        source: BackendError,
    },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, VigilError>;
