//! VPN tunnel configuration module
//!
//! Builds the OpenVPN client configuration for a connection attempt.

pub mod merge;
pub mod params;
pub mod render;
pub mod secure_file;

// Public re-exports
pub use params::{ConnectionParameters, Obfuscation, Proxy, ProxyKind, Transport};
pub use render::{ConfigDocument, ConfigSynthesizer, RenderOptions};
