//! Connection profiles
//!
//! A profile is the TOML description of one server connection. It is turned
//! into validated [`ConnectionParameters`] and [`RenderOptions`] before any
//! config is rendered.

use serde::Deserialize;
use std::fmt;
use std::net::IpAddr;
use std::path::Path;

use crate::config::DaemonConfig;
use crate::error::{ConfigError, SynthesisError, VigilError};
use crate::types::{Password, ProxyCredentials};
use crate::vpn::params::{ConnectionParameters, Obfuscation, Proxy, ProxyKind, Transport};
use crate::vpn::render::RenderOptions;

/// Connection profile as stored on disk
#[derive(Clone, Deserialize)]
pub struct ConnectionProfile {
    pub host: IpAddr,
    pub port: u16,

    #[serde(default)]
    pub tcp: bool,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    password: String,

    /// Exit server identifier for multihop connections
    #[serde(default)]
    pub multihop_exit: Option<String>,

    #[serde(default)]
    pub proxy: Option<ProxyProfile>,

    /// Tunnel through the local obfuscation proxy
    #[serde(default)]
    pub obfuscate: bool,

    /// Local UDP/TCP port to bind; 0 lets the OS choose
    #[serde(default)]
    pub local_port: u16,

    /// Raw OpenVPN directives merged over the generated config
    #[serde(default)]
    pub extra_parameters: String,

    /// Whether the installed OpenVPN understands `compress` and `pull-filter`
    #[serde(default = "default_modern_directives")]
    pub modern_directives: bool,
}

fn default_modern_directives() -> bool {
    true
}

#[derive(Clone, Deserialize)]
pub struct ProxyProfile {
    pub kind: String,
    pub address: IpAddr,
    pub port: u16,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    password: String,
}

impl fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tcp", &self.tcp)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("multihop_exit", &self.multihop_exit)
            .field("proxy", &self.proxy)
            .field("obfuscate", &self.obfuscate)
            .field("local_port", &self.local_port)
            .field("modern_directives", &self.modern_directives)
            .finish()
    }
}

impl fmt::Debug for ProxyProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyProfile")
            .field("kind", &self.kind)
            .field("address", &self.address)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl ConnectionProfile {
    /// Parse a profile from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, VigilError> {
        toml::from_str(contents).map_err(|e| {
            VigilError::Config(ConfigError::ValidationError {
                message: format!("Failed to parse connection profile: {}", e),
            })
        })
    }

    /// Load a profile from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, VigilError> {
        let contents = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => VigilError::Config(ConfigError::LoadFailed {
                path: path.to_string_lossy().to_string(),
            }),
            _ => VigilError::Config(ConfigError::IoError {
                message: format!("Failed to read connection profile: {}", e),
            }),
        })?;
        Self::from_toml(&contents)
    }

    /// Build validated connection parameters
    pub fn to_parameters(
        &self,
        daemon: &DaemonConfig,
    ) -> Result<ConnectionParameters, SynthesisError> {
        let transport = if self.tcp { Transport::Tcp } else { Transport::Udp };

        let mut params = ConnectionParameters::new(transport, self.host, self.port)?
            .with_credentials(self.username.clone(), Password::new(self.password.clone()));

        if let Some(exit) = &self.multihop_exit {
            params = params.with_multihop_exit(exit.clone());
        }

        if let Some(proxy) = &self.proxy {
            let kind: ProxyKind = proxy.kind.parse()?;
            let mut built = Proxy::new(kind, proxy.address, proxy.port)?;
            if !proxy.username.is_empty() || !proxy.password.is_empty() {
                built = built.with_credentials(ProxyCredentials::new(
                    proxy.username.clone(),
                    Password::new(proxy.password.clone()),
                ));
            }
            params = params.with_proxy(built);
        }

        if self.obfuscate {
            params = params.with_obfuscation(Obfuscation {
                local_port: daemon.obfuscation.local_port,
                host_port: daemon.obfuscation.host_port,
            });
        }

        Ok(params)
    }

    /// Build render options from this profile and daemon settings
    pub fn render_options(&self, daemon: &DaemonConfig) -> RenderOptions {
        RenderOptions {
            local_port: self.local_port,
            management_address: daemon.management.address,
            management_port: daemon.management.port,
            log_file: daemon.logging.openvpn_log_file.clone(),
            extra_parameters: self.extra_parameters.clone(),
            modern_directives: self.modern_directives,
        }
    }
}
