//! Configuration module
//!
//! Daemon-wide settings (installation paths, management interface,
//! obfuscation ports, logging) loaded from TOML, plus per-connection
//! profiles.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

pub mod profile;
pub mod toml_config;

/// Daemon configuration structure
///
/// Every section is optional in the file and falls back to its defaults.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Files the OpenVPN client needs
    #[serde(default)]
    pub openvpn: OpenVpnPaths,

    /// OpenVPN management interface endpoint
    #[serde(default)]
    pub management: ManagementConfig,

    /// Local obfuscation proxy settings
    #[serde(default)]
    pub obfuscation: ObfuscationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DaemonConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.openvpn.ca_file.as_os_str().is_empty() {
            return Err("CA certificate path cannot be empty".to_string());
        }
        if self.openvpn.ta_file.as_os_str().is_empty() {
            return Err("TLS auth key path cannot be empty".to_string());
        }
        if self.openvpn.config_file.as_os_str().is_empty() {
            return Err("OpenVPN config file path cannot be empty".to_string());
        }
        if self.openvpn.proxy_auth_file.as_os_str().is_empty() {
            return Err("Proxy auth file path cannot be empty".to_string());
        }

        if self.management.port == 0 {
            return Err("Management port cannot be zero".to_string());
        }

        if self.obfuscation.local_port == 0 || self.obfuscation.host_port == 0 {
            return Err("Obfuscation ports cannot be zero".to_string());
        }

        Ok(())
    }
}

/// Well-known OpenVPN file locations provided by the installation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenVpnPaths {
    /// CA certificate (must exist before a config can be rendered)
    pub ca_file: PathBuf,

    /// TLS auth key (must exist before a config can be rendered)
    pub ta_file: PathBuf,

    /// Where proxy credentials are written when a proxy needs them
    pub proxy_auth_file: PathBuf,

    /// Where the rendered client config is written
    pub config_file: PathBuf,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub up_script: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub down_script: Option<PathBuf>,
}

impl Default for OpenVpnPaths {
    fn default() -> Self {
        Self {
            ca_file: PathBuf::from("/opt/vigil/etc/ca.crt"),
            ta_file: PathBuf::from("/opt/vigil/etc/ta.key"),
            proxy_auth_file: PathBuf::from("/opt/vigil/mutable/proxyauth.txt"),
            config_file: PathBuf::from("/opt/vigil/mutable/openvpn.conf"),
            up_script: None,
            down_script: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagementConfig {
    #[serde(default = "default_management_address")]
    pub address: IpAddr,

    #[serde(default = "default_management_port")]
    pub port: u16,
}

fn default_management_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}
fn default_management_port() -> u16 {
    7505
}

impl Default for ManagementConfig {
    fn default() -> Self {
        Self {
            address: default_management_address(),
            port: default_management_port(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObfuscationConfig {
    /// Server port obfuscated traffic is sent to
    #[serde(default = "default_obfs_host_port")]
    pub host_port: u16,

    /// Loopback port the obfuscation proxy listens on
    #[serde(default = "default_obfs_local_port")]
    pub local_port: u16,
}

fn default_obfs_host_port() -> u16 {
    80
}
fn default_obfs_local_port() -> u16 {
    5145
}

impl Default for ObfuscationConfig {
    fn default() -> Self {
        Self {
            host_port: default_obfs_host_port(),
            local_port: default_obfs_local_port(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Process-wide logging switch; also gates the OpenVPN `log` directive
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openvpn_log_file: Option<PathBuf>,
}

fn default_logging_enabled() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            openvpn_log_file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(DaemonConfig::default().validate().is_ok());
    }

    #[test]
    fn test_empty_sections_use_defaults() {
        let config: DaemonConfig = toml::from_str("").unwrap();
        assert_eq!(config, DaemonConfig::default());
    }

    #[test]
    fn test_zero_management_port() {
        let mut config = DaemonConfig::default();
        config.management.port = 0;
        assert_eq!(
            config.validate().unwrap_err(),
            "Management port cannot be zero"
        );
    }
}
