//! TOML configuration file I/O
//!
//! Handles loading and saving the daemon configuration to/from TOML files
//! in the daemon's configuration directory.

use crate::config::DaemonConfig;
use crate::error::{ConfigError, VigilError};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default configuration file name
const CONFIG_FILE_NAME: &str = "daemon.toml";

/// Default configuration directory for the system daemon
const DEFAULT_CONFIG_DIR: &str = "/etc/vigil";

/// Get the configuration directory
///
/// Returns /etc/vigil, or VIGIL_CONFIG_DIR environment variable if set
pub fn get_config_dir() -> PathBuf {
    // Allow tests and packagers to override the directory
    match std::env::var("VIGIL_CONFIG_DIR") {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from(DEFAULT_CONFIG_DIR),
    }
}

/// Get the default configuration file path
pub fn get_config_path() -> PathBuf {
    get_config_dir().join(CONFIG_FILE_NAME)
}

/// Load daemon configuration from the default TOML file
pub fn load_config() -> Result<DaemonConfig, VigilError> {
    load_config_from_path(get_config_path())
}

/// Load daemon configuration from a specific TOML file
pub fn load_config_from_path<P: AsRef<Path>>(path: P) -> Result<DaemonConfig, VigilError> {
    let contents = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => VigilError::Config(ConfigError::LoadFailed {
            path: path.as_ref().to_string_lossy().to_string(),
        }),
        _ => VigilError::Config(ConfigError::IoError {
            message: format!("Failed to read config file: {}", e),
        }),
    })?;

    let config: DaemonConfig = toml::from_str(&contents).map_err(|e| {
        VigilError::Config(ConfigError::ValidationError {
            message: format!("Failed to parse config file: {}", e),
        })
    })?;

    // Validate the loaded configuration
    config
        .validate()
        .map_err(|e| VigilError::Config(ConfigError::ValidationError { message: e }))?;

    debug!(
        "Loaded daemon configuration: ca={:?}, ta={:?}, management={}:{}",
        config.openvpn.ca_file,
        config.openvpn.ta_file,
        config.management.address,
        config.management.port
    );

    Ok(config)
}

/// Save daemon configuration to a specific TOML file
pub fn save_config_to_path<P: AsRef<Path>>(
    config: &DaemonConfig,
    path: P,
) -> Result<(), VigilError> {
    // Validate configuration before saving
    config
        .validate()
        .map_err(|e| VigilError::Config(ConfigError::ValidationError { message: e }))?;

    // Ensure config directory exists
    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            VigilError::Config(ConfigError::IoError {
                message: format!("Failed to create config directory: {}", e),
            })
        })?;
    }

    let toml_string = toml::to_string_pretty(config)?;

    std::fs::write(&path, toml_string).map_err(|_e| {
        VigilError::Config(ConfigError::SaveFailed {
            path: path.as_ref().to_string_lossy().to_string(),
        })
    })?;

    info!("Saved daemon configuration to {:?}", path.as_ref());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_roundtrip() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("daemon.toml");

        let mut original_config = DaemonConfig::default();
        original_config.openvpn.up_script = Some(PathBuf::from("/opt/vigil/etc/client.up"));
        original_config.management.port = 17505;
        original_config.logging.enabled = false;

        save_config_to_path(&original_config, &config_path).unwrap();
        let loaded_config = load_config_from_path(&config_path).unwrap();

        assert_eq!(original_config, loaded_config);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("missing.toml");

        let err = load_config_from_path(&config_path).unwrap_err();
        assert!(matches!(
            err,
            VigilError::Config(ConfigError::LoadFailed { ref path }) if path.ends_with("missing.toml")
        ));
    }

    #[test]
    fn test_invalid_config_not_saved() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("daemon.toml");

        let mut config = DaemonConfig::default();
        config.obfuscation.local_port = 0;

        assert!(save_config_to_path(&config, &config_path).is_err());
        assert!(!config_path.exists());
    }
}
