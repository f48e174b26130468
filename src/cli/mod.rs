//! CLI command implementations

pub mod check;
pub mod render;

use std::path::Path;

use vigil_core::config::{toml_config, DaemonConfig};
use vigil_core::error::VigilError;

/// Load the daemon configuration from `path`, or the default location
pub fn load_daemon_config(path: Option<&Path>) -> Result<DaemonConfig, VigilError> {
    match path {
        Some(path) => toml_config::load_config_from_path(path),
        None => toml_config::load_config(),
    }
}
