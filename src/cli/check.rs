//! Check command implementation
//!
//! Reports whether the files OpenVPN needs are installed where the daemon
//! configuration says they are.

use std::path::Path;

use colored::Colorize;
use vigil_core::error::{SynthesisError, VigilError};

use super::load_daemon_config;

/// Run the check command
pub fn run_check(config_path: Option<&Path>) -> Result<(), VigilError> {
    let daemon = load_daemon_config(config_path)?;
    let paths = &daemon.openvpn;

    let mut missing = None;
    for (what, path) in [
        ("CA certificate", paths.ca_file.as_path()),
        ("TLS auth key", paths.ta_file.as_path()),
    ] {
        if path.exists() {
            println!("{} {}: {}", "✓".green(), what, path.display());
        } else {
            println!("{} {}: {} (missing)", "✗".red(), what, path.display());
            if missing.is_none() {
                missing = Some((what, path.to_path_buf()));
            }
        }
    }

    for (what, script) in [
        ("Up script", paths.up_script.as_deref()),
        ("Down script", paths.down_script.as_deref()),
    ] {
        if let Some(script) = script {
            let marker = if script.exists() { "✓".green() } else { "⚠".yellow() };
            println!("{} {}: {}", marker, what, script.display());
        }
    }

    match missing {
        Some((what, path)) => Err(SynthesisError::MissingCredentialMaterial { what, path }.into()),
        None => Ok(()),
    }
}
