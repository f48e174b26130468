//! Render command implementation
//!
//! Synthesizes the OpenVPN client configuration for a connection profile and
//! writes it owner-only to disk.

use std::path::Path;

use colored::Colorize;
use tracing::info;
use vigil_core::config::profile::ConnectionProfile;
use vigil_core::error::VigilError;
use vigil_core::netinfo::SystemGateway;
use vigil_core::vpn::ConfigSynthesizer;

use super::load_daemon_config;

/// Run the render command
pub fn run_render(
    config_path: Option<&Path>,
    profile_path: &Path,
    output: Option<&Path>,
) -> Result<(), VigilError> {
    let daemon = load_daemon_config(config_path)?;
    let profile = ConnectionProfile::from_file(profile_path)?;
    info!("Loaded connection profile for {}:{}", profile.host, profile.port);

    let params = profile.to_parameters(&daemon)?;
    let options = profile.render_options(&daemon);

    let synthesizer = ConfigSynthesizer::from_config(&daemon, SystemGateway::new());
    let destination = output.unwrap_or(&daemon.openvpn.config_file);
    let document = synthesizer.write_config_file(&params, &options, destination)?;

    println!(
        "{} Wrote {} directives to {}",
        "✓".green(),
        document.lines().len(),
        destination.display()
    );
    if let Some(exit) = params.multihop_exit() {
        println!("  Multihop exit server: {}", exit);
    }
    Ok(())
}
