//! vigil - VPN daemon core tooling
//!
//! Renders OpenVPN client configurations from connection profiles and
//! verifies the installation's credential material.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use vigil_core::{
    error::{SynthesisError, VigilError},
    init_logging,
};

mod cli;

#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "VPN daemon core: OpenVPN config synthesis and kill-switch coordination")]
struct Cli {
    /// Daemon configuration file (default: $VIGIL_CONFIG_DIR/daemon.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the OpenVPN configuration for a connection profile
    Render {
        /// Connection profile (TOML)
        profile: PathBuf,

        /// Write here instead of the configured config_file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Verify the CA certificate and TLS auth key are installed
    Check,
}

fn main() {
    // Initialize logging
    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(2);
    }

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Render { profile, output } => {
            cli::render::run_render(cli.config.as_deref(), &profile, output.as_deref())
        }
        Commands::Check => cli::check::run_check(cli.config.as_deref()),
    };

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            let exit_code = match e {
                // Configuration errors (exit code 2)
                VigilError::Config(_) | VigilError::Toml(_) | VigilError::TomlSerialize(_) => 2,
                // Synthesis errors - installation problems vs runtime failures
                VigilError::Synthesis(ref synthesis_error) => match synthesis_error {
                    SynthesisError::InvalidParameters { .. } => 2,
                    SynthesisError::MissingCredentialMaterial { .. } => 2,
                    SynthesisError::GatewayUnavailable { .. } => 1,
                    SynthesisError::ProxyCredentialWriteFailed { .. } => 1,
                    SynthesisError::ConfigWriteFailed { .. } => 1,
                },
                // Firewall and IO errors (exit code 1 - runtime)
                VigilError::Firewall(_) | VigilError::Io(_) => 1,
            };

            eprintln!("{}", e);
            std::process::exit(exit_code);
        }
    }
}
