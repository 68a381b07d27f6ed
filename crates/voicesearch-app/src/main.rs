//! voicesearch binary - composition root.
//!
//! 1. Parse CLI args and load configuration from TOML
//! 2. Initialize logging (stderr; stdout carries the channel)
//! 3. Build the plugin around a simulated recognizer
//! 4. Serve JSON-lines method calls on stdin/stdout until EOF

mod cli;
mod simulator;

use std::sync::Arc;

use clap::Parser;

use voicesearch_channel::{serve, VoiceSearchPlugin};
use voicesearch_core::config::VoiceSearchConfig;
use voicesearch_core::types::Permission;
use voicesearch_session::HostSurface;

use crate::cli::CliArgs;
use crate::simulator::{ConsoleSurface, SimulatedRecognizer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config first so its log level can seed the filter.
    let config_file = args.resolve_config_path();
    let config = VoiceSearchConfig::load_or_default(&config_file);

    if args.print_config {
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let log_level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting voicesearch v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    let recognizer = Arc::new(SimulatedRecognizer::new(
        config.simulator.clone(),
        tokio::runtime::Handle::current(),
    ));
    let granted = config.simulator.permission_granted;
    let gate = Arc::new(move |_: &dyn HostSurface, _: Permission| granted);

    let plugin = Arc::new(VoiceSearchPlugin::from_config(
        &config,
        recognizer.clone(),
        gate,
    ));
    plugin.attach_to_engine();

    let surface: Arc<dyn HostSurface> = Arc::new(ConsoleSurface::new("console"));
    if args.detached {
        tracing::info!("Running without a host surface");
    } else {
        plugin.attach_surface(&surface);
    }

    let result = serve(tokio::io::stdin(), tokio::io::stdout(), Arc::clone(&plugin)).await;

    plugin.detach_surface();
    plugin.detach_from_engine();
    tracing::debug!(scripts = recognizer.running(), "Recognizer scripts left after shutdown");

    match result {
        Ok(()) => {
            tracing::info!("voicesearch stopped");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Channel failed");
            Err(e.into())
        }
    }
}
