//! VRX receiver — entry point.
//!
//! ```text
//! vrx-receiver                   Run one relay session, then exit
//! vrx-receiver --config <path>   Load a custom config TOML
//! vrx-receiver --gen-config      Write default config to stdout
//! ```
//!
//! Runs until one full session completes. Exits 0 on success —
//! including the unscaled path and a pipeline that parked itself in
//! `Failed` (stage failures are absorbed, not escalated) — and
//! non-zero on any fatal error: handshake timeout, malformed
//! metadata, or I/O failure on the control ports.

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use vrx_core::ProcessRunner;
use vrx_receiver::config::ReceiverConfig;
use vrx_receiver::session::ReceiverSession;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "vrx-receiver", about = "VRX receiving node with super-resolution playback")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "vrx-receiver.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ReceiverConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let config = ReceiverConfig::load(&cli.config);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("vrx-receiver v{}", env!("CARGO_PKG_VERSION"));
    info!("metadata port: {}", config.control.metadata_port);
    info!("done port: {}", config.control.done_port);
    info!("media port: {}", config.media.port);
    info!("workspace: {}", config.enhancement.workspace_root.display());

    let runner = ProcessRunner;
    let session = ReceiverSession::new(config, &runner);

    match session.run().await {
        Ok(outcome) => {
            match outcome.pipeline {
                Some(stage) => info!("session complete ({}, pipeline {stage})", outcome.decision),
                None => info!("session complete ({}, no enhancement)", outcome.decision),
            }
            Ok(())
        }
        Err(e) => {
            error!("session aborted: {e}");
            std::process::exit(1);
        }
    }
}
