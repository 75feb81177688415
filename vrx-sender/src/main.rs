//! VRX sender — entry point.
//!
//! ```text
//! vrx-sender <source.yuv> <receiver-host>   Run one relay session
//! vrx-sender --config <path> ...            Load a custom config TOML
//! vrx-sender --gen-config                   Write default config to stdout
//! ```
//!
//! Exits 0 when the session completed (including the unscaled path);
//! non-zero on any fatal error — failed measurement, failed metadata
//! handshake, or failed pre-stream transform.

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use vrx_core::ProcessRunner;
use vrx_sender::config::SenderConfig;
use vrx_sender::session::SenderSession;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "vrx-sender", about = "VRX bandwidth-adaptive video sender")]
struct Cli {
    /// Raw i420 source video file (1920x1080 @ 25 fps).
    #[arg(required_unless_present = "gen_config")]
    source: Option<PathBuf>,

    /// Receiver host (IP or name).
    #[arg(required_unless_present = "gen_config")]
    receiver: Option<String>,

    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "vrx-sender.toml")]
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
        let text = toml::to_string_pretty(&SenderConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let config = SenderConfig::load(&cli.config);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // required_unless_present guarantees these in this branch.
    let source = cli.source.expect("source is required");
    let receiver = cli.receiver.expect("receiver is required");

    info!("vrx-sender v{}", env!("CARGO_PKG_VERSION"));
    info!("source: {}", source.display());
    info!("receiver: {receiver}");

    let runner = ProcessRunner;
    let session = SenderSession::new(config, &runner);

    match session.run(&source, &receiver).await {
        Ok(decision) => {
            info!("session complete ({decision})");
            Ok(())
        }
        Err(e) => {
            error!("session aborted: {e}");
            std::process::exit(1);
        }
    }
}
