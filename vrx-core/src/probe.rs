//! Bandwidth probe: one bounded `iperf3` run per session.
//!
//! The sender runs an uplink UDP test against the receiver and reads
//! the receiver-reported bitrate out of the summary table. Parsing is
//! split out as a pure function so it can be tested on captured
//! output without spawning anything.

use tracing::info;

use crate::error::VrxError;
use crate::tool::{ToolCommand, ToolRunner};

/// UDP target rate handed to iperf3; high enough to saturate the
/// uplinks this system is deployed on.
const PROBE_TARGET_RATE: &str = "800M";

/// Measure uplink throughput against `target` in Mbit/s.
///
/// Runs `iperf3 -c <target> -u -b 800M` to completion (iperf3's own
/// default duration bounds the test) and extracts the receiver-side
/// bitrate. Exactly one attempt; any failure — spawn, non-zero exit,
/// or an unparsable report — is [`VrxError::MeasurementUnavailable`]
/// and the session cannot proceed.
pub async fn measure(runner: &dyn ToolRunner, target: &str) -> Result<f64, VrxError> {
    let cmd = ToolCommand::new("iperf3").args(["-c", target, "-u", "-b", PROBE_TARGET_RATE]);

    let output = runner
        .run(cmd)
        .await
        .map_err(|e| VrxError::MeasurementUnavailable(e.to_string()))?;

    let mbps = parse_receiver_mbps(&output.stdout).ok_or_else(|| {
        VrxError::MeasurementUnavailable("no receiver bitrate line in iperf3 output".into())
    })?;

    info!("current bandwidth: {mbps:.2} Mbit/s");
    Ok(mbps)
}

/// Run a one-shot `iperf3 -s -1` server so the sender's probe has
/// something to test against. Blocks until the single test finishes.
pub async fn serve_one(runner: &dyn ToolRunner) -> Result<(), VrxError> {
    info!("starting one-shot iperf3 server, waiting for bandwidth test");
    runner
        .run(ToolCommand::new("iperf3").args(["-s", "-1"]))
        .await
        .map_err(|e| VrxError::MeasurementUnavailable(e.to_string()))?;
    info!("bandwidth test served, iperf3 server exited");
    Ok(())
}

/// Extract the Mbit/s figure from the `receiver` summary line.
///
/// Scans for a line containing `receiver` and takes the numeric token
/// immediately preceding a `Mbits/sec` token on that line.
pub fn parse_receiver_mbps(stdout: &str) -> Option<f64> {
    for line in stdout.lines() {
        if !line.contains("receiver") {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        for pair in tokens.windows(2) {
            if pair[1] == "Mbits/sec" {
                if let Ok(mbps) = pair[0].parse::<f64>() {
                    return Some(mbps);
                }
            }
        }
    }
    None
}

// ── Tests ────────────────────────────────────────────────────────
