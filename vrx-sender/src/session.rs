//! Sender-side session orchestrator.
//!
//! Sequences one end-to-end session: measure uplink bandwidth,
//! decide the transmission tier, hand the decision to the receiver,
//! downscale if needed, stream, signal completion.
//!
//! Failure escalation follows the control/data split: everything the
//! receiver needs to construct its pipeline (measurement, metadata
//! handshake, downscale transform) is fatal; the continuous stream
//! and the done signal are best-effort — once streaming has been
//! attempted, the receiver is told the session is over regardless.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use vrx_core::tool::ToolRunner;
use vrx_core::{ResolutionDecision, VrxError, control, policy, probe, transport};

use crate::config::SenderConfig;

// ── SenderSession ────────────────────────────────────────────────

/// One sender-side session against a single receiver.
pub struct SenderSession<'r> {
    config: SenderConfig,
    runner: &'r dyn ToolRunner,
}

impl<'r> SenderSession<'r> {
    pub fn new(config: SenderConfig, runner: &'r dyn ToolRunner) -> Self {
        Self { config, runner }
    }

    /// Run the full session: stream `source` to `receiver_host`.
    ///
    /// Returns the decision that was negotiated, mainly for logging
    /// and tests.
    pub async fn run(
        &self,
        source: &Path,
        receiver_host: &str,
    ) -> Result<ResolutionDecision, VrxError> {
        // 1. Bandwidth probe — without a figure there is no decision.
        let mbps = probe::measure(self.runner, receiver_host).await?;

        // 2. Pure policy step.
        let decision = policy::decide(mbps);
        info!("negotiated tier: {decision} from {mbps:.2} Mbit/s");

        // 3. Metadata handshake. The receiver cannot build its
        //    pipeline without this, so failure aborts before any
        //    streaming.
        let meta_addr = format!("{receiver_host}:{}", self.config.control.metadata_port);
        control::send_metadata(&meta_addr, &decision).await?;

        // 4. Pre-stream transform when the tier is reduced.
        let file: PathBuf = if decision.scaled {
            transport::downscale(self.runner, source, &decision).await?
        } else {
            info!("bandwidth supports the original resolution, no downscaling needed");
            source.to_path_buf()
        };

        // 5. Stream. A transport failure is reported but the session
        //    still proceeds to the done signal.
        if let Err(e) =
            transport::stream(self.runner, &file, &decision, receiver_host, self.config.media.port)
                .await
        {
            warn!("streaming pipeline failed: {e}");
        }

        // 6. Completion signal, also best-effort.
        let done_addr = format!("{receiver_host}:{}", self.config.control.done_port);
        if let Err(e) = control::send_done(&done_addr).await {
            warn!("could not send done signal: {e}");
        }

        Ok(decision)
    }
}

// ── Tests ────────────────────────────────────────────────────────
