//! Receiver-side session orchestrator.
//!
//! Sequences one end-to-end session and owns the ordering guarantees
//! the control protocol itself does not provide:
//!
//! 1. serve the sender's bandwidth test,
//! 2. receive the resolution metadata (fatal on timeout/malformed),
//! 3. start the receive pipeline — always before the done signal can
//!    be acted upon,
//! 4. wait for the done signal, then stop the pipeline exactly once,
//! 5. enhance and play (scaled) or play directly (unscaled).
//!
//! The receive pipeline runs as an independent external process; the
//! only synchronization with the sender is the out-of-band done
//! signal.

use tokio::net::TcpListener;
use tracing::{error, info, warn};

use vrx_core::tool::ToolRunner;
use vrx_core::{
    EnhancementPipeline, PipelineStage, ResolutionDecision, SessionWorkspace, VrxError, control,
    probe, transport,
};

use crate::config::ReceiverConfig;

// ── SessionOutcome ───────────────────────────────────────────────

/// What one receiver session produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    /// The decision negotiated with the sender.
    pub decision: ResolutionDecision,
    /// Terminal pipeline stage, or `None` when the stream was not
    /// scaled and the pipeline was skipped entirely.
    pub pipeline: Option<PipelineStage>,
}

// ── ReceiverSession ──────────────────────────────────────────────

/// One receiver-side session against a single sender.
pub struct ReceiverSession<'r> {
    config: ReceiverConfig,
    runner: &'r dyn ToolRunner,
}

impl<'r> ReceiverSession<'r> {
    pub fn new(config: ReceiverConfig, runner: &'r dyn ToolRunner) -> Self {
        Self { config, runner }
    }

    /// Bind the control ports from config and run the session.
    pub async fn run(&self) -> Result<SessionOutcome, VrxError> {
        // Both listeners exist before the sender is served, so no
        // control message can ever race a missing listener.
        let metadata =
            TcpListener::bind(("0.0.0.0", self.config.control.metadata_port)).await?;
        let done = TcpListener::bind(("0.0.0.0", self.config.control.done_port)).await?;
        self.run_with_listeners(metadata, done).await
    }

    /// Run the session on pre-bound listeners (tests use ephemeral
    /// ports).
    pub async fn run_with_listeners(
        &self,
        metadata: TcpListener,
        done: TcpListener,
    ) -> Result<SessionOutcome, VrxError> {
        // 1. One-shot iperf3 server for the sender's probe.
        probe::serve_one(self.runner).await?;

        // 2. Resolution metadata — fatal if absent or malformed, the
        //    pipeline cannot be constructed without it.
        info!(
            "waiting for resolution metadata on port {}",
            self.config.control.metadata_port
        );
        let decision =
            control::recv_metadata(&metadata, self.config.control.metadata_timeout()).await?;
        drop(metadata); // session-scoped: one connection, then closed
        info!("negotiated tier: {decision}");

        let workspace = SessionWorkspace::at(&self.config.enhancement.workspace_root);

        // 3. Receive pipeline starts before the done signal is
        //    consumed (listener-before-talker ordering).
        let mut stream =
            transport::start_receive(self.runner, &decision, &workspace, self.config.media.port)
                .await?;

        // 4. Bounded wait for the completion signal. The pipeline is
        //    stopped exactly once on every path, including timeout.
        let waited = control::recv_done(&done, self.config.control.done_timeout()).await;
        stream.stop().await;
        waited?;

        // 5. Reconstruction or direct playback.
        if decision.scaled {
            let mut pipeline =
                EnhancementPipeline::new(self.runner, workspace, decision.clone())
                    .with_inference_script(&self.config.enhancement.inference_script);
            let stage = pipeline.run().await?.clone();
            match &stage {
                PipelineStage::Done => info!("enhancement pipeline complete"),
                other => error!("enhancement pipeline stopped at {other}"),
            }
            Ok(SessionOutcome {
                decision,
                pipeline: Some(stage),
            })
        } else {
            info!("original resolution received, no enhancement will be executed");
            if let Err(e) = transport::play(
                self.runner,
                &workspace.received_file(),
                decision.width,
                decision.height,
            )
            .await
            {
                warn!("playback failed: {e}");
            }
            Ok(SessionOutcome {
                decision,
                pipeline: None,
            })
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
