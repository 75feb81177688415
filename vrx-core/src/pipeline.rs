//! Receiver-side enhancement pipeline.
//!
//! Entered only when the negotiated stream was downscaled. Walks the
//! received raw stream through four strictly sequential stages:
//!
//! 1. **Extracting** — ffmpeg splits the stream into PNG frames at
//!    the negotiated (reduced) resolution.
//! 2. **Enhancing** — each frame goes through the external inference
//!    model once, variant keyed by the scale factor.
//! 3. **Reassembling** — ffmpeg rebuilds a raw video from the
//!    enhanced frames at the *canonical* 1920×1080, never the
//!    transmitted tier. Recovering full resolution from a
//!    bandwidth-reduced transmission is the whole point.
//! 4. **Playing** — playback of the reconstruction.
//!
//! Stage failures are absorbed here: the pipeline parks itself in
//! `Failed`, logs the cause, and the node still exits cleanly. A
//! single bad frame is skipped; only a broken invocation mechanism
//! (the model runner itself cannot start) fails the enhancing stage.

use tracing::{error, info, warn};

use crate::error::{ToolError, VrxError};
use crate::policy::{CANONICAL_HEIGHT, CANONICAL_WIDTH, FRAME_RATE, ResolutionDecision};
use crate::stage::PipelineStage;
use crate::tool::{ToolCommand, ToolRunner};
use crate::transport;
use crate::workspace::{ENHANCED_SUFFIX, SessionWorkspace};

/// Default entry point of the per-frame enhancement model.
pub const DEFAULT_INFERENCE_SCRIPT: &str = "inference_realesrgan.py";

// ── Model selection ──────────────────────────────────────────────

/// Model variant for a scale factor. Unsupported factors fall back
/// to the x2 variant; the second element reports the fallback so the
/// caller can warn.
pub fn model_for_scale(scale: u32) -> (&'static str, bool) {
    match scale {
        2 => ("fine-tuned_g_x2plus", false),
        4 => ("fine-tuned_g_x4plus", false),
        _ => ("fine-tuned_g_x2plus", true),
    }
}

// ── EnhanceReport ────────────────────────────────────────────────

/// Outcome of the enhancing stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnhanceReport {
    /// Frames enhanced successfully.
    pub enhanced: usize,
    /// Frames skipped after a failed inference run.
    pub failed: usize,
}

// ── Command construction ─────────────────────────────────────────

/// ffmpeg invocation splitting the received stream into PNG frames.
pub fn extract_command(workspace: &SessionWorkspace, decision: &ResolutionDecision) -> ToolCommand {
    ToolCommand::new("ffmpeg").args([
        "-s:v".into(),
        format!("{}x{}", decision.width, decision.height),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-r".into(),
        FRAME_RATE.to_string(),
        "-i".into(),
        workspace.received_file().display().to_string(),
        workspace
            .lr_frames_dir()
            .join("frame_%04d.png")
            .display()
            .to_string(),
    ])
}

/// One inference run on one frame.
pub fn enhance_command(
    script: &str,
    model: &str,
    frame: &std::path::Path,
    out_dir: &std::path::Path,
    scale: u32,
) -> ToolCommand {
    ToolCommand::new("python3").args([
        script.into(),
        "-n".into(),
        model.into(),
        "-i".into(),
        frame.display().to_string(),
        "-o".into(),
        out_dir.display().to_string(),
        "-s".into(),
        scale.to_string(),
    ])
}

/// ffmpeg invocation rebuilding a raw video from the enhanced frames
/// at the canonical resolution.
pub fn reassemble_command(workspace: &SessionWorkspace) -> ToolCommand {
    ToolCommand::new("ffmpeg").args([
        "-framerate".into(),
        FRAME_RATE.to_string(),
        "-i".into(),
        workspace
            .sr_frames_dir()
            .join(format!("frame_%04d{ENHANCED_SUFFIX}.png"))
            .display()
            .to_string(),
        "-c:v".into(),
        "rawvideo".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-s".into(),
        format!("{CANONICAL_WIDTH}x{CANONICAL_HEIGHT}"),
        workspace.sr_video_file().display().to_string(),
    ])
}

// ── EnhancementPipeline ──────────────────────────────────────────

/// The receiver-side reconstruction state machine.
///
/// Built once per session after the stream is fully received, run
/// once, then inspected via [`stage`](Self::stage).
pub struct EnhancementPipeline<'r> {
    runner: &'r dyn ToolRunner,
    workspace: SessionWorkspace,
    decision: ResolutionDecision,
    inference_script: String,
    stage: PipelineStage,
}

impl<'r> EnhancementPipeline<'r> {
    pub fn new(
        runner: &'r dyn ToolRunner,
        workspace: SessionWorkspace,
        decision: ResolutionDecision,
    ) -> Self {
        Self {
            runner,
            workspace,
            decision,
            inference_script: DEFAULT_INFERENCE_SCRIPT.to_string(),
            stage: PipelineStage::default(),
        }
    }

    /// Override the inference entry point (config-driven).
    pub fn with_inference_script(mut self, script: impl Into<String>) -> Self {
        self.inference_script = script.into();
        self
    }

    /// The currently active stage.
    pub fn stage(&self) -> &PipelineStage {
        &self.stage
    }

    /// Run all stages in order, stopping at the first stage failure.
    ///
    /// Returns the terminal stage. `Err` only signals a transition
    /// misuse (running the same pipeline twice), never a tool
    /// failure — those land in [`PipelineStage::Failed`].
    pub async fn run(&mut self) -> Result<&PipelineStage, VrxError> {
        self.stage.begin_extracting()?;
        if let Err(e) = self.extract().await {
            error!("frame extraction failed: {e}");
            self.stage.fail("extraction", e.to_string())?;
            return Ok(&self.stage);
        }

        self.stage.begin_enhancing()?;
        match self.enhance().await {
            Ok(report) => {
                info!(
                    enhanced = report.enhanced,
                    failed = report.failed,
                    "enhancement stage complete"
                );
            }
            Err(e) => {
                error!("enhancement failed: {e}");
                self.stage.fail("enhancement", e.to_string())?;
                return Ok(&self.stage);
            }
        }

        self.stage.begin_reassembling()?;
        if let Err(e) = self.reassemble().await {
            error!("video reassembly failed: {e}");
            self.stage.fail("reassembly", e.to_string())?;
            return Ok(&self.stage);
        }

        self.stage.begin_playing()?;
        if let Err(e) =
            transport::play(self.runner, &self.workspace.sr_video_file(), CANONICAL_WIDTH, CANONICAL_HEIGHT)
                .await
        {
            error!("playback failed: {e}");
            self.stage.fail("playback", e.to_string())?;
            return Ok(&self.stage);
        }

        self.stage.complete()?;
        Ok(&self.stage)
    }

    // ── Stages ───────────────────────────────────────────────────

    async fn extract(&self) -> Result<(), VrxError> {
        self.workspace.clear_lr_frames()?;
        info!(
            "extracting frames from {} at {}x{}",
            self.workspace.received_file().display(),
            self.decision.width,
            self.decision.height
        );
        self.runner
            .run(extract_command(&self.workspace, &self.decision))
            .await?;
        Ok(())
    }

    async fn enhance(&self) -> Result<EnhanceReport, VrxError> {
        self.workspace.clear_sr_frames()?;

        let (model, fallback) = model_for_scale(self.decision.scale);
        if fallback {
            warn!(
                scale = self.decision.scale,
                "unsupported scale factor, falling back to model {model}"
            );
        }
        info!("model {model} selected");

        let frames = self.workspace.lr_frames()?;
        if frames.is_empty() {
            warn!("no extracted frames found, nothing to enhance");
            return Ok(EnhanceReport::default());
        }

        let sr_dir = self.workspace.sr_frames_dir();
        let mut report = EnhanceReport::default();
        for frame in &frames {
            let cmd = enhance_command(
                &self.inference_script,
                model,
                frame,
                &sr_dir,
                self.decision.scale,
            );
            match self.runner.run(cmd).await {
                Ok(_) => report.enhanced += 1,
                // The runner itself cannot start — nothing downstream
                // can succeed either, so the stage fails as a whole.
                Err(e @ ToolError::Launch { .. }) => return Err(e.into()),
                Err(e) => {
                    warn!("enhancement of {} failed, skipping: {e}", frame.display());
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    async fn reassemble(&self) -> Result<(), VrxError> {
        self.workspace.clear_sr_video()?;
        info!(
            "reassembling enhanced frames at {CANONICAL_WIDTH}x{CANONICAL_HEIGHT} -> {}",
            self.workspace.sr_video_file().display()
        );
        self.runner.run(reassemble_command(&self.workspace)).await?;
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::decide;
    use crate::tool::{RunningTool, ToolOutput};
    use async_trait::async_trait;
    use std::fs;
    use std::sync::Mutex;

    /// Directory `seeded_workspace` stages frames in; the fake
    /// extraction step copies them into the real frames directory,
    /// since the pipeline clears that directory before extracting.
    const STAGED_FRAMES_DIR: &str = "staged_frames";

    /// Records every command; fails those whose rendered form
    /// contains a configured substring. A successful extract command
    /// materializes the staged frames, like real ffmpeg would.
    #[derive(Default)]
    struct FakeRunner {
        calls: Mutex<Vec<String>>,
        fail_containing: Vec<String>,
        launch_fail_containing: Vec<String>,
    }

    impl FakeRunner {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ToolRunner for FakeRunner {
        async fn run(&self, cmd: ToolCommand) -> Result<ToolOutput, ToolError> {
            let rendered = cmd.to_string();
            self.calls.lock().unwrap().push(rendered.clone());
            if self.launch_fail_containing.iter().any(|s| rendered.contains(s)) {
                return Err(ToolError::Launch {
                    tool: cmd.program,
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
                });
            }
            if self.fail_containing.iter().any(|s| rendered.contains(s)) {
                use std::os::unix::process::ExitStatusExt;
                return Err(ToolError::Failed {
                    tool: cmd.program,
                    status: std::process::ExitStatus::from_raw(1 << 8),
                    stderr: "simulated failure".into(),
                });
            }
            if rendered.starts_with("ffmpeg -s:v") {
                // Extraction: the last argument is the output frame
                // pattern inside the lr-frames directory; its
                // grandparent is the workspace root holding the
                // staged frames.
                let pattern = std::path::Path::new(cmd.args.last().unwrap());
                let lr_dir = pattern.parent().unwrap();
                let staged = lr_dir.parent().unwrap().join(STAGED_FRAMES_DIR);
                if staged.is_dir() {
                    for entry in fs::read_dir(&staged).unwrap() {
                        let entry = entry.unwrap();
                        fs::copy(entry.path(), lr_dir.join(entry.file_name())).unwrap();
                    }
                }
            }
            Ok(ToolOutput::default())
        }

        async fn spawn(&self, cmd: ToolCommand) -> Result<Box<dyn RunningTool>, ToolError> {
            self.calls.lock().unwrap().push(format!("spawn {cmd}"));
            struct Noop;
            #[async_trait]
            impl RunningTool for Noop {
                async fn stop(&mut self) {}
            }
            Ok(Box::new(Noop))
        }
    }

    fn seeded_workspace(frames: &[&str]) -> (tempfile::TempDir, SessionWorkspace) {
        let tmp = tempfile::tempdir().unwrap();
        let ws = SessionWorkspace::at(tmp.path());
        let staged = ws.root().join(STAGED_FRAMES_DIR);
        fs::create_dir_all(&staged).unwrap();
        for name in frames {
            fs::write(staged.join(name), b"png").unwrap();
        }
        (tmp, ws)
    }

    #[tokio::test]
    async fn moderate_downscale_runs_all_stages_with_x2_model() {
        let (_tmp, ws) = seeded_workspace(&["frame_0001.png", "frame_0002.png"]);
        let runner = FakeRunner::default();
        let mut pipeline = EnhancementPipeline::new(&runner, ws, decide(500.0));

        let stage = pipeline.run().await.unwrap();
        assert!(stage.is_done());

        let calls = runner.calls();
        assert!(calls[0].starts_with("ffmpeg"), "extract first: {calls:?}");
        assert!(calls[1].contains("fine-tuned_g_x2plus"));
        assert!(calls[1].contains("-s 2"));
        // Frames enhanced in lexicographic order.
        assert!(calls[1].contains("frame_0001.png"));
        assert!(calls[2].contains("frame_0002.png"));
        // Reassembly targets the canonical resolution.
        let reassemble = &calls[3];
        assert!(reassemble.contains("-s 1920x1080"));
        assert!(reassemble.contains("frame_%04d_out.png"));
        // Playback at canonical resolution.
        assert!(calls[4].contains("autovideosink"));
        assert!(calls[4].contains("width=1920"));
    }

    #[tokio::test]
    async fn severe_downscale_uses_x4_model_but_canonical_reassembly() {
        let (_tmp, ws) = seeded_workspace(&["frame_0001.png"]);
        let runner = FakeRunner::default();
        let mut pipeline = EnhancementPipeline::new(&runner, ws, decide(100.0));

        assert!(pipeline.run().await.unwrap().is_done());

        let calls = runner.calls();
        assert!(calls[1].contains("fine-tuned_g_x4plus"));
        assert!(calls[1].contains("-s 4"));
        assert!(calls[2].contains("-s 1920x1080"));
    }

    #[tokio::test]
    async fn single_frame_failure_is_skipped_not_fatal() {
        let (_tmp, ws) =
            seeded_workspace(&["frame_0001.png", "frame_0002.png", "frame_0003.png"]);
        let runner = FakeRunner {
            fail_containing: vec!["frame_0002.png".into()],
            ..Default::default()
        };
        let mut pipeline = EnhancementPipeline::new(&runner, ws, decide(500.0));

        let stage = pipeline.run().await.unwrap();
        assert!(stage.is_done(), "pipeline must complete: {stage}");

        // All three frames attempted, then reassembly still ran.
        let calls = runner.calls();
        assert!(calls.iter().any(|c| c.contains("frame_0003.png")));
        assert!(calls.iter().any(|c| c.contains("-s 1920x1080")));
    }

    #[tokio::test]
    async fn extraction_failure_parks_pipeline_in_failed() {
        let (_tmp, ws) = seeded_workspace(&[]);
        let runner = FakeRunner {
            fail_containing: vec!["ffmpeg -s:v".into()],
            ..Default::default()
        };
        let mut pipeline = EnhancementPipeline::new(&runner, ws, decide(500.0));

        let stage = pipeline.run().await.unwrap();
        assert!(matches!(
            stage,
            PipelineStage::Failed { stage: "extraction", .. }
        ));
        // Nothing past extraction ran.
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn broken_model_runner_fails_the_stage() {
        let (_tmp, ws) = seeded_workspace(&["frame_0001.png", "frame_0002.png"]);
        let runner = FakeRunner {
            launch_fail_containing: vec!["python3".into()],
            ..Default::default()
        };
        let mut pipeline = EnhancementPipeline::new(&runner, ws, decide(500.0));

        let stage = pipeline.run().await.unwrap();
        assert!(matches!(
            stage,
            PipelineStage::Failed { stage: "enhancement", .. }
        ));
        // No reassembly after a dead invocation mechanism.
        assert!(!runner.calls().iter().any(|c| c.contains("1920x1080")));
    }

    #[tokio::test]
    async fn zero_frames_is_a_warning_not_a_failure() {
        let (_tmp, ws) = seeded_workspace(&[]);
        let runner = FakeRunner::default();
        let mut pipeline = EnhancementPipeline::new(&runner, ws, decide(500.0));

        let stage = pipeline.run().await.unwrap();
        assert!(stage.is_done());
        // No inference calls, straight to reassembly.
        assert!(!runner.calls().iter().any(|c| c.starts_with("python3")));
    }

    #[tokio::test]
    async fn reassembly_failure_stops_before_playback() {
        let (_tmp, ws) = seeded_workspace(&["frame_0001.png"]);
        let runner = FakeRunner {
            fail_containing: vec!["-framerate".into()],
            ..Default::default()
        };
        let mut pipeline = EnhancementPipeline::new(&runner, ws, decide(500.0));

        let stage = pipeline.run().await.unwrap();
        assert!(matches!(
            stage,
            PipelineStage::Failed { stage: "reassembly", .. }
        ));
        assert!(!runner.calls().iter().any(|c| c.contains("autovideosink")));
    }

    #[test]
    fn unsupported_scale_falls_back_to_x2() {
        assert_eq!(model_for_scale(2), ("fine-tuned_g_x2plus", false));
        assert_eq!(model_for_scale(4), ("fine-tuned_g_x4plus", false));
        assert_eq!(model_for_scale(3), ("fine-tuned_g_x2plus", true));
        assert_eq!(model_for_scale(1), ("fine-tuned_g_x2plus", true));
    }
}
