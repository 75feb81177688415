//! Media transport driver: GStreamer pipelines on both ends.
//!
//! The driver never touches frames itself — it builds `gst-launch-1.0`
//! argument vectors and runs them through the [`ToolRunner`] seam.
//! Command construction is split from execution so the exact
//! pipelines are testable without any media tooling installed.
//!
//! Transport is raw i420 frames over RTP/UDP at a fixed 25 fps, with
//! the format descriptor carried in the receiver's caps string at
//! pipeline-construction time; nothing is re-negotiated mid-stream.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{ToolError, VrxError};
use crate::policy::{FRAME_RATE, ResolutionDecision};
use crate::tool::{RunningTool, ToolCommand, ToolRunner};
use crate::workspace::SessionWorkspace;

/// Default UDP port for the media stream.
pub const DEFAULT_MEDIA_PORT: u16 = 5000;

const GST: &str = "gst-launch-1.0";

// ── Command construction ─────────────────────────────────────────

/// Filename for the downscaled copy of the source.
pub fn downscaled_filename(decision: &ResolutionDecision) -> String {
    format!("downscaled_{}.yuv", decision.label)
}

/// RTP caps advertised by the receive pipeline for raw i420 video at
/// the negotiated dimensions.
fn rtp_caps(width: u32, height: u32) -> String {
    format!(
        "application/x-rtp, media=(string)video, clock-rate=(int)90000, \
         encoding-name=(string)RAW, sampling=(string)YCbCr-4:2:0, \
         depth=(string)8, width=(string){width}, height=(string){height}"
    )
}

/// Blocking downscale of the canonical-resolution source to the
/// decided tier, written next to the source file.
pub fn downscale_command(source: &Path, decision: &ResolutionDecision, output: &Path) -> ToolCommand {
    ToolCommand::new(GST).args([
        "filesrc".into(),
        format!("location={}", source.display()),
        "!".into(),
        "rawvideoparse".into(),
        "format=i420".into(),
        format!("width={}", crate::policy::CANONICAL_WIDTH),
        format!("height={}", crate::policy::CANONICAL_HEIGHT),
        format!("framerate={FRAME_RATE}/1"),
        "!".into(),
        "videoscale".into(),
        "!".into(),
        format!("video/x-raw,width={},height={}", decision.width, decision.height),
        "!".into(),
        "filesink".into(),
        format!("location={}", output.display()),
    ])
}

/// Continuous RTP send of `file` at the decided dimensions.
pub fn stream_command(
    file: &Path,
    decision: &ResolutionDecision,
    receiver_host: &str,
    port: u16,
) -> ToolCommand {
    ToolCommand::new(GST).args([
        "filesrc".into(),
        format!("location={}", file.display()),
        "!".into(),
        "rawvideoparse".into(),
        "format=i420".into(),
        format!("width={}", decision.width),
        format!("height={}", decision.height),
        format!("framerate={FRAME_RATE}/1"),
        "!".into(),
        "rtpvrawpay".into(),
        "!".into(),
        "udpsink".into(),
        format!("host={receiver_host}"),
        format!("port={port}"),
    ])
}

/// Long-running RTP receive pipeline writing the raw stream to
/// `output`.
pub fn receive_command(decision: &ResolutionDecision, output: &Path, port: u16) -> ToolCommand {
    ToolCommand::new(GST).args([
        "udpsrc".into(),
        format!("uri=udp://0.0.0.0:{port}"),
        format!("caps={}", rtp_caps(decision.width, decision.height)),
        "!".into(),
        "rtpvrawdepay".into(),
        "!".into(),
        "queue".into(),
        "!".into(),
        "videoconvert".into(),
        "!".into(),
        "filesink".into(),
        format!("location={}", output.display()),
    ])
}

/// Blocking playback of a raw i420 file.
pub fn play_command(file: &Path, width: u32, height: u32) -> ToolCommand {
    ToolCommand::new(GST).args([
        "filesrc".into(),
        format!("location={}", file.display()),
        "!".into(),
        "videoparse".into(),
        "format=2".into(), // i420
        format!("width={width}"),
        format!("height={height}"),
        format!("framerate={FRAME_RATE}/1"),
        "!".into(),
        "autovideosink".into(),
    ])
}

// ── Execution ────────────────────────────────────────────────────

/// Produce the resolution-reduced copy of `source` before streaming.
///
/// Fatal on failure: streaming a partial or garbage transform is
/// worse than not streaming at all.
pub async fn downscale(
    runner: &dyn ToolRunner,
    source: &Path,
    decision: &ResolutionDecision,
) -> Result<PathBuf, VrxError> {
    let output = source.with_file_name(downscaled_filename(decision));
    info!(
        "downscaling {} to {}x{} -> {}",
        source.display(),
        decision.width,
        decision.height,
        output.display()
    );
    runner
        .run(downscale_command(source, decision, &output))
        .await
        .map_err(VrxError::TransformFailed)?;
    Ok(output)
}

/// Stream `file` to the receiver, blocking until the pipeline ends.
///
/// The error is returned rather than escalated: the sender proceeds
/// to the done signal whether or not the transport succeeded.
pub async fn stream(
    runner: &dyn ToolRunner,
    file: &Path,
    decision: &ResolutionDecision,
    receiver_host: &str,
    port: u16,
) -> Result<(), ToolError> {
    info!("streaming {} to {receiver_host}:{port}", file.display());
    runner
        .run(stream_command(file, decision, receiver_host, port))
        .await?;
    Ok(())
}

/// Start the long-running receive pipeline.
///
/// Clears the received-media area first (stale stream removal) and
/// returns the handle the orchestrator stops after the done signal.
pub async fn start_receive(
    runner: &dyn ToolRunner,
    decision: &ResolutionDecision,
    workspace: &SessionWorkspace,
    port: u16,
) -> Result<StreamHandle, VrxError> {
    workspace.clear_received()?;
    let output = workspace.received_file();
    info!(
        "receive pipeline on udp://0.0.0.0:{port} at {}x{} -> {}",
        decision.width,
        decision.height,
        output.display()
    );
    let inner = runner.spawn(receive_command(decision, &output, port)).await?;
    Ok(StreamHandle { inner })
}

/// Play a raw file, blocking until playback ends.
pub async fn play(
    runner: &dyn ToolRunner,
    file: &Path,
    width: u32,
    height: u32,
) -> Result<(), ToolError> {
    info!("playing {} at {width}x{height}", file.display());
    runner.run(play_command(file, width, height)).await?;
    Ok(())
}

// ── StreamHandle ─────────────────────────────────────────────────

/// Owned handle to the receive pipeline process.
///
/// Exclusively owned by the orchestrator that started it; `stop` is
/// idempotent and a no-op when the process has already exited.
pub struct StreamHandle {
    inner: Box<dyn RunningTool>,
}

impl StreamHandle {
    pub async fn stop(&mut self) {
        self.inner.stop().await;
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::decide;

    #[test]
    fn downscale_parses_canonical_and_scales_to_tier() {
        let d = decide(500.0);
        let cmd = downscale_command(
            Path::new("source.yuv"),
            &d,
            Path::new("downscaled_540p.yuv"),
        );
        assert_eq!(cmd.program, GST);
        assert!(cmd.args.contains(&"width=1920".to_string()));
        assert!(cmd.args.contains(&"height=1080".to_string()));
        assert!(cmd.args.contains(&"video/x-raw,width=960,height=540".to_string()));
        assert!(cmd.args.contains(&"location=downscaled_540p.yuv".to_string()));
    }

    #[test]
    fn downscaled_filename_uses_label() {
        assert_eq!(downscaled_filename(&decide(100.0)), "downscaled_270p.yuv");
        assert_eq!(downscaled_filename(&decide(500.0)), "downscaled_540p.yuv");
    }

    #[test]
    fn stream_targets_receiver_at_tier_dimensions() {
        let d = decide(100.0);
        let cmd = stream_command(Path::new("downscaled_270p.yuv"), &d, "192.168.1.20", 5000);
        assert!(cmd.args.contains(&"width=480".to_string()));
        assert!(cmd.args.contains(&"height=270".to_string()));
        assert!(cmd.args.contains(&"host=192.168.1.20".to_string()));
        assert!(cmd.args.contains(&"port=5000".to_string()));
        assert!(cmd.args.contains(&"rtpvrawpay".to_string()));
    }

    #[test]
    fn receive_caps_carry_negotiated_dimensions() {
        let d = decide(500.0);
        let cmd = receive_command(&d, Path::new("/tmp/received_video.yuv"), 5000);
        let caps = cmd
            .args
            .iter()
            .find(|a| a.starts_with("caps="))
            .expect("caps argument");
        assert!(caps.contains("width=(string)960"));
        assert!(caps.contains("height=(string)540"));
        assert!(caps.contains("clock-rate=(int)90000"));
        assert!(caps.contains("YCbCr-4:2:0"));
        assert!(cmd.args.contains(&"uri=udp://0.0.0.0:5000".to_string()));
    }

    #[test]
    fn play_uses_given_dimensions_and_framerate() {
        let cmd = play_command(Path::new("sr_video.yuv"), 1920, 1080);
        assert!(cmd.args.contains(&"width=1920".to_string()));
        assert!(cmd.args.contains(&"height=1080".to_string()));
        assert!(cmd.args.contains(&"framerate=25/1".to_string()));
        assert!(cmd.args.contains(&"autovideosink".to_string()));
    }
}
