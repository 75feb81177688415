//! Domain-specific error types for the VRX relay.
//!
//! All fallible operations return `Result<T, VrxError>`.
//! Session-aborting errors bubble up to the binary's `main` and
//! terminate the node with a non-zero status; degraded conditions
//! are absorbed at stage boundaries and only logged.

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for the relay.
#[derive(Debug, Error)]
pub enum VrxError {
    // ── Measurement ──────────────────────────────────────────────
    /// The bandwidth probe could not produce a throughput figure.
    ///
    /// Without it the resolution cannot be decided, so the session
    /// cannot proceed.
    #[error("bandwidth measurement unavailable: {0}")]
    MeasurementUnavailable(String),

    // ── Control channel ──────────────────────────────────────────
    /// The resolution-metadata connection or write failed.
    ///
    /// The receiver cannot construct its pipeline without the
    /// metadata, so the sender must abort instead of streaming.
    #[error("could not send resolution metadata: {0}")]
    HandshakeSendFailed(std::io::Error),

    /// Accept or read failed while waiting for resolution metadata.
    #[error("could not receive resolution metadata: {0}")]
    MetadataReceiveFailed(std::io::Error),

    /// Metadata arrived but `width` or `height` was missing or
    /// unparsable. There is no safe resolution to guess.
    #[error("malformed resolution metadata: {0}")]
    MetadataMalformed(&'static str),

    /// A bounded control-channel wait expired.
    #[error("handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    // ── Transport ────────────────────────────────────────────────
    /// The pre-stream downscale transform failed. Streaming must not
    /// begin — a partial or garbage stream is worse than none.
    #[error("downscale transform failed: {0}")]
    TransformFailed(ToolError),

    // ── Pipeline ─────────────────────────────────────────────────
    /// An enhancement-pipeline stage transition was attempted out of
    /// order. Stages are strictly sequential with no re-entry.
    #[error("pipeline stage violation: {0}")]
    StageViolation(&'static str),

    // ── I/O ──────────────────────────────────────────────────────
    /// Filesystem or socket error outside the handshakes.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ── Tools ────────────────────────────────────────────────────
    /// An external tool invocation failed outside any named stage.
    #[error("tool error: {0}")]
    Tool(#[from] ToolError),
}

// ── ToolError ─────────────────────────────────────────────────────

/// Typed error for external tool invocations.
///
/// Distinguishes "the process could not be started at all" from "the
/// process ran and reported failure" — the pipeline treats these
/// differently (a missing binary fails the whole stage, a non-zero
/// exit on one frame is skipped).
#[derive(Debug, Error)]
pub enum ToolError {
    /// The tool binary could not be spawned.
    #[error("failed to launch `{tool}`: {source}")]
    Launch {
        tool: String,
        source: std::io::Error,
    },

    /// The tool ran but exited unsuccessfully.
    #[error("`{tool}` exited with {status}: {stderr}")]
    Failed {
        tool: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    /// Waiting on the tool failed at the OS level.
    #[error("failed waiting on `{tool}`: {source}")]
    Wait {
        tool: String,
        source: std::io::Error,
    },
}

impl ToolError {
    /// Name of the tool that failed.
    pub fn tool(&self) -> &str {
        match self {
            Self::Launch { tool, .. } | Self::Failed { tool, .. } | Self::Wait { tool, .. } => tool,
        }
    }
}
