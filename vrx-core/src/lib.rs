//! # vrx-core
//!
//! Core library for the VRX bandwidth-adaptive video relay.
//!
//! This crate contains:
//! - **Probe**: one-shot `iperf3` uplink measurement and parsing
//! - **Policy**: throughput → resolution tier, the fixed three-tier map
//! - **Control**: one-shot TCP handshakes (resolution metadata, done signal)
//! - **Transport**: GStreamer send/receive/downscale/play pipelines
//! - **Workspace**: the four session directory roles with idempotent cleanup
//! - **Stage / Pipeline**: the receiver-side enhancement state machine
//! - **Tool**: the `ToolRunner` seam every external process goes through
//! - **Error**: `VrxError` — typed, `thiserror`-based error hierarchy

pub mod control;
pub mod error;
pub mod pipeline;
pub mod policy;
pub mod probe;
pub mod stage;
pub mod tool;
pub mod transport;
pub mod workspace;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use control::{DEFAULT_DONE_PORT, DEFAULT_METADATA_PORT, DONE_TOKEN};
pub use error::{ToolError, VrxError};
pub use pipeline::{EnhanceReport, EnhancementPipeline};
pub use policy::{
    CANONICAL_HEIGHT, CANONICAL_WIDTH, FRAME_RATE, ResolutionDecision, decide,
};
pub use stage::PipelineStage;
pub use tool::{ProcessRunner, RunningTool, ToolCommand, ToolOutput, ToolRunner};
pub use transport::{DEFAULT_MEDIA_PORT, StreamHandle};
pub use workspace::SessionWorkspace;
