//! Enhancement-pipeline stage machine.
//!
//! Models the receiver-side pipeline lifecycle with validated
//! transitions that return `Result` instead of panicking. The
//! sequence is monotonic — no stage is ever re-entered within a
//! session.
//!
//! ```text
//!  Received ──► Extracting ──► Enhancing ──► Reassembling ──► Playing ──► Done
//!      │             │             │               │              │
//!      └─────────────┴─────────────┴───────────────┴──────────────┴──► Failed
//! ```

use crate::error::VrxError;

// ── PipelineStage ────────────────────────────────────────────────

/// The currently active stage of the enhancement pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PipelineStage {
    /// Stream fully received; pipeline not yet started.
    #[default]
    Received,

    /// Extracting low-resolution frames from the received stream.
    Extracting,

    /// Running per-frame enhancement inference.
    Enhancing,

    /// Reassembling enhanced frames into a video at the canonical
    /// resolution.
    Reassembling,

    /// Playing the reassembled video.
    Playing,

    /// Terminal: playback finished.
    Done,

    /// Terminal: a stage could not complete. Reachable from any
    /// active stage.
    Failed {
        /// Name of the stage that failed.
        stage: &'static str,
        /// Human-readable cause.
        reason: String,
    },
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Received => write!(f, "Received"),
            Self::Extracting => write!(f, "Extracting"),
            Self::Enhancing => write!(f, "Enhancing"),
            Self::Reassembling => write!(f, "Reassembling"),
            Self::Playing => write!(f, "Playing"),
            Self::Done => write!(f, "Done"),
            Self::Failed { stage, .. } => write!(f, "Failed({stage})"),
        }
    }
}

impl PipelineStage {
    /// `true` in either terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed { .. })
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Extracting`. Valid from: `Received`.
    pub fn begin_extracting(&mut self) -> Result<(), VrxError> {
        match self {
            Self::Received => {
                *self = Self::Extracting;
                Ok(())
            }
            _ => Err(VrxError::StageViolation(
                "cannot extract: stream not in Received state",
            )),
        }
    }

    /// Transition to `Enhancing`. Valid from: `Extracting`.
    pub fn begin_enhancing(&mut self) -> Result<(), VrxError> {
        match self {
            Self::Extracting => {
                *self = Self::Enhancing;
                Ok(())
            }
            _ => Err(VrxError::StageViolation(
                "cannot enhance: not in Extracting state",
            )),
        }
    }

    /// Transition to `Reassembling`. Valid from: `Enhancing`.
    pub fn begin_reassembling(&mut self) -> Result<(), VrxError> {
        match self {
            Self::Enhancing => {
                *self = Self::Reassembling;
                Ok(())
            }
            _ => Err(VrxError::StageViolation(
                "cannot reassemble: not in Enhancing state",
            )),
        }
    }

    /// Transition to `Playing`. Valid from: `Reassembling`.
    pub fn begin_playing(&mut self) -> Result<(), VrxError> {
        match self {
            Self::Reassembling => {
                *self = Self::Playing;
                Ok(())
            }
            _ => Err(VrxError::StageViolation(
                "cannot play: not in Reassembling state",
            )),
        }
    }

    /// Transition to `Done`. Valid from: `Playing`.
    pub fn complete(&mut self) -> Result<(), VrxError> {
        match self {
            Self::Playing => {
                *self = Self::Done;
                Ok(())
            }
            _ => Err(VrxError::StageViolation(
                "cannot complete: not in Playing state",
            )),
        }
    }

    /// Transition to `Failed`. Valid from any non-terminal stage.
    pub fn fail(&mut self, stage: &'static str, reason: impl Into<String>) -> Result<(), VrxError> {
        if self.is_terminal() {
            return Err(VrxError::StageViolation(
                "cannot fail: pipeline already terminal",
            ));
        }
        *self = Self::Failed {
            stage,
            reason: reason.into(),
        };
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────
