//! Resolution policy: throughput → transmission tier.
//!
//! A pure, total mapping with no failure mode. The thresholds are
//! fixed by the deployment's measured model quality and must not
//! drift: boundary values belong to the *lower* tier (`<=`, not `<`).

use std::fmt;

/// Canonical (unscaled) target width. Reassembly and playback always
/// reconstruct to this, regardless of the transmitted tier.
pub const CANONICAL_WIDTH: u32 = 1920;
/// Canonical (unscaled) target height.
pub const CANONICAL_HEIGHT: u32 = 1080;

/// Fixed frame rate used by every transport and pipeline stage.
pub const FRAME_RATE: u32 = 25;

// ── ResolutionDecision ───────────────────────────────────────────

/// The per-session transmission decision, created once by
/// [`decide`] on the sender and reconstructed value-equal on the
/// receiver from the metadata handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionDecision {
    /// Transmission width in pixels.
    pub width: u32,
    /// Transmission height in pixels.
    pub height: u32,
    /// Downsampling factor applied before transport (1, 2 or 4).
    pub scale: u32,
    /// Whether the stream is downscaled (`scale != 1`).
    pub scaled: bool,
    /// Human-readable tier tag ("270p", "540p", "1080p").
    pub label: &'static str,
}

impl ResolutionDecision {
    fn new(width: u32, height: u32, scale: u32, label: &'static str) -> Self {
        Self {
            width,
            height,
            scale,
            scaled: scale != 1,
            label,
        }
    }
}

impl fmt::Display for ResolutionDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} ({}, scale {})",
            self.width, self.height, self.label, self.scale
        )
    }
}

// ── Policy ───────────────────────────────────────────────────────

/// Map a throughput sample (Mbit/s) to a resolution tier.
///
/// - `mbps <= 160`        → 480×270, scale 4
/// - `160 < mbps <= 630`  → 960×540, scale 2
/// - `mbps > 630`         → 1920×1080, unscaled
pub fn decide(mbps: f64) -> ResolutionDecision {
    if mbps <= 160.0 {
        ResolutionDecision::new(480, 270, 4, "270p")
    } else if mbps <= 630.0 {
        ResolutionDecision::new(960, 540, 2, "540p")
    } else {
        ResolutionDecision::new(CANONICAL_WIDTH, CANONICAL_HEIGHT, 1, "1080p")
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_bandwidth_gets_270p() {
        let d = decide(100.0);
        assert_eq!((d.width, d.height, d.scale), (480, 270, 4));
        assert!(d.scaled);
        assert_eq!(d.label, "270p");
    }

    #[test]
    fn moderate_bandwidth_gets_540p() {
        let d = decide(500.0);
        assert_eq!((d.width, d.height, d.scale), (960, 540, 2));
        assert!(d.scaled);
        assert_eq!(d.label, "540p");
    }

    #[test]
    fn high_bandwidth_gets_1080p() {
        let d = decide(900.0);
        assert_eq!((d.width, d.height, d.scale), (1920, 1080, 1));
        assert!(!d.scaled);
        assert_eq!(d.label, "1080p");
    }

    #[test]
    fn boundaries_belong_to_lower_tier() {
        assert_eq!(decide(160.0).label, "270p");
        assert_eq!(decide(160.01).label, "540p");
        assert_eq!(decide(630.0).label, "540p");
        assert_eq!(decide(630.01).label, "1080p");
    }

    #[test]
    fn scaled_iff_scale_not_one() {
        for mbps in [0.0, 160.0, 400.0, 630.0, 631.0, 10_000.0] {
            let d = decide(mbps);
            assert_eq!(d.scaled, d.scale != 1, "mbps = {mbps}");
        }
    }

    #[test]
    fn every_sample_maps_to_exactly_one_tier() {
        for mbps in [-5.0, 0.0, 159.99, 160.0, 161.0, 629.9, 630.0, 631.0] {
            let d = decide(mbps);
            assert!(matches!(d.label, "270p" | "540p" | "1080p"));
        }
    }
}
