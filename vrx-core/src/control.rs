//! One-shot TCP control channel.
//!
//! The relay needs exactly two coordination messages per session:
//! resolution metadata before streaming and a completion signal after
//! it. Sessions are short-lived and single-shot, so each message gets
//! its own connection — the sender connects, writes the sole payload,
//! and closes; the receiver accepts one connection and reads to EOF.
//! Ordering comes from the orchestrators' sequencing, not framing.
//!
//! ## Wire format
//!
//! Metadata (ASCII, order-independent `key=value` list):
//! ```text
//! width=960;height=540;scaled=true;scale=2
//! ```
//! Completion: the literal token `done`.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::error::VrxError;
use crate::policy::ResolutionDecision;

/// Default TCP port for the resolution-metadata handshake.
pub const DEFAULT_METADATA_PORT: u16 = 6000;
/// Default TCP port for the completion signal.
pub const DEFAULT_DONE_PORT: u16 = 6001;

/// Completion-signal payload.
pub const DONE_TOKEN: &str = "done";

/// Upper bound on a control payload read.
const MAX_PAYLOAD: u64 = 1024;

// ── Encoding ─────────────────────────────────────────────────────

/// Encode a decision as the flat `key=value` metadata payload.
pub fn encode_metadata(decision: &ResolutionDecision) -> String {
    format!(
        "width={};height={};scaled={};scale={}",
        decision.width, decision.height, decision.scaled, decision.scale
    )
}

/// Parse a metadata payload back into a [`ResolutionDecision`].
///
/// Scans `key=value` tokens in any order, ignoring unknown keys.
/// `width` and `height` are required; `scaled` defaults to `false`
/// and `scale` to 1 when absent. There is no safe default resolution,
/// so a missing dimension is [`VrxError::MetadataMalformed`].
pub fn parse_metadata(payload: &str) -> Result<ResolutionDecision, VrxError> {
    let mut width: Option<u32> = None;
    let mut height: Option<u32> = None;
    let mut scaled = false;
    let mut scale: u32 = 1;

    for token in payload.split(';') {
        let Some((key, value)) = token.trim().split_once('=') else {
            continue;
        };
        match key {
            "width" => width = value.parse().ok(),
            "height" => height = value.parse().ok(),
            "scaled" => scaled = value.eq_ignore_ascii_case("true"),
            "scale" => scale = value.parse().unwrap_or(1),
            _ => {} // unknown keys are ignored
        }
    }

    let width = width.ok_or(VrxError::MetadataMalformed("missing or invalid width"))?;
    let height = height.ok_or(VrxError::MetadataMalformed("missing or invalid height"))?;

    Ok(ResolutionDecision {
        width,
        height,
        scale,
        scaled,
        label: label_for_height(height),
    })
}

/// Tier tag for a transmitted height. Heights outside the fixed tier
/// set get a neutral tag; they can only come from a foreign sender.
fn label_for_height(height: u32) -> &'static str {
    match height {
        270 => "270p",
        540 => "540p",
        1080 => "1080p",
        _ => "custom",
    }
}

// ── Sender side ──────────────────────────────────────────────────

/// Send the resolution metadata as the sole payload of a fresh
/// connection to `addr` (e.g. `"192.168.1.20:6000"`).
///
/// Any connect or write failure is fatal to the session: the receiver
/// cannot construct its pipeline without the resolution.
pub async fn send_metadata(addr: &str, decision: &ResolutionDecision) -> Result<(), VrxError> {
    let payload = encode_metadata(decision);
    let mut stream = TcpStream::connect(addr)
        .await
        .map_err(VrxError::HandshakeSendFailed)?;
    stream
        .write_all(payload.as_bytes())
        .await
        .map_err(VrxError::HandshakeSendFailed)?;
    stream
        .shutdown()
        .await
        .map_err(VrxError::HandshakeSendFailed)?;
    info!(%payload, "sent resolution metadata to {addr}");
    Ok(())
}

/// Send the completion token over a fresh connection to `addr`.
///
/// Callers treat a failure here as best-effort (the stream already
/// finished); it is returned so they can log it.
pub async fn send_done(addr: &str) -> Result<(), VrxError> {
    let mut stream = TcpStream::connect(addr)
        .await
        .map_err(VrxError::HandshakeSendFailed)?;
    stream
        .write_all(DONE_TOKEN.as_bytes())
        .await
        .map_err(VrxError::HandshakeSendFailed)?;
    stream
        .shutdown()
        .await
        .map_err(VrxError::HandshakeSendFailed)?;
    info!("sent '{DONE_TOKEN}' to {addr}");
    Ok(())
}

// ── Receiver side ────────────────────────────────────────────────

/// Accept exactly one connection on `listener` and parse its payload
/// as resolution metadata. Bounded by `timeout`.
pub async fn recv_metadata(
    listener: &TcpListener,
    timeout: Duration,
) -> Result<ResolutionDecision, VrxError> {
    let accept = async {
        let (mut stream, peer) = listener
            .accept()
            .await
            .map_err(VrxError::MetadataReceiveFailed)?;
        let payload = read_payload(&mut stream)
            .await
            .map_err(VrxError::MetadataReceiveFailed)?;
        info!(%payload, "received metadata from {peer}");
        parse_metadata(&payload)
    };

    tokio::time::timeout(timeout, accept)
        .await
        .map_err(|_| VrxError::HandshakeTimeout(timeout))?
}

/// Wait for the completion token on `listener`, bounded by `timeout`.
///
/// A connection carrying anything other than [`DONE_TOKEN`] is logged
/// and ignored — the wait continues for the remaining window, so an
/// unexpected payload never advances the session.
pub async fn recv_done(listener: &TcpListener, timeout: Duration) -> Result<(), VrxError> {
    let deadline = Instant::now() + timeout;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(VrxError::HandshakeTimeout(timeout));
        }

        let accept = async {
            let (mut stream, peer) = listener.accept().await?;
            let payload = read_payload(&mut stream).await?;
            Ok::<_, std::io::Error>((payload, peer))
        };

        match tokio::time::timeout(remaining, accept).await {
            Err(_) => return Err(VrxError::HandshakeTimeout(timeout)),
            Ok(Err(e)) => return Err(VrxError::Io(e)),
            Ok(Ok((payload, peer))) => {
                if payload.trim() == DONE_TOKEN {
                    info!("received '{DONE_TOKEN}' from {peer}");
                    return Ok(());
                }
                warn!(%payload, "unexpected message from {peer}, still waiting");
            }
        }
    }
}

/// Read one bounded control payload (to EOF or the size cap).
async fn read_payload(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut buf = Vec::new();
    stream.take(MAX_PAYLOAD).read_to_end(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

// ── Tests ────────────────────────────────────────────────────────
