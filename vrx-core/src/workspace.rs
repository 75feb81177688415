//! Session workspace: the four directory roles the receiver writes
//! into, threaded explicitly through the pipeline instead of living
//! as ambient globals.
//!
//! One workspace set exists per node and is reused across runs, so
//! every stage clears its own output area before writing — frames or
//! videos from a previous session must never leak into the current
//! one. Clearing is idempotent: an already-missing file or directory
//! is not an error.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Directory holding the raw received stream.
pub const RECEIVED_DIR: &str = "received_video_stream";
/// Directory holding extracted low-resolution frames.
pub const LR_FRAMES_DIR: &str = "lr_frames";
/// Directory holding enhanced high-resolution frames.
pub const SR_FRAMES_DIR: &str = "sr_frames";
/// Directory holding the reassembled video.
pub const SR_VIDEO_DIR: &str = "sr_videos";

/// Filename of the received raw stream.
pub const RECEIVED_FILE: &str = "received_video.yuv";
/// Filename of the reassembled super-resolution video.
pub const SR_VIDEO_FILE: &str = "sr_video.yuv";

/// Suffix the enhancement tool appends to each output frame
/// (`frame_0001.png` → `frame_0001_out.png`).
pub const ENHANCED_SUFFIX: &str = "_out";

// ── SessionWorkspace ─────────────────────────────────────────────

/// Value object holding the four workspace roles under one root.
///
/// Exclusively owned by the node's orchestrator for the duration of
/// a session; there is only one session at a time per node, so no
/// locking is needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionWorkspace {
    root: PathBuf,
}

impl SessionWorkspace {
    /// A workspace rooted at `root`. Nothing is created until a
    /// stage clears its output area.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // ── Role paths ───────────────────────────────────────────────

    pub fn received_dir(&self) -> PathBuf {
        self.root.join(RECEIVED_DIR)
    }

    pub fn lr_frames_dir(&self) -> PathBuf {
        self.root.join(LR_FRAMES_DIR)
    }

    pub fn sr_frames_dir(&self) -> PathBuf {
        self.root.join(SR_FRAMES_DIR)
    }

    pub fn sr_video_dir(&self) -> PathBuf {
        self.root.join(SR_VIDEO_DIR)
    }

    /// Full path the receive transport writes the raw stream to.
    pub fn received_file(&self) -> PathBuf {
        self.received_dir().join(RECEIVED_FILE)
    }

    /// Full path of the reassembled super-resolution video.
    pub fn sr_video_file(&self) -> PathBuf {
        self.sr_video_dir().join(SR_VIDEO_FILE)
    }

    // ── Stage cleanup ────────────────────────────────────────────

    /// Prepare the received-media area: ensure the directory exists
    /// and remove a stale stream from a previous run.
    pub fn clear_received(&self) -> io::Result<()> {
        clear_dir(&self.received_dir())
    }

    /// Clear the extracted-frames area.
    pub fn clear_lr_frames(&self) -> io::Result<()> {
        clear_dir(&self.lr_frames_dir())
    }

    /// Clear the enhanced-frames area.
    pub fn clear_sr_frames(&self) -> io::Result<()> {
        clear_dir(&self.sr_frames_dir())
    }

    /// Clear the reassembled-video area.
    pub fn clear_sr_video(&self) -> io::Result<()> {
        clear_dir(&self.sr_video_dir())
    }

    // ── Frame enumeration ────────────────────────────────────────

    /// Extracted frames in lexicographic filename order.
    ///
    /// The extraction tool zero-pads the frame index, so this order
    /// is the frame order.
    pub fn lr_frames(&self) -> io::Result<Vec<PathBuf>> {
        let mut frames: Vec<PathBuf> = fs::read_dir(self.lr_frames_dir())?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "png"))
            .collect();
        frames.sort();
        Ok(frames)
    }
}

/// Ensure `dir` exists and contains no regular files.
///
/// A file vanishing between listing and removal is fine — another
/// indication it is already gone.
fn clear_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    let mut removed = 0usize;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
    }
    if removed > 0 {
        debug!(dir = %dir.display(), removed, "removed stale artifacts");
    }
    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace() -> (tempfile::TempDir, SessionWorkspace) {
        let tmp = tempfile::tempdir().unwrap();
        let ws = SessionWorkspace::at(tmp.path());
        (tmp, ws)
    }

    #[test]
    fn role_paths_are_distinct() {
        let (_tmp, ws) = workspace();
        let dirs = [
            ws.received_dir(),
            ws.lr_frames_dir(),
            ws.sr_frames_dir(),
            ws.sr_video_dir(),
        ];
        for (i, a) in dirs.iter().enumerate() {
            for b in dirs.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn clear_creates_missing_directory() {
        let (_tmp, ws) = workspace();
        assert!(!ws.lr_frames_dir().exists());
        ws.clear_lr_frames().unwrap();
        assert!(ws.lr_frames_dir().exists());
    }

    #[test]
    fn clear_removes_stale_artifacts() {
        let (_tmp, ws) = workspace();
        ws.clear_lr_frames().unwrap();
        fs::write(ws.lr_frames_dir().join("frame_0001.png"), b"old").unwrap();
        fs::write(ws.lr_frames_dir().join("frame_0002.png"), b"old").unwrap();

        ws.clear_lr_frames().unwrap();
        assert!(ws.lr_frames().unwrap().is_empty());
    }

    #[test]
    fn clear_is_idempotent() {
        let (_tmp, ws) = workspace();
        ws.clear_sr_frames().unwrap();
        fs::write(ws.sr_frames_dir().join("frame_0001_out.png"), b"x").unwrap();

        ws.clear_sr_frames().unwrap();
        ws.clear_sr_frames().unwrap(); // second clear must not error
        assert_eq!(fs::read_dir(ws.sr_frames_dir()).unwrap().count(), 0);
    }

    #[test]
    fn frames_are_lexicographic_and_png_only() {
        let (_tmp, ws) = workspace();
        ws.clear_lr_frames().unwrap();
        let dir = ws.lr_frames_dir();
        fs::write(dir.join("frame_0010.png"), b"").unwrap();
        fs::write(dir.join("frame_0002.png"), b"").unwrap();
        fs::write(dir.join("frame_0001.png"), b"").unwrap();
        fs::write(dir.join("notes.txt"), b"").unwrap();

        let frames = ws.lr_frames().unwrap();
        let names: Vec<_> = frames
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["frame_0001.png", "frame_0002.png", "frame_0010.png"]);
    }
}
