//! External tool invocation seam.
//!
//! Every stage of the relay decides success or failure by running an
//! external process (`iperf3`, `gst-launch-1.0`, `ffmpeg`, the
//! inference script) and inspecting its exit status. All of that goes
//! through [`ToolRunner`] so the orchestration logic can be tested
//! with fake runners, independent of any real media tooling.

use std::fmt;
use std::process::Stdio;

use async_trait::async_trait;
use tracing::debug;

use crate::error::ToolError;

// ── ToolCommand ──────────────────────────────────────────────────

/// A fully-specified external command: program plus argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for a in &self.args {
            write!(f, " {a}")?;
        }
        Ok(())
    }
}

// ── ToolOutput ───────────────────────────────────────────────────

/// Captured output of a tool that ran to successful completion.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

// ── Traits ───────────────────────────────────────────────────────

/// Runs external tools either to completion or as a long-running
/// child the caller stops later.
///
/// `run` returns `Err(ToolError::Failed)` when the process exits
/// non-zero, so callers can treat success/failure uniformly without
/// re-inspecting exit statuses.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run the command to completion, capturing stdout/stderr.
    async fn run(&self, cmd: ToolCommand) -> Result<ToolOutput, ToolError>;

    /// Spawn the command without waiting, returning a stoppable handle.
    async fn spawn(&self, cmd: ToolCommand) -> Result<Box<dyn RunningTool>, ToolError>;
}

/// Handle to a spawned long-running tool.
#[async_trait]
pub trait RunningTool: Send {
    /// Terminate the process if it is still alive, then reap it.
    ///
    /// Safe to call more than once; a no-op when the process has
    /// already exited or was already stopped.
    async fn stop(&mut self);
}

// ── ProcessRunner ────────────────────────────────────────────────

/// The production [`ToolRunner`], backed by `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, cmd: ToolCommand) -> Result<ToolOutput, ToolError> {
        debug!(command = %cmd, "running tool");
        let output = tokio::process::Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| ToolError::Launch {
                tool: cmd.program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(ToolError::Failed {
                tool: cmd.program,
                status: output.status,
                stderr,
            });
        }

        Ok(ToolOutput { stdout, stderr })
    }

    async fn spawn(&self, cmd: ToolCommand) -> Result<Box<dyn RunningTool>, ToolError> {
        debug!(command = %cmd, "spawning tool");
        let child = tokio::process::Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| ToolError::Launch {
                tool: cmd.program.clone(),
                source,
            })?;

        Ok(Box::new(ProcessHandle {
            tool: cmd.program,
            child: Some(child),
        }))
    }
}

/// Owned child-process handle with idempotent termination.
struct ProcessHandle {
    tool: String,
    child: Option<tokio::process::Child>,
}

#[async_trait]
impl RunningTool for ProcessHandle {
    async fn stop(&mut self) {
        // take() makes the second call a no-op.
        let Some(mut child) = self.child.take() else {
            return;
        };

        match child.try_wait() {
            Ok(Some(status)) => {
                debug!(tool = %self.tool, %status, "process already exited");
                return;
            }
            Ok(None) => {}
            Err(e) => {
                debug!(tool = %self.tool, error = %e, "try_wait failed");
            }
        }

        // Kill errors mean the process is already gone — not an error.
        let _ = child.start_kill();
        let _ = child.wait().await;
        debug!(tool = %self.tool, "process stopped");
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_builder() {
        let cmd = ToolCommand::new("ffmpeg").arg("-r").args(["25", "-i", "in.yuv"]);
        assert_eq!(cmd.program, "ffmpeg");
        assert_eq!(cmd.args, vec!["-r", "25", "-i", "in.yuv"]);
        assert_eq!(cmd.to_string(), "ffmpeg -r 25 -i in.yuv");
    }

    #[tokio::test]
    async fn run_missing_binary_is_launch_error() {
        let runner = ProcessRunner;
        let err = runner
            .run(ToolCommand::new("vrx-no-such-binary-404"))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Launch { .. }));
    }

    #[tokio::test]
    async fn run_nonzero_exit_is_failed_error() {
        let runner = ProcessRunner;
        let err = runner
            .run(ToolCommand::new("sh").args(["-c", "echo boom >&2; exit 3"]))
            .await
            .unwrap_err();
        match err {
            ToolError::Failed { tool, stderr, .. } => {
                assert_eq!(tool, "sh");
                assert!(stderr.contains("boom"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn run_captures_stdout() {
        let runner = ProcessRunner;
        let out = runner
            .run(ToolCommand::new("sh").args(["-c", "echo hello"]))
            .await
            .unwrap();
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let runner = ProcessRunner;
        let mut handle = runner
            .spawn(ToolCommand::new("sleep").arg("30"))
            .await
            .unwrap();
        handle.stop().await;
        handle.stop().await; // second call must be a no-op
    }

    #[tokio::test]
    async fn stop_after_natural_exit_is_noop() {
        let runner = ProcessRunner;
        let mut handle = runner.spawn(ToolCommand::new("true")).await.unwrap();
        // Give the process time to exit on its own.
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        handle.stop().await;
    }
}
