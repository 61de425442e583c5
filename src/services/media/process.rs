use super::MediaError;
use async_trait::async_trait;
use std::ffi::OsString;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Captured result of an external tool invocation
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Tool stderr, lossily decoded and trimmed
    pub fn diagnostics(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Runs an external tool to completion.
///
/// A non-zero exit is not an error at this level: callers inspect
/// [`ProcessOutput::exit_code`] and decide. Errors are reserved for a tool
/// that could not be started or was cancelled.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(
        &self,
        tool: &str,
        args: &[OsString],
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput, MediaError>;
}

/// Runner backed by `tokio::process`. The child is killed if the run is
/// cancelled or the calling future is dropped.
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(
        &self,
        tool: &str,
        args: &[OsString],
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput, MediaError> {
        tracing::debug!("Running {} {:?}", tool, args);

        let child = Command::new(tool)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| MediaError::Spawn {
                tool: tool.to_string(),
                source,
            })?;

        tokio::select! {
            output = child.wait_with_output() => {
                let output = output.map_err(|source| MediaError::Spawn {
                    tool: tool.to_string(),
                    source,
                })?;
                Ok(ProcessOutput {
                    stdout: output.stdout,
                    stderr: output.stderr,
                    exit_code: output.status.code(),
                })
            }
            _ = cancel.cancelled() => {
                tracing::warn!("{} cancelled, killing child process", tool);
                Err(MediaError::Cancelled { tool: tool.to_string() })
            }
        }
    }
}
