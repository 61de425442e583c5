//! External media tooling: process invocation, fast-start remuxing and
//! aspect classification.

pub mod aspect;
pub mod process;
pub mod remux;

#[cfg(test)]
pub(crate) mod testing;

pub use aspect::{AspectClassifier, AspectLabel};
pub use process::{ProcessOutput, ProcessRunner, TokioProcessRunner};
pub use remux::FastStartRemuxer;

use thiserror::Error;

/// Failure while running or interpreting an external media tool
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} was cancelled")]
    Cancelled { tool: String },

    /// The tool ran but reported failure. `diagnostics` is its captured stderr.
    #[error("{tool} exited with {status}: {diagnostics}")]
    ToolFailed {
        tool: String,
        status: String,
        diagnostics: String,
    },

    #[error("failed to parse {tool} output: {source}")]
    InvalidOutput {
        tool: String,
        #[source]
        source: serde_json::Error,
    },
}

impl MediaError {
    pub(crate) fn tool_failed(tool: &str, output: &ProcessOutput) -> Self {
        let status = match output.exit_code {
            Some(code) => format!("exit code {}", code),
            None => "termination by signal".to_string(),
        };
        MediaError::ToolFailed {
            tool: tool.to_string(),
            status,
            diagnostics: output.diagnostics(),
        }
    }
}
