use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure of a single external tool invocation.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("timeout after {timeout:?} running: {command}")]
    Timeout { command: String, timeout: Duration },

    #[error("exit code {code:?}: stderr: {stderr}, stdout: {stdout}")]
    NonZeroExit {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("'{program}' is not installed or not on PATH")]
    Unavailable { program: String },

    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// HTML sanitizer errors.
#[derive(Error, Debug)]
pub enum SanitizeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("document is empty")]
    Empty,
}

/// Legacy office document normalizer errors.
#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("normalizer failed: {0}")]
    Tool(#[from] ToolError),

    #[error("normalizer produced no output at {}", .0.display())]
    NoOutput(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Unsupported mode: {0}")]
    UnsupportedMode(String),

    #[error("Tool failed: {0}")]
    ToolFailed(ToolError),

    #[error("Tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("Output missing: {0}")]
    OutputMissing(String),

    #[error("Legacy document normalization failed: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("HTML sanitizing failed: {0}")]
    Sanitize(#[from] SanitizeError),
}

impl From<ToolError> for ConvertError {
    /// A missing tool is a configuration problem, not a conversion failure.
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::Unavailable { program } => ConvertError::ToolUnavailable(program),
            other => ConvertError::ToolFailed(other),
        }
    }
}

impl ConvertError {
    /// True when the failure was a tool exceeding its time budget.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ConvertError::ToolFailed(ToolError::Timeout { .. })
                | ConvertError::Normalize(NormalizeError::Tool(ToolError::Timeout { .. }))
        )
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;
