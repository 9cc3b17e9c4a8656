use std::io;
use std::path::Path;

use thiserror::Error;

/// Failure of one external tool invocation. Always recorded against the
/// item that needed the tool; never fatal to a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("{program} was not found")]
    NotFound { program: String },
    #[error("{program} did not respond within {timeout_ms}ms")]
    Timeout { program: String, timeout_ms: u64 },
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("{program} does not support {operation}")]
    Unsupported { program: String, operation: String },
    #[error("failed to run {program}: {message}")]
    Io { program: String, message: String },
}

impl ToolError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Why a single removal action did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionFailure {
    #[error("permission denied: {path}")]
    PermissionDenied { path: String },
    #[error("target vanished before removal: {path}")]
    Vanished { path: String },
    #[error(transparent)]
    ExternalTool(#[from] ToolError),
    #[error("{path}: {message}")]
    Io { path: String, message: String },
}

impl ActionFailure {
    pub fn from_io(path: &Path, err: &io::Error) -> Self {
        let path = path.display().to_string();
        match err.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            io::ErrorKind::NotFound => Self::Vanished { path },
            _ => Self::Io {
                path,
                message: err.to_string(),
            },
        }
    }
}

/// Errors surfaced by the top-level command dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command '{0}'")]
    InvalidCommand(String),
    #[error("operation '{0}' was not confirmed")]
    ConfirmationDenied(String),
}
