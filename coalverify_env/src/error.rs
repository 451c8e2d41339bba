//! Error types for the backend environment layer.

use thiserror::Error;

/// Errors raised while talking to a simulator backend.
#[derive(Debug, Error)]
pub enum EnvError {
    /// The child process could not be started.
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O on a child's pipes or staging file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The child exited unsuccessfully.
    #[error("'{program}' exited with {status}: {stderr}")]
    ExitStatus {
        program: String,
        status: String,
        stderr: String,
    },

    /// The embedded engine hit its memory or time ceiling.
    #[error("resource limit exceeded: {0}")]
    ResourceLimit(String),

    /// The embedded engine rejected its configuration or failed internally.
    #[error("engine error: {0}")]
    Engine(String),

    /// A command line with no program.
    #[error("empty command line")]
    EmptyCommand,

    /// Migration matrix shape error.
    #[error("invalid migration matrix: {0}")]
    InvalidMatrix(String),

    /// Memory ceiling string that is not `<digits>[K|M|G|T]`.
    #[error("invalid memory ceiling '{0}'")]
    InvalidMemoryCeiling(String),
}

impl EnvError {
    /// Creates an exit-status error.
    pub fn exit_status(
        program: impl Into<String>,
        status: impl std::fmt::Display,
        stderr: impl Into<String>,
    ) -> Self {
        Self::ExitStatus {
            program: program.into(),
            status: status.to_string(),
            stderr: stderr.into(),
        }
    }

    /// Creates an engine resource-limit error.
    pub fn resource_limit(msg: impl Into<String>) -> Self {
        Self::ResourceLimit(msg.into())
    }
}
