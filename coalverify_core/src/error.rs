//! Error taxonomy for a comparison run.
//!
//! Every variant aborts the run for its scenario. Replicate and scenario
//! context is layered on with `ReplicateFailed`, `BatchFailed` and
//! `ScenarioFailed`;
//! `innermost()` strips it again.

use coalverify_env::EnvError;
use thiserror::Error;

/// Result alias used across coalverify.
pub type Result<T> = std::result::Result<T, VerifyError>;

#[derive(Debug, Error)]
pub enum VerifyError {
    /// Malformed scenario, rejected before any backend is touched.
    #[error("invalid scenario: {0}")]
    InvalidScenario(String),

    /// An epoch kind the backend cannot express.
    #[error("{backend}: unsupported epoch kind '{kind}'")]
    UnsupportedEpochKind { backend: String, kind: String },

    /// Spawn failure or non-zero exit of a backend process.
    #[error("{backend}: `{command}` failed: {source}")]
    BackendProcessFailed {
        backend: String,
        command: String,
        #[source]
        source: EnvError,
    },

    /// Row count, column count or field type mismatch in backend output.
    #[error("{backend}: malformed output: {reason}")]
    MalformedBackendOutput { backend: String, reason: String },

    /// The embedded engine hit its memory/time ceiling.
    #[error("{backend}: resources exhausted: {source}")]
    ResourceExhausted {
        backend: String,
        #[source]
        source: EnvError,
    },

    /// The embedded engine failed for a reason other than resources.
    #[error("{backend}: engine failed: {source}")]
    EngineFailed {
        backend: String,
        #[source]
        source: EnvError,
    },

    /// A statistic expected by the reducer is absent from one table.
    #[error("statistic '{statistic}' missing from the {side} table")]
    SchemaMismatch { statistic: String, side: String },

    /// A failure attributed to one replicate of one backend.
    #[error("{backend} replicate {replicate} failed: {source}")]
    ReplicateFailed {
        backend: String,
        replicate: usize,
        #[source]
        source: Box<VerifyError>,
    },

    /// A failure of a whole batch from a backend that produces every
    /// replicate in one invocation.
    #[error("{backend} batch of {replicates} replicates failed: {source}")]
    BatchFailed {
        backend: String,
        replicates: usize,
        #[source]
        source: Box<VerifyError>,
    },

    /// A failure attributed to one scenario.
    #[error("scenario [{scenario}] failed: {source}")]
    ScenarioFailed {
        scenario: String,
        #[source]
        source: Box<VerifyError>,
    },
}

impl VerifyError {
    /// Creates an invalid-scenario error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidScenario(msg.into())
    }

    /// Creates a malformed-output error.
    pub fn malformed(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedBackendOutput {
            backend: backend.into(),
            reason: reason.into(),
        }
    }

    /// Wraps a process failure with the command line that caused it.
    pub fn process(
        backend: impl Into<String>,
        command: impl std::fmt::Display,
        source: EnvError,
    ) -> Self {
        Self::BackendProcessFailed {
            backend: backend.into(),
            command: command.to_string(),
            source,
        }
    }

    /// Classifies an embedded-engine failure.
    pub fn engine(backend: impl Into<String>, source: EnvError) -> Self {
        match source {
            EnvError::ResourceLimit(_) => Self::ResourceExhausted {
                backend: backend.into(),
                source,
            },
            other => Self::EngineFailed {
                backend: backend.into(),
                source: other,
            },
        }
    }

    /// Attributes this error to a replicate.
    pub fn in_replicate(self, backend: impl Into<String>, replicate: usize) -> Self {
        Self::ReplicateFailed {
            backend: backend.into(),
            replicate,
            source: Box::new(self),
        }
    }

    /// Attributes this error to a batched run of `replicates`.
    pub fn in_batch(self, backend: impl Into<String>, replicates: usize) -> Self {
        Self::BatchFailed {
            backend: backend.into(),
            replicates,
            source: Box::new(self),
        }
    }

    /// Attributes this error to a scenario.
    pub fn in_scenario(self, scenario: impl std::fmt::Display) -> Self {
        Self::ScenarioFailed {
            scenario: scenario.to_string(),
            source: Box::new(self),
        }
    }

    /// The error underneath any replicate/scenario context.
    pub fn innermost(&self) -> &VerifyError {
        match self {
            Self::ReplicateFailed { source, .. }
            | Self::BatchFailed { source, .. }
            | Self::ScenarioFailed { source, .. } => source.innermost(),
            other => other,
        }
    }

    /// Captured standard error of a failed backend process, if any.
    pub fn stderr(&self) -> Option<&str> {
        match self.innermost() {
            Self::BackendProcessFailed {
                source: EnvError::ExitStatus { stderr, .. },
                ..
            } => Some(stderr.as_str()),
            _ => None,
        }
    }
}
