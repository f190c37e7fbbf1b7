pub mod diagnostic;

use crate::policy::PolicyViolation;
use thiserror::Error;

/// Fixture file could not be read, parsed or accepted.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ConfigError(pub String);

/// The sandboxed engine failed while applying fixture SQL or running the submission.
///
/// `Display` always contains the engine's own message, so substring expectations
/// (`expectedError`) can be matched against `to_string()`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("failed to open sandbox instance: {0}")]
    Open(String),

    #[error("fixture setup failed: {0}")]
    Setup(String),

    #[error("{0}")]
    Statement(String),

    #[error("follow-up statement failed: {0}")]
    FollowUp(String),

    #[error("query exceeded the {limit_ms} ms execution deadline")]
    DeadlineExceeded { limit_ms: u64 },
}

impl ExecutionError {
    /// The underlying engine message without the stage prefix.
    pub fn engine_message(&self) -> String {
        match self {
            ExecutionError::Open(m)
            | ExecutionError::Setup(m)
            | ExecutionError::Statement(m)
            | ExecutionError::FollowUp(m) => m.clone(),
            ExecutionError::DeadlineExceeded { .. } => self.to_string(),
        }
    }

    pub fn is_deadline(&self) -> bool {
        matches!(self, ExecutionError::DeadlineExceeded { .. })
    }
}

/// Failures surfaced by the request-facing facade before or around judging.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("fixture key and SQL are required")]
    MissingInput,

    #[error("fixture not found: {0}")]
    UnknownFixture(String),

    #[error(transparent)]
    Policy(#[from] PolicyViolation),

    #[error("fixture lookup failed: {0:#}")]
    Source(anyhow::Error),

    #[error("judge worker failed: {0}")]
    Worker(String),
}

impl ServiceError {
    /// Stable code for transport layers.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::MissingInput => "E_INVALID_REQUEST",
            ServiceError::UnknownFixture(_) => "E_FIXTURE_NOT_FOUND",
            ServiceError::Policy(_) => "E_POLICY",
            ServiceError::Source(_) => "E_FIXTURE_READ",
            ServiceError::Worker(_) => "E_INTERNAL",
        }
    }
}
