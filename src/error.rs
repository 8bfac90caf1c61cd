use thiserror::Error;

use crate::backend::ApiError;
use crate::state_machine::JobId;

#[derive(Debug, Error)]
pub enum TryOnError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("No job is being tracked. Submit a job first.")]
    NoActiveJob,

    #[error("Job {job_id} failed: {error}")]
    JobFailed { job_id: JobId, error: String },

    #[error("Order for job {job_id} has an unknown outcome; confirm it before retrying")]
    OrderOutcomeUnknown { job_id: JobId },

    #[error("Order creation failed: {0}")]
    OrderCreation(#[source] ApiError),

    #[error("Gate violation: {0}")]
    GateViolation(#[from] GateViolation),

    #[error("Invalid contact info: missing {0}")]
    InvalidContact(&'static str),

    #[error("Backend error: {0}")]
    Api(#[from] ApiError),

    #[error("Session store error: {0}")]
    Session(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T, E = TryOnError> = std::result::Result<T, E>;

/// Order creation attempted before its preconditions hold. Unreachable when
/// the coordinator is driven through its public operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GateViolation {
    #[error("contact information has not been submitted")]
    GateClosed,

    #[error("no result has been committed and displayed")]
    ResultNotDisplayed,

    #[error("cannot buffer a result while the gate is open")]
    BufferWhileOpen,
}
