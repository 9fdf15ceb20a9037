//! Error types for Gantry.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Configuration errors: fatal before anything runs
    #[error("Malformed pipeline config: {0}")]
    MalformedConfig(String),

    #[error("Duplicate job name: {0}")]
    DuplicateJobName(String),

    #[error("Matrix axis '{axis}' in job '{job}' has no values")]
    EmptyAxis { job: String, axis: String },

    #[error("Step '{step}' in job '{job}' references undeclared matrix axis '{axis}'")]
    UnknownAxis {
        job: String,
        step: String,
        axis: String,
    },

    // Action errors
    #[error("Action not found: {0}")]
    ActionNotFound(String),

    #[error("Invalid action reference: {0}")]
    InvalidActionRef(String),

    #[error("Required input '{input}' missing for action {action}")]
    MissingActionInput { action: String, input: String },

    // Execution errors: captured into reports, never crash the runner
    #[error("Step failed with exit code {exit_code}: {message}")]
    StepFailed { exit_code: i32, message: String },

    #[error("Step timeout after {minutes} minutes")]
    StepTimeout { minutes: u32 },

    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("Run cancelled: {reason}")]
    Cancelled { reason: String },

    // Infrastructure errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::MalformedConfig(err.to_string())
    }
}

impl Error {
    /// Whether this error belongs to the configuration family, which
    /// aborts a run before any job executes.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Error::MalformedConfig(_)
                | Error::DuplicateJobName(_)
                | Error::EmptyAxis { .. }
                | Error::UnknownAxis { .. }
        )
    }
}
