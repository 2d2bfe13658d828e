//! Error types for the onboarding service.

use uuid::Uuid;

use crate::onboarding::step::Step;
use crate::retry::FailureReport;
use crate::validation::FieldErrors;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Validation failed: {0}")]
    Validation(#[from] FieldErrors),

    #[error("Request failed: {0}")]
    Request(#[from] FailureReport),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Session lookup and wizard-flow errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session {id} not found")]
    NotFound { id: Uuid },

    #[error("Session {id} expired after inactivity")]
    Expired { id: Uuid },

    #[error("Step {requested} is not accessible yet; continue at {redirect}")]
    StepLocked { requested: Step, redirect: Step },

    #[error("Skipping step {step} requires explicit confirmation")]
    SkipNotConfirmed { step: Step },

    #[error("{step} needs {missing} first")]
    MissingPrerequisite { step: Step, missing: String },

    #[error("Result of request {token} was superseded by request {latest}")]
    StaleResult { token: u64, latest: u64 },

    #[error("Onboarding has not reached confirmation yet")]
    NotCompleted,
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_locked_names_redirect() {
        let err = SessionError::StepLocked {
            requested: Step::Payment,
            redirect: Step::Assessment,
        };
        assert_eq!(
            err.to_string(),
            "Step payment is not accessible yet; continue at assessment"
        );
    }

    #[test]
    fn field_errors_convert_into_top_level() {
        let err: Error = FieldErrors::single("email", "Email is required").into();
        assert!(matches!(err, Error::Validation(ref f) if f.has("email")));
        assert_eq!(err.to_string(), "Validation failed: 1 field(s) failed validation");
    }
}
