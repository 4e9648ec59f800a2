//! Saga error types.

use common::InstanceId;
use thiserror::Error;

use crate::state::SagaStatus;

/// Error reported by a step's forward or compensating action.
///
/// Steps own their failure semantics (retries, timeouts); by the time a
/// `StepError` reaches the orchestrator the attempt is final.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct StepError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl StepError {
    /// Creates an error carrying only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an error that wraps an underlying cause.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&str> for StepError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for StepError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// Convenience alias for step action results.
pub type StepResult<T> = std::result::Result<T, StepError>;

/// A compensation that could not be carried out.
#[derive(Debug, Error)]
pub enum CompensationError {
    /// The compensating action ran and reported an error.
    #[error("compensation for step '{step}' failed: {source}")]
    Failed {
        /// Step whose compensation failed.
        step: String,
        /// The error returned by the compensating action.
        #[source]
        source: StepError,
    },

    /// The step has no compensating action but compensation was required.
    #[error("step '{step}' has no compensating action")]
    NotCompensable {
        /// Step that could not be undone.
        step: String,
    },
}

impl CompensationError {
    /// Returns the name of the step this error refers to.
    pub fn step(&self) -> &str {
        match self {
            CompensationError::Failed { step, .. } | CompensationError::NotCompensable { step } => {
                step
            }
        }
    }

    /// Returns true if the error comes from a saga definition that lacks a
    /// compensating action rather than from a failed compensation attempt.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, CompensationError::NotCompensable { .. })
    }
}

/// Terminal result of a saga whose forward phase did not complete.
#[derive(Debug, Error)]
pub enum SagaFailure {
    /// A step failed and every completed step was undone.
    #[error("step '{failed_step}' failed; saga {instance_id} was compensated")]
    Compensated {
        /// The saga execution this result belongs to.
        instance_id: InstanceId,
        /// Step whose forward action failed.
        failed_step: String,
        /// The error that triggered compensation.
        #[source]
        error: StepError,
        /// Steps that were compensated, in the order they were undone.
        compensated_steps: Vec<String>,
    },

    /// A step failed and at least one compensation failed or was missing.
    #[error(
        "step '{failed_step}' failed and {} compensation(s) of saga {instance_id} also failed",
        compensation_errors.len()
    )]
    Failed {
        /// The saga execution this result belongs to.
        instance_id: InstanceId,
        /// Step whose forward action failed.
        failed_step: String,
        /// The error that triggered compensation.
        #[source]
        step_error: StepError,
        /// Every compensation that could not be carried out.
        compensation_errors: Vec<CompensationError>,
    },
}

impl SagaFailure {
    /// Returns the terminal status this failure corresponds to.
    pub fn status(&self) -> SagaStatus {
        match self {
            SagaFailure::Compensated { .. } => SagaStatus::Compensated,
            SagaFailure::Failed { .. } => SagaStatus::Failed,
        }
    }

    /// Returns the ID of the failed saga execution.
    pub fn instance_id(&self) -> InstanceId {
        match self {
            SagaFailure::Compensated { instance_id, .. }
            | SagaFailure::Failed { instance_id, .. } => *instance_id,
        }
    }

    /// Returns the name of the step whose forward action failed.
    pub fn failed_step(&self) -> &str {
        match self {
            SagaFailure::Compensated { failed_step, .. }
            | SagaFailure::Failed { failed_step, .. } => failed_step,
        }
    }

    /// Returns the error that triggered compensation.
    pub fn step_error(&self) -> &StepError {
        match self {
            SagaFailure::Compensated { error, .. } => error,
            SagaFailure::Failed { step_error, .. } => step_error,
        }
    }

    /// Returns the compensation errors; empty when the saga was compensated.
    pub fn compensation_errors(&self) -> &[CompensationError] {
        match self {
            SagaFailure::Compensated { .. } => &[],
            SagaFailure::Failed {
                compensation_errors,
                ..
            } => compensation_errors,
        }
    }
}

/// Errors detected while validating a saga definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    /// The saga ID is empty.
    #[error("saga id must not be empty")]
    EmptySagaId,

    /// The definition contains no steps.
    #[error("saga '{saga_id}' has no steps")]
    NoSteps { saga_id: String },

    /// A step has an empty name.
    #[error("saga '{saga_id}' has a step with an empty name at position {index}")]
    EmptyStepName { saga_id: String, index: usize },

    /// Two steps share the same name.
    #[error("saga '{saga_id}' defines step '{step}' more than once")]
    DuplicateStep { saga_id: String, step: String },
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[derive(Debug, Error)]
    #[error("connection reset")]
    struct IoLike;

    #[test]
    fn test_step_error_from_str() {
        let err: StepError = "payment declined".into();
        assert_eq!(err.message(), "payment declined");
        assert_eq!(err.to_string(), "payment declined");
        assert!(err.source().is_none());
    }

    #[test]
    fn test_step_error_keeps_source() {
        let err = StepError::with_source("charge failed", IoLike);
        assert_eq!(err.to_string(), "charge failed");
        assert_eq!(err.source().unwrap().to_string(), "connection reset");
    }

    #[test]
    fn test_compensation_error_accessors() {
        let failed = CompensationError::Failed {
            step: "a".to_string(),
            source: StepError::new("nope"),
        };
        let missing = CompensationError::NotCompensable {
            step: "b".to_string(),
        };

        assert_eq!(failed.step(), "a");
        assert!(!failed.is_configuration_error());
        assert_eq!(failed.to_string(), "compensation for step 'a' failed: nope");

        assert_eq!(missing.step(), "b");
        assert!(missing.is_configuration_error());
        assert_eq!(missing.to_string(), "step 'b' has no compensating action");
    }

    #[test]
    fn test_saga_failure_status_and_accessors() {
        let instance_id = InstanceId::new();
        let compensated = SagaFailure::Compensated {
            instance_id,
            failed_step: "b".to_string(),
            error: StepError::new("boom"),
            compensated_steps: vec!["a".to_string()],
        };
        assert_eq!(compensated.status(), SagaStatus::Compensated);
        assert_eq!(compensated.instance_id(), instance_id);
        assert_eq!(compensated.failed_step(), "b");
        assert_eq!(compensated.step_error().message(), "boom");
        assert!(compensated.compensation_errors().is_empty());

        let failed = SagaFailure::Failed {
            instance_id,
            failed_step: "b".to_string(),
            step_error: StepError::new("boom"),
            compensation_errors: vec![CompensationError::NotCompensable {
                step: "a".to_string(),
            }],
        };
        assert_eq!(failed.status(), SagaStatus::Failed);
        assert_eq!(failed.compensation_errors().len(), 1);
        assert!(failed.to_string().contains("1 compensation(s)"));
    }

    #[test]
    fn test_definition_error_messages() {
        let err = DefinitionError::DuplicateStep {
            saga_id: "create-order".to_string(),
            step: "charge".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "saga 'create-order' defines step 'charge' more than once"
        );
    }
}
