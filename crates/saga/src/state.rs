//! Saga status state machine.

use serde::{Deserialize, Serialize};

/// The status of a saga instance in its lifecycle.
///
/// State transitions:
/// ```text
/// Running ──┬──► Completed
///           └──► Compensating ──┬──► Compensated
///                               └──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SagaStatus {
    /// Forward steps are being executed.
    #[default]
    Running,

    /// All forward steps succeeded (terminal state).
    Completed,

    /// A forward step failed and compensating actions are in progress.
    Compensating,

    /// Every required compensation succeeded (terminal state).
    Compensated,

    /// At least one compensation failed or was missing (terminal state).
    ///
    /// Services may be left inconsistent; an operator has to intervene.
    Failed,
}

impl SagaStatus {
    /// Returns true if the saga can transition to `Completed`.
    pub fn can_complete(&self) -> bool {
        matches!(self, SagaStatus::Running)
    }

    /// Returns true if the saga can begin compensation.
    pub fn can_compensate(&self) -> bool {
        matches!(self, SagaStatus::Running)
    }

    /// Returns true if compensation can be resolved to a terminal status.
    pub fn can_resolve(&self) -> bool {
        matches!(self, SagaStatus::Compensating)
    }

    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaStatus::Completed | SagaStatus::Compensated | SagaStatus::Failed
        )
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStatus::Running => "running",
            SagaStatus::Completed => "completed",
            SagaStatus::Compensating => "compensating",
            SagaStatus::Compensated => "compensated",
            SagaStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
