//! Saga lifecycle events.

use chrono::{DateTime, Utc};
use common::InstanceId;
use serde::{Deserialize, Serialize};

/// The kind of lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SagaEventType {
    /// A step's forward action is about to run.
    #[serde(rename = "step.started")]
    StepStarted,

    /// A step's forward action succeeded.
    #[serde(rename = "step.succeeded")]
    StepSucceeded,

    /// A step's forward action failed.
    #[serde(rename = "step.failed")]
    StepFailed,

    /// Compensation of completed steps is starting.
    #[serde(rename = "compensation.started")]
    CompensationStarted,

    /// One compensation attempt finished, successfully or not.
    #[serde(rename = "compensation.step.done")]
    CompensationStepDone,

    /// Every forward step succeeded.
    #[serde(rename = "saga.completed")]
    SagaCompleted,

    /// Every required compensation succeeded.
    #[serde(rename = "saga.compensated")]
    SagaCompensated,

    /// At least one compensation failed or was missing.
    #[serde(rename = "saga.failed")]
    SagaFailed,
}

impl SagaEventType {
    /// All event types, in lifecycle order.
    pub const ALL: [SagaEventType; 8] = [
        SagaEventType::StepStarted,
        SagaEventType::StepSucceeded,
        SagaEventType::StepFailed,
        SagaEventType::CompensationStarted,
        SagaEventType::CompensationStepDone,
        SagaEventType::SagaCompleted,
        SagaEventType::SagaCompensated,
        SagaEventType::SagaFailed,
    ];

    /// Returns the dotted event name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaEventType::StepStarted => "step.started",
            SagaEventType::StepSucceeded => "step.succeeded",
            SagaEventType::StepFailed => "step.failed",
            SagaEventType::CompensationStarted => "compensation.started",
            SagaEventType::CompensationStepDone => "compensation.step.done",
            SagaEventType::SagaCompleted => "saga.completed",
            SagaEventType::SagaCompensated => "saga.compensated",
            SagaEventType::SagaFailed => "saga.failed",
        }
    }

    /// Returns true for the three events that end a saga.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaEventType::SagaCompleted | SagaEventType::SagaCompensated | SagaEventType::SagaFailed
        )
    }
}

impl std::fmt::Display for SagaEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An immutable record of something that happened during a saga execution.
///
/// Events are published once on the [`EventBus`](crate::EventBus) and
/// handlers only ever see shared references to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaEvent {
    /// What happened.
    #[serde(rename = "type")]
    pub event_type: SagaEventType,
    /// The saga type ID from the definition.
    pub saga_id: String,
    /// The execution this event belongs to.
    pub instance_id: InstanceId,
    /// The step concerned, for step-level events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_name: Option<String>,
    /// The payload after the event, when snapshots are enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_snapshot: Option<serde_json::Value>,
    /// Error message for failed steps and failed compensations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Every compensation error; only populated on `saga.failed`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compensation_errors: Vec<String>,
    /// When the event was emitted.
    pub timestamp: DateTime<Utc>,
}

impl SagaEvent {
    fn new(event_type: SagaEventType, saga_id: &str, instance_id: InstanceId) -> Self {
        Self {
            event_type,
            saga_id: saga_id.to_string(),
            instance_id,
            step_name: None,
            payload_snapshot: None,
            error: None,
            compensation_errors: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    fn for_step(mut self, step_name: impl Into<String>) -> Self {
        self.step_name = Some(step_name.into());
        self
    }

    fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub(crate) fn with_snapshot(mut self, snapshot: Option<serde_json::Value>) -> Self {
        self.payload_snapshot = snapshot;
        self
    }

    /// Creates a `step.started` event.
    pub fn step_started(saga_id: &str, instance_id: InstanceId, step: &str) -> Self {
        Self::new(SagaEventType::StepStarted, saga_id, instance_id).for_step(step)
    }

    /// Creates a `step.succeeded` event.
    pub fn step_succeeded(saga_id: &str, instance_id: InstanceId, step: &str) -> Self {
        Self::new(SagaEventType::StepSucceeded, saga_id, instance_id).for_step(step)
    }

    /// Creates a `step.failed` event.
    pub fn step_failed(
        saga_id: &str,
        instance_id: InstanceId,
        step: &str,
        error: impl Into<String>,
    ) -> Self {
        Self::new(SagaEventType::StepFailed, saga_id, instance_id)
            .for_step(step)
            .with_error(error)
    }

    /// Creates a `compensation.started` event naming the step that failed.
    pub fn compensation_started(saga_id: &str, instance_id: InstanceId, failed_step: &str) -> Self {
        Self::new(SagaEventType::CompensationStarted, saga_id, instance_id).for_step(failed_step)
    }

    /// Creates a `compensation.step.done` event.
    ///
    /// `error` is `None` when the compensation succeeded.
    pub fn compensation_step_done(
        saga_id: &str,
        instance_id: InstanceId,
        step: &str,
        error: Option<String>,
    ) -> Self {
        let mut event =
            Self::new(SagaEventType::CompensationStepDone, saga_id, instance_id).for_step(step);
        event.error = error;
        event
    }

    /// Creates a `saga.completed` event.
    pub fn saga_completed(saga_id: &str, instance_id: InstanceId) -> Self {
        Self::new(SagaEventType::SagaCompleted, saga_id, instance_id)
    }

    /// Creates a `saga.compensated` event carrying the triggering error.
    pub fn saga_compensated(
        saga_id: &str,
        instance_id: InstanceId,
        failed_step: &str,
        error: impl Into<String>,
    ) -> Self {
        Self::new(SagaEventType::SagaCompensated, saga_id, instance_id)
            .for_step(failed_step)
            .with_error(error)
    }

    /// Creates a `saga.failed` event carrying every compensation error.
    pub fn saga_failed(
        saga_id: &str,
        instance_id: InstanceId,
        failed_step: &str,
        error: impl Into<String>,
        compensation_errors: Vec<String>,
    ) -> Self {
        let mut event = Self::new(SagaEventType::SagaFailed, saga_id, instance_id)
            .for_step(failed_step)
            .with_error(error);
        event.compensation_errors = compensation_errors;
        event
    }

    /// Returns true if a compensation attempt reported an error.
    pub fn is_failed_compensation(&self) -> bool {
        self.event_type == SagaEventType::CompensationStepDone && self.error.is_some()
    }
}
