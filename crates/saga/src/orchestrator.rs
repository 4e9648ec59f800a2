//! Saga orchestrator: drives instances forward and unwinds them on failure.

use std::time::Instant;

use common::InstanceId;
use serde::Serialize;

use crate::bus::EventBus;
use crate::config::OrchestratorConfig;
use crate::definition::SagaDefinition;
use crate::error::{CompensationError, SagaFailure, StepError};
use crate::events::SagaEvent;
use crate::instance::{LoggedStep, SagaInstance};

/// Successful result of a saga execution.
#[derive(Debug, Clone)]
pub struct SagaCompleted<P> {
    /// The execution that completed.
    pub instance_id: InstanceId,
    /// The saga type ID.
    pub saga_id: String,
    /// The payload returned by the last step.
    pub payload: P,
    /// Step names in the order they succeeded.
    pub completed_steps: Vec<String>,
}

/// Result of [`SagaOrchestrator::execute`].
pub type SagaResult<P> = Result<SagaCompleted<P>, SagaFailure>;

/// Executes saga definitions.
///
/// The orchestrator itself holds no per-execution state: each call to
/// [`execute`](Self::execute) creates its own [`SagaInstance`], so one
/// orchestrator can drive any number of concurrent executions. The only
/// shared object is the injected [`EventBus`].
#[derive(Debug, Clone)]
pub struct SagaOrchestrator {
    bus: EventBus,
    config: OrchestratorConfig,
}

impl SagaOrchestrator {
    /// Creates an orchestrator publishing to `bus` with default config.
    pub fn new(bus: EventBus) -> Self {
        Self::with_config(bus, OrchestratorConfig::default())
    }

    /// Creates an orchestrator with explicit configuration.
    pub fn with_config(bus: EventBus, config: OrchestratorConfig) -> Self {
        Self { bus, config }
    }

    /// Returns the event bus lifecycle events are published on.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Returns the configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Runs `definition` against `payload` until a terminal status.
    ///
    /// Steps run one at a time in definition order. On the first forward
    /// failure every step that already succeeded is compensated, last
    /// first, and the reverse walk always runs to the end.
    ///
    /// # Errors
    ///
    /// Returns [`SagaFailure::Compensated`] when a step failed and every
    /// completed step was undone, and [`SagaFailure::Failed`] when at least
    /// one compensation failed or was missing.
    #[tracing::instrument(
        skip_all,
        fields(saga_id = %definition.id(), instance_id = tracing::field::Empty)
    )]
    pub async fn execute<P>(&self, definition: &SagaDefinition<P>, payload: P) -> SagaResult<P>
    where
        P: Clone + Serialize + Send + Sync + 'static,
    {
        let saga_label = definition.id().to_string();
        metrics::counter!("saga_executions_total", "saga" => saga_label.clone()).increment(1);
        let started = Instant::now();

        let mut instance = SagaInstance::new(definition.id(), payload);
        tracing::Span::current().record(
            "instance_id",
            tracing::field::display(instance.instance_id()),
        );
        tracing::info!(steps = definition.len(), "saga started");

        let result = match self.run_forward(definition, &mut instance).await {
            None => Ok(self.finish_completed(instance)),
            Some((failed_step, error)) => {
                Err(self
                    .compensate(definition, instance, failed_step, error)
                    .await)
            }
        };

        let duration = started.elapsed().as_secs_f64();
        metrics::histogram!("saga_duration_seconds", "saga" => saga_label).record(duration);
        result
    }

    /// Forward phase. Returns the failed step and its error, if any.
    async fn run_forward<P>(
        &self,
        definition: &SagaDefinition<P>,
        instance: &mut SagaInstance<P>,
    ) -> Option<(String, StepError)>
    where
        P: Clone + Serialize + Send + Sync + 'static,
    {
        let saga_id = definition.id();
        let instance_id = instance.instance_id();

        while instance.cursor() < definition.len() {
            let step = &definition.steps()[instance.cursor()];
            let step_name = step.name();

            tracing::debug!(step = step_name, cursor = instance.cursor(), "step started");
            self.bus
                .publish(&SagaEvent::step_started(saga_id, instance_id, step_name));

            match step.forward_action().forward(instance.payload().clone()).await {
                Ok(next) => {
                    instance.record_success(step_name, next);
                    tracing::debug!(step = step_name, "step succeeded");
                    self.bus.publish(
                        &SagaEvent::step_succeeded(saga_id, instance_id, step_name)
                            .with_snapshot(self.snapshot(instance.payload())),
                    );
                }
                Err(error) => {
                    metrics::counter!(
                        "saga_step_failures_total",
                        "saga" => saga_id.to_string(),
                        "step" => step_name.to_string()
                    )
                    .increment(1);
                    tracing::warn!(step = step_name, %error, "step failed");
                    self.bus.publish(
                        &SagaEvent::step_failed(saga_id, instance_id, step_name, error.to_string())
                            .with_snapshot(self.snapshot(instance.payload())),
                    );
                    instance.begin_compensation();
                    return Some((step_name.to_string(), error));
                }
            }
        }

        None
    }

    fn finish_completed<P>(&self, mut instance: SagaInstance<P>) -> SagaCompleted<P>
    where
        P: Serialize,
    {
        instance.complete();
        self.bus.publish(
            &SagaEvent::saga_completed(instance.saga_id(), instance.instance_id())
                .with_snapshot(self.snapshot(instance.payload())),
        );
        metrics::counter!("saga_completed_total", "saga" => instance.saga_id().to_string())
            .increment(1);
        tracing::info!(steps = instance.log().len(), "saga completed");

        SagaCompleted {
            instance_id: instance.instance_id(),
            saga_id: instance.saga_id().to_string(),
            completed_steps: instance.completed_steps(),
            payload: instance.into_payload(),
        }
    }

    /// Compensation phase and terminal resolution.
    async fn compensate<P>(
        &self,
        definition: &SagaDefinition<P>,
        mut instance: SagaInstance<P>,
        failed_step: String,
        step_error: StepError,
    ) -> SagaFailure
    where
        P: Clone + Serialize + Send + Sync + 'static,
    {
        let saga_id = definition.id();
        let instance_id = instance.instance_id();

        tracing::warn!(
            failed_step = %failed_step,
            pending = instance.log().len(),
            "compensation started"
        );
        self.bus.publish(&SagaEvent::compensation_started(
            saga_id,
            instance_id,
            &failed_step,
        ));

        let entries: Vec<LoggedStep> = instance.log().unwind().cloned().collect();
        let mut compensated_steps = Vec::with_capacity(entries.len());
        let mut compensation_errors = Vec::new();

        for entry in entries {
            instance.unwinding(entry.index);
            let step = &definition.steps()[entry.index];

            let outcome = match step.compensating_action() {
                None => Err(CompensationError::NotCompensable {
                    step: entry.name.clone(),
                }),
                Some(action) => action
                    .compensate(instance.payload().clone())
                    .await
                    .map_err(|source| CompensationError::Failed {
                        step: entry.name.clone(),
                        source,
                    }),
            };

            match outcome {
                Ok(()) => {
                    tracing::debug!(step = %entry.name, "step compensated");
                    self.bus.publish(&SagaEvent::compensation_step_done(
                        saga_id,
                        instance_id,
                        &entry.name,
                        None,
                    ));
                    compensated_steps.push(entry.name);
                }
                Err(error) => {
                    tracing::error!(step = %entry.name, %error, "compensation failed");
                    self.bus.publish(&SagaEvent::compensation_step_done(
                        saga_id,
                        instance_id,
                        &entry.name,
                        Some(error.to_string()),
                    ));
                    compensation_errors.push(error);
                }
            }
        }

        instance.resolve(compensation_errors.is_empty());
        let snapshot = self.snapshot(instance.payload());

        if compensation_errors.is_empty() {
            self.bus.publish(
                &SagaEvent::saga_compensated(saga_id, instance_id, &failed_step, step_error.to_string())
                    .with_snapshot(snapshot),
            );
            metrics::counter!("saga_compensated_total", "saga" => saga_id.to_string())
                .increment(1);
            tracing::info!(failed_step = %failed_step, "saga compensated");

            SagaFailure::Compensated {
                instance_id,
                failed_step,
                error: step_error,
                compensated_steps,
            }
        } else {
            let messages: Vec<String> = compensation_errors.iter().map(ToString::to_string).collect();
            self.bus.publish(
                &SagaEvent::saga_failed(
                    saga_id,
                    instance_id,
                    &failed_step,
                    step_error.to_string(),
                    messages,
                )
                .with_snapshot(snapshot),
            );
            metrics::counter!("saga_failed_total", "saga" => saga_id.to_string()).increment(1);
            tracing::error!(
                failed_step = %failed_step,
                errors = compensation_errors.len(),
                "saga failed: compensation incomplete, operator intervention required"
            );

            SagaFailure::Failed {
                instance_id,
                failed_step,
                step_error,
                compensation_errors,
            }
        }
    }

    fn snapshot<P: Serialize>(&self, payload: &P) -> Option<serde_json::Value> {
        if !self.config.snapshot_payloads {
            return None;
        }
        match serde_json::to_value(payload) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!(%error, "failed to snapshot saga payload");
                None
            }
        }
    }
}
