//! Step definitions: named forward actions with optional compensations.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StepResult;

/// The forward half of a saga step.
///
/// Receives the current payload and returns the (possibly augmented)
/// payload for the next step. Implemented for async closures, so steps can
/// be written inline (see [`Step::from_fn`]) or as service structs.
#[async_trait]
pub trait ForwardAction<P>: Send + Sync {
    /// Performs the step's work.
    async fn forward(&self, payload: P) -> StepResult<P>;
}

/// The compensating half of a saga step.
///
/// Receives the payload as it stood when compensation began. Compensations
/// are best-effort and may be invoked against a payload that later steps
/// already augmented.
#[async_trait]
pub trait CompensatingAction<P>: Send + Sync {
    /// Undoes the effects of the step's forward action.
    async fn compensate(&self, payload: P) -> StepResult<()>;
}

#[async_trait]
impl<P, F, Fut> ForwardAction<P> for F
where
    P: Send + 'static,
    F: Fn(P) -> Fut + Send + Sync,
    Fut: Future<Output = StepResult<P>> + Send,
{
    async fn forward(&self, payload: P) -> StepResult<P> {
        (self)(payload).await
    }
}

#[async_trait]
impl<P, F, Fut> CompensatingAction<P> for F
where
    P: Send + 'static,
    F: Fn(P) -> Fut + Send + Sync,
    Fut: Future<Output = StepResult<()>> + Send,
{
    async fn compensate(&self, payload: P) -> StepResult<()> {
        (self)(payload).await
    }
}

/// A named unit of work within a saga definition.
///
/// Steps are plain data: a name, a forward action and an optional
/// compensating action. A step without a compensation is "not compensable";
/// if compensation is ever required for it the saga ends in `Failed`.
pub struct Step<P> {
    name: String,
    forward: Arc<dyn ForwardAction<P>>,
    compensate: Option<Arc<dyn CompensatingAction<P>>>,
}

impl<P> Step<P> {
    /// Creates a step with a forward action and no compensation.
    pub fn new(name: impl Into<String>, forward: impl ForwardAction<P> + 'static) -> Self {
        Self {
            name: name.into(),
            forward: Arc::new(forward),
            compensate: None,
        }
    }

    /// Creates a step from an async closure.
    pub fn from_fn<F, Fut>(name: impl Into<String>, forward: F) -> Self
    where
        P: Send + 'static,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StepResult<P>> + Send + 'static,
    {
        Self::new(name, forward)
    }

    /// Attaches a compensating action.
    pub fn with_compensation(mut self, compensate: impl CompensatingAction<P> + 'static) -> Self {
        self.compensate = Some(Arc::new(compensate));
        self
    }

    /// Attaches a compensating action written as an async closure.
    pub fn with_compensation_fn<F, Fut>(self, compensate: F) -> Self
    where
        P: Send + 'static,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StepResult<()>> + Send + 'static,
    {
        self.with_compensation(compensate)
    }

    /// Returns the step name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if the step has a compensating action.
    pub fn is_compensable(&self) -> bool {
        self.compensate.is_some()
    }

    pub(crate) fn forward_action(&self) -> &dyn ForwardAction<P> {
        self.forward.as_ref()
    }

    pub(crate) fn compensating_action(&self) -> Option<&dyn CompensatingAction<P>> {
        self.compensate.as_deref()
    }
}

impl<P> Clone for Step<P> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            forward: Arc::clone(&self.forward),
            compensate: self.compensate.clone(),
        }
    }
}

impl<P> std::fmt::Debug for Step<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("compensable", &self.is_compensable())
            .finish()
    }
}
