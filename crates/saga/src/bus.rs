//! In-process publish/subscribe channel for saga lifecycle events.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;

use crate::events::{SagaEvent, SagaEventType};

/// Error reported by an event handler.
///
/// Handler failures are logged and counted by the bus; they never reach the
/// saga that published the event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

/// Something that reacts to saga events.
///
/// Handlers run synchronously on the publishing saga's task, so they
/// should return quickly or hand work off to their own task.
pub trait EventHandler: Send + Sync {
    /// Handles one event.
    fn handle(&self, event: &SagaEvent) -> Result<(), HandlerError>;
}

impl<F> EventHandler for F
where
    F: Fn(&SagaEvent) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle(&self, event: &SagaEvent) -> Result<(), HandlerError> {
        (self)(event)
    }
}

/// Handle returned by `subscribe`, used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

struct Subscription {
    id: SubscriptionId,
    /// `None` receives every event type.
    event_type: Option<SagaEventType>,
    handler: Arc<dyn EventHandler>,
}

impl Subscription {
    fn matches(&self, event_type: SagaEventType) -> bool {
        self.event_type.is_none_or(|t| t == event_type)
    }
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscriptions: Vec<Subscription>,
}

/// Delivers published events to registered handlers.
///
/// Cloning an `EventBus` yields another handle to the same registry, so a
/// bus can be created once and injected into the orchestrator and any
/// number of observers. Delivery is synchronous: `publish` returns once
/// every matching handler has run, in registration order.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<RwLock<Registry>>,
}

impl EventBus {
    /// Creates a bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a closure for one event type.
    pub fn subscribe<F>(&self, event_type: SagaEventType, handler: F) -> SubscriptionId
    where
        F: Fn(&SagaEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.register(Some(event_type), Arc::new(handler))
    }

    /// Registers a shared handler for one event type.
    pub fn subscribe_handler(
        &self,
        event_type: SagaEventType,
        handler: Arc<dyn EventHandler>,
    ) -> SubscriptionId {
        self.register(Some(event_type), handler)
    }

    /// Registers a closure that receives every event.
    pub fn subscribe_all<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&SagaEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.register(None, Arc::new(handler))
    }

    /// Registers a shared handler that receives every event.
    pub fn subscribe_all_handler(&self, handler: Arc<dyn EventHandler>) -> SubscriptionId {
        self.register(None, handler)
    }

    /// Removes a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        let before = registry.subscriptions.len();
        registry.subscriptions.retain(|s| s.id != id);
        registry.subscriptions.len() != before
    }

    /// Returns how many handlers would receive an event of this type.
    pub fn handler_count(&self, event_type: SagaEventType) -> usize {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .subscriptions
            .iter()
            .filter(|s| s.matches(event_type))
            .count()
    }

    /// Delivers an event to every matching handler.
    ///
    /// A handler that returns an error or panics is logged and skipped;
    /// the remaining handlers still run. The registry lock is released
    /// before handlers are invoked, so handlers may subscribe or publish.
    pub fn publish(&self, event: &SagaEvent) {
        let handlers: Vec<(SubscriptionId, Arc<dyn EventHandler>)> = self
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .subscriptions
            .iter()
            .filter(|s| s.matches(event.event_type))
            .map(|s| (s.id, Arc::clone(&s.handler)))
            .collect();

        tracing::trace!(
            event_type = %event.event_type,
            instance_id = %event.instance_id,
            handlers = handlers.len(),
            "publishing saga event"
        );

        for (id, handler) in handlers {
            match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(event))) {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    metrics::counter!("saga_event_handler_failures_total").increment(1);
                    tracing::warn!(
                        subscription = %id,
                        event_type = %event.event_type,
                        instance_id = %event.instance_id,
                        %error,
                        "event handler failed"
                    );
                }
                Err(payload) => {
                    metrics::counter!("saga_event_handler_failures_total").increment(1);
                    tracing::error!(
                        subscription = %id,
                        event_type = %event.event_type,
                        instance_id = %event.instance_id,
                        panic = panic_message(payload.as_ref()),
                        "event handler panicked"
                    );
                }
            }
        }
    }

    fn register(
        &self,
        event_type: Option<SagaEventType>,
        handler: Arc<dyn EventHandler>,
    ) -> SubscriptionId {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        registry.next_id += 1;
        let id = SubscriptionId(registry.next_id);
        registry.subscriptions.push(Subscription {
            id,
            event_type,
            handler,
        });
        id
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self
            .registry
            .read()
            .map(|r| r.subscriptions.len())
            .unwrap_or_default();
        f.debug_struct("EventBus")
            .field("subscriptions", &count)
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
