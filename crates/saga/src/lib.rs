//! Saga orchestration engine.
//!
//! A saga is a business transaction spread across independent services
//! with no global transaction to fall back on. This crate runs one as an
//! ordered list of [`Step`]s, each with a forward action and an optional
//! compensating action:
//!
//! 1. Steps run one at a time, in definition order, threading a payload.
//! 2. On the first failure, every step that already succeeded is
//!    compensated in reverse order of success.
//! 3. Every transition is published on an injectable [`EventBus`] so
//!    observers (alerting, audit, metrics) can follow along.
//!
//! The [`order_placement`] module wires the engine to in-memory order and
//! payment services as a worked example.

pub mod bus;
pub mod config;
pub mod definition;
pub mod error;
pub mod events;
pub mod instance;
pub mod observers;
pub mod orchestrator;
pub mod order_placement;
pub mod services;
pub mod state;
pub mod step;

pub use bus::{EventBus, EventHandler, HandlerError, SubscriptionId};
pub use config::OrchestratorConfig;
pub use definition::{SagaDefinition, SagaDefinitionBuilder};
pub use error::{CompensationError, DefinitionError, SagaFailure, StepError, StepResult};
pub use events::{SagaEvent, SagaEventType};
pub use instance::{CompensationLog, LoggedStep, SagaInstance};
pub use observers::{EventRecorder, ThrottledHandler};
pub use orchestrator::{SagaCompleted, SagaOrchestrator, SagaResult};
pub use services::{
    InMemoryOrderService, InMemoryPaymentService, Order, OrderService, PaymentResult,
    PaymentService, ServiceError,
};
pub use state::SagaStatus;
pub use step::{CompensatingAction, ForwardAction, Step};
