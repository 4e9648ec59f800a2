//! HTTP host for the saga orchestration engine.
//!
//! Exposes the `create-order` saga over REST, with structured logging
//! (tracing), Prometheus metrics and a bounded history of saga lifecycle
//! events.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::order_placement::{self, OrderPayload};
use saga::{
    DefinitionError, EventBus, EventRecorder, HandlerError, InMemoryOrderService,
    InMemoryPaymentService, OrchestratorConfig, SagaDefinition, SagaEvent, SagaEventType,
    SagaOrchestrator, ThrottledHandler,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub orchestrator: SagaOrchestrator,
    pub definition: SagaDefinition<OrderPayload>,
    pub orders: InMemoryOrderService,
    pub payments: InMemoryPaymentService,
    pub history: Arc<EventRecorder>,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create))
        .route("/orders", get(routes::orders::list))
        .route("/sagas/{instance_id}/events", get(routes::sagas::events))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state: in-memory services, the order saga and
/// the observers attached to its event bus.
///
/// # Errors
///
/// Fails only if the order saga definition is invalid.
pub fn create_default_state(config: &Config) -> Result<Arc<AppState>, DefinitionError> {
    let orders = InMemoryOrderService::new();
    let payments = InMemoryPaymentService::with_decline_rate(config.payment_decline_rate);
    let definition =
        order_placement::definition(Arc::new(orders.clone()), Arc::new(payments.clone()))?;

    let bus = EventBus::new();
    let history = Arc::new(EventRecorder::new(config.event_history_capacity));
    history.attach(&bus);
    bus.subscribe_handler(
        SagaEventType::SagaFailed,
        Arc::new(ThrottledHandler::new(config.alert_throttle, alert_on_failure)),
    );

    let orchestrator = SagaOrchestrator::with_config(
        bus,
        OrchestratorConfig::default().with_snapshot_payloads(config.snapshot_payloads),
    );

    Ok(Arc::new(AppState {
        orchestrator,
        definition,
        orders,
        payments,
        history,
    }))
}

/// Operator alert for sagas left inconsistent by a failed compensation.
fn alert_on_failure(event: &SagaEvent) -> Result<(), HandlerError> {
    tracing::error!(
        saga_id = %event.saga_id,
        instance_id = %event.instance_id,
        failed_step = event.step_name.as_deref().unwrap_or_default(),
        compensation_errors = ?event.compensation_errors,
        "ALERT: saga requires manual intervention"
    );
    Ok(())
}
