//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use api::config::Config;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup_with_state() -> (axum::Router, Arc<api::AppState>) {
    let state = api::create_default_state(&Config::default()).unwrap();
    let app = api::create_app(state.clone(), get_metrics_handle());
    (app, state)
}

fn setup() -> axum::Router {
    setup_with_state().0
}

fn post_order(customer_id: &str, amount_cents: i64) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/orders")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::to_string(&serde_json::json!({
                "customer_id": customer_id,
                "amount_cents": amount_cents
            }))
            .unwrap(),
        ))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let response = setup().oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}

#[tokio::test]
async fn test_place_order_completes_saga() {
    let (app, state) = setup_with_state();

    let response = app.oneshot(post_order("cust-1", 4_200)).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["status"], "completed");
    assert_eq!(json["order_id"], "ORD-0001");
    assert_eq!(json["payment_id"], "PAY-0001");
    assert_eq!(
        json["completed_steps"],
        serde_json::json!(["create_order", "process_payment"])
    );
    assert!(state.orders.has_order("ORD-0001"));
}

#[tokio::test]
async fn test_declined_payment_returns_422_and_cancels_order() {
    let (app, state) = setup_with_state();
    state.payments.set_fail_on_charge(true);

    let response = app.oneshot(post_order("cust-1", 4_200)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["status"], "compensated");
    assert_eq!(json["failed_step"], "process_payment");
    assert!(json["error"].as_str().unwrap().contains("payment declined"));
    assert_eq!(json["compensation_errors"], serde_json::json!([]));
    assert_eq!(state.orders.order_count(), 0);
}

#[tokio::test]
async fn test_failed_compensation_returns_500() {
    let (app, state) = setup_with_state();
    state.payments.set_fail_on_charge(true);
    state.orders.set_fail_on_cancel(true);

    let response = app.oneshot(post_order("cust-1", 4_200)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["status"], "failed");
    let errors = json["compensation_errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].as_str().unwrap().contains("create_order"));
    assert_eq!(state.orders.order_count(), 1, "order left for an operator");
}

#[tokio::test]
async fn test_invalid_order_rejected_before_saga() {
    let (app, state) = setup_with_state();

    let response = app.clone().oneshot(post_order("cust-1", 0)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(
        body_json(response).await["error"]
            .as_str()
            .unwrap()
            .contains("amount_cents")
    );

    let response = app.oneshot(post_order("   ", 100)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert!(state.history.is_empty(), "no saga should have started");
}

#[tokio::test]
async fn test_list_orders() {
    let (app, _) = setup_with_state();

    for amount in [100, 200] {
        let response = app
            .clone()
            .oneshot(post_order("cust-7", amount))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app.oneshot(get("/orders")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let orders = json.as_array().unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0]["id"], "ORD-0001");
    assert_eq!(orders[1]["amount_cents"], 200);
    assert_eq!(orders[1]["customer_id"], "cust-7");
}

#[tokio::test]
async fn test_saga_events_for_instance() {
    let (app, _) = setup_with_state();

    let response = app.clone().oneshot(post_order("cust-1", 500)).await.unwrap();
    let instance_id = body_json(response).await["instance_id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .oneshot(get(&format!("/sagas/{instance_id}/events")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let types: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["type"].as_str().unwrap())
        .collect();
    assert_eq!(
        types,
        vec![
            "step.started",
            "step.succeeded",
            "step.started",
            "step.succeeded",
            "saga.completed",
        ]
    );
    assert!(json.as_array().unwrap().iter().all(|e| e["instance_id"] == instance_id));
}

#[tokio::test]
async fn test_saga_events_for_compensated_instance() {
    let (app, state) = setup_with_state();
    state.payments.set_fail_on_charge(true);

    let response = app.clone().oneshot(post_order("cust-1", 500)).await.unwrap();
    let instance_id = body_json(response).await["instance_id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .oneshot(get(&format!("/sagas/{instance_id}/events")))
        .await
        .unwrap();
    let json = body_json(response).await;
    let last = json.as_array().unwrap().last().unwrap().clone();
    assert_eq!(last["type"], "saga.compensated");
    assert_eq!(last["step_name"], "process_payment");
}

#[tokio::test]
async fn test_saga_events_unknown_instance() {
    let response = setup()
        .oneshot(get(&format!(
            "/sagas/{}/events",
            common::InstanceId::new()
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_saga_events_invalid_instance_id() {
    let response = setup()
        .oneshot(get("/sagas/not-a-uuid/events"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("Invalid instance ID"));
}

#[tokio::test]
async fn test_metrics_endpoint_reports_saga_counters() {
    let app = setup();

    let response = app.clone().oneshot(post_order("cust-1", 100)).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("saga_executions_total"));
    assert!(text.contains("saga_completed_total"));
}
