//! Order placement endpoints backed by the `create-order` saga.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use common::InstanceId;
use saga::Order;
use saga::order_placement::OrderPayload;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: String,
    pub amount_cents: i64,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub customer_id: String,
    pub amount_cents: i64,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            customer_id: order.customer_id,
            amount_cents: order.amount_cents,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderPlacedResponse {
    pub instance_id: InstanceId,
    pub status: &'static str,
    pub order_id: Option<String>,
    pub payment_id: Option<String>,
    pub completed_steps: Vec<String>,
}

// -- Handlers --

/// POST /orders: place an order by running the `create-order` saga.
#[tracing::instrument(skip(state, req), fields(customer_id = %req.customer_id))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderPlacedResponse>), ApiError> {
    let customer_id = req.customer_id.trim();
    if customer_id.is_empty() {
        return Err(ApiError::BadRequest("customer_id is required".to_string()));
    }
    if req.amount_cents <= 0 {
        return Err(ApiError::BadRequest(format!(
            "amount_cents must be positive, got {}",
            req.amount_cents
        )));
    }

    let payload = OrderPayload::new(customer_id, req.amount_cents);
    let done = state.orchestrator.execute(&state.definition, payload).await?;

    let response = OrderPlacedResponse {
        instance_id: done.instance_id,
        status: "completed",
        order_id: done.payload.order_id,
        payment_id: done.payload.payment_id,
        completed_steps: done.completed_steps,
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /orders: orders currently held by the order service.
#[tracing::instrument(skip(state))]
pub async fn list(State(state): State<Arc<AppState>>) -> Json<Vec<OrderResponse>> {
    Json(
        state
            .orders
            .orders()
            .into_iter()
            .map(OrderResponse::from)
            .collect(),
    )
}
