//! Saga lifecycle history endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::InstanceId;
use saga::SagaEvent;

use crate::AppState;
use crate::error::ApiError;

/// GET /sagas/{instance_id}/events: recorded events for one saga execution.
///
/// The history is bounded, so old executions eventually return 404.
#[tracing::instrument(skip(state))]
pub async fn events(
    State(state): State<Arc<AppState>>,
    Path(instance_id): Path<String>,
) -> Result<Json<Vec<SagaEvent>>, ApiError> {
    let instance_id = InstanceId::parse(&instance_id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid instance ID: {e}")))?;

    let events = state.history.events_for(instance_id);
    if events.is_empty() {
        return Err(ApiError::NotFound(format!(
            "No events recorded for saga {instance_id}"
        )));
    }

    Ok(Json(events))
}
