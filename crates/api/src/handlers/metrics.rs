use axum::{extract::State, Json};
use coachdesk_models::MetricsSnapshot;
use std::sync::Arc;

use super::error::{internal_error, ApiResult};
use crate::middleware::{metrics::unix_now, CorrelationId};
use crate::AppState;

/// Request counters for the last hour, in five-minute buckets
pub async fn get_metrics(
    State(state): State<Arc<AppState>>,
    correlation_id: CorrelationId,
) -> ApiResult<MetricsSnapshot> {
    let snapshot = state
        .metrics
        .snapshot(unix_now())
        .await
        .map_err(|e| internal_error(correlation_id.as_str(), &format!("Metrics read failed: {}", e)))?;

    Ok(Json(snapshot))
}
