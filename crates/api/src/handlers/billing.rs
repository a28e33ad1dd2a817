use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Extension, Json,
};
use coachdesk_models::{BalanceChange, BillingOverview, LedgerEntry, Page, PageQuery, TopUpRequest};
use std::sync::Arc;
use tracing::info;

use super::error::{bad_request, from_auth_error, json_rejection, query_rejection, ApiResult};
use crate::middleware::{AuthUser, CorrelationId};
use crate::AppState;

/// Subscription, wallet, recent ledger and reconciliation for the caller's org
pub async fn get_overview(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    correlation_id: CorrelationId,
) -> ApiResult<BillingOverview> {
    let overview = state
        .billing
        .overview(user.organization_id)
        .await
        .map_err(|e| from_auth_error(e, correlation_id.as_str()))?;

    Ok(Json(overview))
}

/// Ledger rows, newest first
pub async fn list_ledger(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    correlation_id: CorrelationId,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Page<LedgerEntry>> {
    let Query(query) = query.map_err(query_rejection)?;
    let cursor = query.cursor().map_err(|e| bad_request(&e.to_string()))?;

    let page = state
        .billing
        .ledger_page(user.organization_id, cursor, query.limit())
        .await
        .map_err(|e| from_auth_error(e, correlation_id.as_str()))?;

    Ok(Json(page))
}

pub async fn top_up(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    correlation_id: CorrelationId,
    payload: Result<Json<TopUpRequest>, JsonRejection>,
) -> ApiResult<BalanceChange> {
    let Json(request) = payload.map_err(json_rejection)?;

    let change = state
        .billing
        .top_up(user.organization_id, &request, correlation_id.as_str())
        .await
        .map_err(|e| from_auth_error(e, correlation_id.as_str()))?;

    info!(
        admin = %user.subject,
        organization_id = %user.organization_id,
        amount = request.amount,
        "Admin top-up applied"
    );

    Ok(Json(change))
}
