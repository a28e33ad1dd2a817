use super::error::{from_auth_error, ApiResult};
use crate::middleware::{AuthUser, CorrelationId};
use crate::AppState;
use axum::{extract::State, Extension, Json};
use coachdesk_models::WhoAmI;
use std::sync::Arc;

/// Who am I: identity, organization, role and wallet balance
pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    correlation_id: CorrelationId,
) -> ApiResult<WhoAmI> {
    let wallet = state
        .billing
        .wallet(user.organization_id)
        .await
        .map_err(|e| from_auth_error(e, correlation_id.as_str()))?;

    Ok(Json(WhoAmI {
        subject: user.subject,
        email: user.email,
        name: user.name,
        organization_id: user.organization_id,
        organization_name: user.organization_name,
        role: user.role,
        balance: wallet.balance,
        currency: wallet.currency,
    }))
}
