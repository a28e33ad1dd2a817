use crate::handlers;
use crate::middleware;
use crate::AppState;
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// The served application: routes, body limit and CORS, with the request-id
/// layers outermost so every response (413s included) carries the id
pub fn build_app(state: Arc<AppState>) -> Router {
    let body_limit = state.config.body_limit_bytes;

    let app = middleware::body_limit::apply(create_router(state), body_limit).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    );

    middleware::request_id::apply(app)
}

pub fn create_router(state: Arc<AppState>) -> Router {
    // Caller-scoped routes
    let user_routes = Router::new()
        .route("/api/me", get(handlers::me::me))
        .route(
            "/api/chat",
            post(handlers::chat::send_message).layer(from_fn_with_state(
                state.rate_limiter.clone(),
                middleware::rate_limit_user,
            )),
        )
        .route("/api/chat/sessions", get(handlers::chat::list_sessions))
        .route(
            "/api/chat/sessions/:id",
            get(handlers::chat::get_session)
                .patch(handlers::chat::rename_session)
                .delete(handlers::chat::delete_session),
        )
        .route(
            "/api/chat/sessions/:id/messages",
            get(handlers::chat::list_messages),
        );

    // Organization admin routes
    let admin_routes = Router::new()
        .route("/api/admin/billing", get(handlers::billing::get_overview))
        .route("/api/admin/billing/ledger", get(handlers::billing::list_ledger))
        .route("/api/admin/billing/topup", post(handlers::billing::top_up))
        .route("/api/admin/metrics", get(handlers::metrics::get_metrics))
        .route_layer(from_fn(middleware::require_admin));

    Router::new()
        // Health check
        .route("/health", get(handlers::health::health_check))
        .merge(
            user_routes
                .merge(admin_routes)
                .route_layer(from_fn_with_state(state.clone(), middleware::require_auth)),
        )
        .layer(from_fn_with_state(
            state.metrics.clone(),
            middleware::record_metrics,
        ))
        .with_state(state)
}
