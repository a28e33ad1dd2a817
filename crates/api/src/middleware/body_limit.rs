use crate::handlers::error::payload_too_large;
use axum::{
    extract::Request,
    http::{header::CONTENT_TYPE, StatusCode},
    middleware::{from_fn, Next},
    response::{IntoResponse, Response},
    Router,
};
use tower_http::limit::RequestBodyLimitLayer;

/// Cap request bodies at `limit` bytes
pub fn apply<S>(router: Router<S>, limit: usize) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(RequestBodyLimitLayer::new(limit))
        .layer(from_fn(move |request: Request, next: Next| {
            json_rejection(request, next, limit)
        }))
}

/// The limit layer answers with a plain-text 413; give it the JSON error shape
async fn json_rejection(request: Request, next: Next, limit: usize) -> Response {
    let response = next.run(request).await;

    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));

    if response.status() == StatusCode::PAYLOAD_TOO_LARGE && !is_json {
        return payload_too_large(limit).into_response();
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request as HttpRequest, routing::post};
    use tower::ServiceExt;

    fn app() -> Router {
        apply(Router::new().route("/echo", post(|body: String| async move { body })), 16)
    }

    #[tokio::test]
    async fn test_oversized_body_gets_json_error() {
        let response = app()
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/echo")
                    .header("content-length", "64")
                    .body(Body::from("x".repeat(64)))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "payload_too_large");
    }

    #[tokio::test]
    async fn test_small_body_passes() {
        let response = app()
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/echo")
                    .body(Body::from("hello"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
