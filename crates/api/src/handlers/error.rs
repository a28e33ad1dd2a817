use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use coachdesk_auth::AuthError;
use coachdesk_database::DatabaseError;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
            correlation_id: None,
            retry_after: None,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: &str) -> Self {
        self.correlation_id = Some(correlation_id.to_string());
        self
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

// Type alias for API results
pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// Log the detail, return a masked 500 carrying the correlation id
pub fn internal_error(correlation_id: &str, detail: &str) -> ApiError {
    error!(correlation_id = %correlation_id, "{}", detail);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(
            ErrorResponse::new("internal_error", "An internal error occurred")
                .with_correlation_id(correlation_id),
        ),
    )
}

pub fn bad_request(msg: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new("bad_request", msg)),
    )
}

pub fn validation_error(msg: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new("validation_error", msg)),
    )
}

pub fn not_found(msg: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new("not_found", msg)),
    )
}

pub fn unauthorized(code: &str, msg: &str) -> ApiError {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new(code, msg)),
    )
}

pub fn forbidden(msg: &str) -> ApiError {
    (
        StatusCode::FORBIDDEN,
        Json(ErrorResponse::new("insufficient_permissions", msg)),
    )
}

pub fn conflict(msg: &str) -> ApiError {
    (
        StatusCode::CONFLICT,
        Json(ErrorResponse::new("conflict", msg)),
    )
}

pub fn upstream_error(correlation_id: &str, msg: &str) -> ApiError {
    (
        StatusCode::BAD_GATEWAY,
        Json(ErrorResponse::new("upstream_error", msg).with_correlation_id(correlation_id)),
    )
}

pub fn rate_limited(retry_after: u64) -> ApiError {
    let mut body = ErrorResponse::new(
        "rate_limit_exceeded",
        &format!("Too many requests. Please try again in {} seconds.", retry_after),
    );
    body.retry_after = Some(retry_after);
    (StatusCode::TOO_MANY_REQUESTS, Json(body))
}

pub fn payload_too_large(limit: usize) -> ApiError {
    (
        StatusCode::PAYLOAD_TOO_LARGE,
        Json(ErrorResponse::new(
            "payload_too_large",
            &format!("Request body exceeds the limit of {} bytes", limit),
        )),
    )
}

/// Malformed JSON is a 400; a body cut off by the size limit keeps its 413
pub fn json_rejection(rejection: JsonRejection) -> ApiError {
    let status = rejection.status();
    let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
        "payload_too_large"
    } else {
        "bad_request"
    };
    (status, Json(ErrorResponse::new(code, &rejection.body_text())))
}

pub fn path_rejection(rejection: PathRejection) -> ApiError {
    bad_request(&rejection.body_text())
}

pub fn query_rejection(rejection: QueryRejection) -> ApiError {
    bad_request(&rejection.body_text())
}

/// Map a service error onto the HTTP error contract
pub fn from_auth_error(err: AuthError, correlation_id: &str) -> ApiError {
    match err {
        AuthError::InvalidToken(_) | AuthError::TokenExpired => {
            unauthorized("invalid_token", &err.to_string())
        }
        AuthError::Forbidden(msg) => forbidden(&msg),
        AuthError::InsufficientCredits { balance, required } => {
            warn!(correlation_id = %correlation_id, balance, required, "Insufficient credits");
            (
                StatusCode::PAYMENT_REQUIRED,
                Json(ErrorResponse::new(
                    "insufficient_credits",
                    &format!(
                        "This request costs {} credits but the balance is {}",
                        required, balance
                    ),
                )),
            )
        }
        AuthError::NotFound(msg) => not_found(&msg),
        AuthError::InvalidInput(msg) => bad_request(&msg),
        AuthError::ValidationError(msg) => validation_error(&msg),
        AuthError::DatabaseError(e) => internal_error(correlation_id, &e.to_string()),
        AuthError::ConfigurationError(msg) => internal_error(correlation_id, &msg),
    }
}

pub fn from_database_error(err: DatabaseError, correlation_id: &str) -> ApiError {
    match err {
        DatabaseError::NotFound(msg) => not_found(&msg),
        DatabaseError::InvalidInput(msg) => bad_request(&msg),
        DatabaseError::DuplicateEntry(msg) => conflict(&msg),
        other => internal_error(correlation_id, &other.to_string()),
    }
}

/// Response with `extension` attached, for layers that inspect it
pub fn with_extension<T, E>(result: Result<T, ApiError>, extension: E) -> Response
where
    T: IntoResponse,
    E: Clone + Send + Sync + 'static,
{
    let mut response = result.into_response();
    response.extensions_mut().insert(extension);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_error_is_masked() {
        let (status, Json(body)) = internal_error("req-9", "connection refused on 10.0.0.3");
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "internal_error");
        assert!(!body.message.contains("10.0.0.3"));
        assert_eq!(body.correlation_id.as_deref(), Some("req-9"));
    }

    #[test]
    fn test_auth_error_mapping() {
        let cases = [
            (AuthError::TokenExpired, StatusCode::UNAUTHORIZED, "invalid_token"),
            (
                AuthError::InsufficientCredits { balance: 0, required: 2 },
                StatusCode::PAYMENT_REQUIRED,
                "insufficient_credits",
            ),
            (AuthError::NotFound("x".into()), StatusCode::NOT_FOUND, "not_found"),
            (AuthError::InvalidInput("x".into()), StatusCode::BAD_REQUEST, "bad_request"),
            (AuthError::Forbidden("x".into()), StatusCode::FORBIDDEN, "insufficient_permissions"),
        ];

        for (err, status, code) in cases {
            let (got_status, Json(body)) = from_auth_error(err, "req");
            assert_eq!(got_status, status);
            assert_eq!(body.error, code);
        }
    }

    #[test]
    fn test_database_error_mapping() {
        let (status, _) = from_database_error(DatabaseError::not_found("Chat session", "1"), "req");
        assert_eq!(status, StatusCode::NOT_FOUND);

        let duplicate = DatabaseError::DuplicateEntry("key already exists".into());
        let (status, Json(body)) = from_database_error(duplicate, "req");
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.error, "conflict");

        let (status, Json(body)) =
            from_database_error(DatabaseError::Migration("boom".into()), "req");
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.message.contains("boom"));
    }

    #[test]
    fn test_rate_limited_body() {
        let (status, Json(body)) = rate_limited(12);
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body.retry_after, Some(12));
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("correlation_id").is_none());
    }
}
