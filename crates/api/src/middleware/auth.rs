use crate::handlers::error::{forbidden, from_auth_error, unauthorized, ApiError};
use crate::middleware::request_id::correlation_id;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use coachdesk_auth::{Claims, Identity, JwtService};
use coachdesk_models::MemberRole;
use std::sync::Arc;
use uuid::Uuid;

/// Authenticated caller context
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub subject: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub organization_id: Uuid,
    pub organization_name: String,
    pub role: MemberRole,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl From<Identity> for AuthUser {
    fn from(identity: Identity) -> Self {
        Self {
            subject: identity.subject,
            email: identity.email,
            name: identity.name,
            organization_id: identity.organization_id,
            organization_name: identity.organization_name,
            role: identity.role,
        }
    }
}

/// Extract the bearer token from the Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let auth_header = headers
        .get("authorization")
        .ok_or_else(|| unauthorized("missing_auth_header", "Authorization header is required"))?
        .to_str()
        .map_err(|_| unauthorized("invalid_auth_header", "Invalid Authorization header format"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| {
            unauthorized(
                "invalid_auth_scheme",
                "Authorization header must use Bearer scheme",
            )
        })?
        .trim();

    if token.is_empty() {
        return Err(unauthorized("invalid_token", "Bearer token is empty"));
    }

    Ok(token)
}

/// Validate JWT and return claims
pub fn validate_token(jwt: &JwtService, token: &str) -> Result<Claims, ApiError> {
    jwt.verify(token).map_err(|e| {
        tracing::debug!("Token validation failed: {}", e);
        unauthorized("invalid_token", &e.to_string())
    })
}

/// Middleware to require authentication.
///
/// Verifies the token, resolves (or provisions) the caller's organization
/// and stores an [`AuthUser`] in the request extensions.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let correlation_id = correlation_id(&headers);
    let token = extract_bearer_token(&headers)?;
    let claims = validate_token(&state.jwt, token)?;

    let identity = state
        .identity
        .resolve(&claims, &correlation_id)
        .await
        .map_err(|e| from_auth_error(e, &correlation_id))?;

    request.extensions_mut().insert(AuthUser::from(identity));

    Ok(next.run(request).await)
}

/// Middleware to require the admin role; runs inside `require_auth`
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let is_admin = request
        .extensions()
        .get::<AuthUser>()
        .map(AuthUser::is_admin)
        .unwrap_or(false);

    if !is_admin {
        return Err(forbidden("This action requires the organization admin role"));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware::from_fn,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", value.parse().unwrap());
        headers
    }

    fn code(err: ApiError) -> String {
        err.1 .0.error
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token(&headers("Bearer abc.def")).unwrap(), "abc.def");
        assert_eq!(
            code(extract_bearer_token(&HeaderMap::new()).unwrap_err()),
            "missing_auth_header"
        );
        assert_eq!(
            code(extract_bearer_token(&headers("Basic dXNlcg==")).unwrap_err()),
            "invalid_auth_scheme"
        );
        assert_eq!(
            code(extract_bearer_token(&headers("Bearer   ")).unwrap_err()),
            "invalid_token"
        );
    }

    #[test]
    fn test_validate_token_rejects_garbage() {
        let jwt = JwtService::new("test-secret-key-min-32-characters-long");
        let (status, _) = validate_token(&jwt, "not-a-jwt").unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    fn admin_app(role: MemberRole) -> Router {
        Router::new()
            .route("/admin", get(|| async { "ok" }))
            .route_layer(from_fn(require_admin))
            .route_layer(from_fn(move |mut request: Request, next: Next| async move {
                request.extensions_mut().insert(AuthUser {
                    subject: "user_1".to_string(),
                    email: None,
                    name: None,
                    organization_id: Uuid::nil(),
                    organization_name: "Acme".to_string(),
                    role,
                });
                next.run(request).await
            }))
    }

    #[tokio::test]
    async fn test_require_admin() {
        let request = || HttpRequest::builder().uri("/admin").body(Body::empty()).unwrap();

        let denied = admin_app(MemberRole::Member).oneshot(request()).await.unwrap();
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);

        let allowed = admin_app(MemberRole::Admin).oneshot(request()).await.unwrap();
        assert_eq!(allowed.status(), StatusCode::OK);
    }
}
