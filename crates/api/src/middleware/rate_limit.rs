use crate::config::RateLimitConfig;
use crate::handlers::error::rate_limited;
use crate::middleware::auth::AuthUser;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use coachdesk_cache::{rate_limit_key, CounterStore, Result as CacheResult};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Outcome of one limiter check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Seconds until the current window rolls over, at least 1
    pub reset_secs: u64,
}

/// Per-subject sliding-window limiter.
///
/// Two fixed windows are kept per subject; the previous window's count is
/// weighted by the share of it that still overlaps the sliding window.
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    pub async fn check(&self, identifier: &str) -> CacheResult<Decision> {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        self.check_at(identifier, now_ms).await
    }

    pub async fn check_at(&self, identifier: &str, now_ms: u64) -> CacheResult<Decision> {
        let window_ms = self.config.window_secs * 1000;
        let window = now_ms / window_ms;
        let elapsed_ms = now_ms % window_ms;

        let current_key = rate_limit_key(identifier, window);
        let previous_key = rate_limit_key(identifier, window.saturating_sub(1));
        let counts = self
            .store
            .get_many(&[previous_key, current_key.clone()])
            .await?;
        let previous = counts.first().copied().flatten().unwrap_or(0).max(0) as u64;
        let current = counts.get(1).copied().flatten().unwrap_or(0).max(0) as u64;

        let mut decision = evaluate(
            previous,
            current,
            elapsed_ms,
            window_ms,
            self.config.max_requests,
        );

        if decision.allowed {
            // Keys live for two windows so the next window can still weigh them.
            let recorded = self
                .store
                .incr_by(&current_key, 1, self.config.window_secs * 2)
                .await?;
            // Concurrent requests may have raced past the read above.
            // Rejected requests do not count against the window.
            if recorded.max(0) as u64 > u64::from(self.config.max_requests) {
                decision.allowed = false;
                decision.remaining = 0;
                if let Err(e) = self
                    .store
                    .incr_by(&current_key, -1, self.config.window_secs * 2)
                    .await
                {
                    tracing::warn!(identifier = %identifier, "Rate limit count not released: {}", e);
                }
            }
        }

        Ok(decision)
    }
}

/// Decide whether one more request fits in the sliding window
pub fn evaluate(
    previous: u64,
    current: u64,
    elapsed_ms: u64,
    window_ms: u64,
    limit: u32,
) -> Decision {
    let overlap = (window_ms - elapsed_ms.min(window_ms)) as f64 / window_ms as f64;
    let weighted = (previous as f64 * overlap).floor() as u64 + current;
    let limit_u64 = u64::from(limit);
    let reset_secs = (window_ms - elapsed_ms).div_ceil(1000).max(1);

    if weighted >= limit_u64 {
        Decision {
            allowed: false,
            limit,
            remaining: 0,
            reset_secs,
        }
    } else {
        Decision {
            allowed: true,
            limit,
            remaining: (limit_u64 - weighted - 1) as u32,
            reset_secs,
        }
    }
}

fn apply_headers(headers: &mut HeaderMap, decision: &Decision) {
    headers.insert("x-ratelimit-limit", HeaderValue::from(decision.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(decision.remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(decision.reset_secs));
}

/// Rate limit middleware for authenticated routes, keyed by subject.
/// Runs after `require_auth`; fails open when the counter store errors.
pub async fn rate_limit_user(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(subject) = request
        .extensions()
        .get::<AuthUser>()
        .map(|user| user.subject.clone())
    else {
        tracing::error!("Rate limiter mounted without authentication");
        return next.run(request).await;
    };

    match limiter.check(&format!("user:{}", subject)).await {
        Ok(decision) if decision.allowed => {
            let mut response = next.run(request).await;
            apply_headers(response.headers_mut(), &decision);
            response
        }
        Ok(decision) => {
            tracing::warn!(subject = %subject, "Rate limit exceeded");
            let mut response = rate_limited(decision.reset_secs).into_response();
            apply_headers(response.headers_mut(), &decision);
            response
                .headers_mut()
                .insert("retry-after", HeaderValue::from(decision.reset_secs));
            response
        }
        Err(e) => {
            tracing::error!("Rate limit check error: {}", e);
            // On error, allow the request (fail open)
            next.run(request).await
        }
    }
}
