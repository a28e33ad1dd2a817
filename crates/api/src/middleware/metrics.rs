//! Request counters in five-minute buckets.
//!
//! Each request adds to `metrics:{bucket}:{series}` keys in the counter
//! store; keys expire on their own once they fall out of the dashboard
//! window. Recording is fire-and-forget and never touches the response.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use coachdesk_cache::{metrics_key, CounterStore, Result as CacheResult};
use coachdesk_models::{ChatMode, MetricsBucket, MetricsSnapshot};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

pub const BUCKET_SECONDS: u64 = 300;
pub const WINDOW_BUCKETS: u64 = 12;
/// One bucket of slack past the dashboard window
const KEY_TTL_SECONDS: u64 = BUCKET_SECONDS * (WINDOW_BUCKETS + 1);

const TRACKED_STATUSES: [u16; 12] = [200, 201, 204, 400, 401, 402, 403, 404, 413, 429, 500, 502];

const SERIES_TOTAL: &str = "total";
const SERIES_LATENCY_SUM: &str = "latency_ms_sum";
const SERIES_LATENCY_COUNT: &str = "latency_count";

fn mode_series(mode: ChatMode) -> String {
    format!("mode:{}", mode)
}

fn status_label(status: u16) -> String {
    if TRACKED_STATUSES.contains(&status) {
        status.to_string()
    } else {
        "other".to_string()
    }
}

fn status_labels() -> impl Iterator<Item = String> {
    TRACKED_STATUSES
        .iter()
        .map(|s| s.to_string())
        .chain(std::iter::once("other".to_string()))
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

pub struct MetricsRecorder {
    store: Arc<dyn CounterStore>,
}

impl MetricsRecorder {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    pub async fn record(
        &self,
        mode: Option<ChatMode>,
        status: u16,
        latency_ms: u64,
        now_secs: u64,
    ) -> CacheResult<()> {
        let bucket = now_secs / BUCKET_SECONDS;

        let mut increments = vec![
            (SERIES_TOTAL.to_string(), 1),
            (format!("status:{}", status_label(status)), 1),
            (SERIES_LATENCY_SUM.to_string(), latency_ms as i64),
            (SERIES_LATENCY_COUNT.to_string(), 1),
        ];
        if let Some(mode) = mode {
            increments.push((mode_series(mode), 1));
        }

        for (series, delta) in increments {
            self.store
                .incr_by(&metrics_key(bucket, &series), delta, KEY_TTL_SECONDS)
                .await?;
        }

        Ok(())
    }

    /// The last [`WINDOW_BUCKETS`] buckets up to `now_secs`, oldest first
    pub async fn snapshot(&self, now_secs: u64) -> CacheResult<MetricsSnapshot> {
        let current = now_secs / BUCKET_SECONDS;
        let first = current.saturating_sub(WINDOW_BUCKETS - 1);

        let mut series: Vec<String> = vec![
            SERIES_TOTAL.to_string(),
            SERIES_LATENCY_SUM.to_string(),
            SERIES_LATENCY_COUNT.to_string(),
        ];
        series.extend(ChatMode::ALL.iter().map(|m| mode_series(*m)));
        series.extend(status_labels().map(|s| format!("status:{}", s)));

        let mut buckets = Vec::with_capacity(WINDOW_BUCKETS as usize);
        for bucket in first..=current {
            let keys: Vec<String> = series.iter().map(|s| metrics_key(bucket, s)).collect();
            let values = self.store.get_many(&keys).await?;
            let counters: BTreeMap<&str, u64> = series
                .iter()
                .zip(values)
                .filter_map(|(s, v)| v.map(|v| (s.as_str(), v.max(0) as u64)))
                .collect();
            buckets.push(build_bucket(bucket, &counters));
        }

        Ok(MetricsSnapshot::from_buckets(buckets, BUCKET_SECONDS))
    }
}

fn build_bucket(bucket: u64, counters: &BTreeMap<&str, u64>) -> MetricsBucket {
    let get = |key: &str| counters.get(key).copied().unwrap_or(0);

    let by_mode = ChatMode::ALL
        .iter()
        .filter_map(|mode| {
            let n = get(&mode_series(*mode));
            (n > 0).then(|| (mode.to_string(), n))
        })
        .collect();

    let by_status = counters
        .iter()
        .filter_map(|(key, n)| key.strip_prefix("status:").map(|s| (s.to_string(), *n)))
        .filter(|(_, n)| *n > 0)
        .collect();

    MetricsBucket {
        bucket_start: DateTime::<Utc>::from_timestamp((bucket * BUCKET_SECONDS) as i64, 0)
            .unwrap_or_default(),
        total: get(SERIES_TOTAL),
        by_mode,
        by_status,
        latency_ms_sum: get(SERIES_LATENCY_SUM),
        latency_count: get(SERIES_LATENCY_COUNT),
    }
}

/// Count every request; the chat handler tags its response with the mode
pub async fn record_metrics(
    State(recorder): State<Arc<MetricsRecorder>>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let response = next.run(request).await;

    let latency_ms = started.elapsed().as_millis() as u64;
    let status = response.status().as_u16();
    let mode = response.extensions().get::<ChatMode>().copied();

    tokio::spawn(async move {
        if let Err(e) = recorder.record(mode, status, latency_ms, unix_now()).await {
            tracing::warn!("Failed to record request metrics: {}", e);
        }
    });

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware::from_fn_with_state,
        response::IntoResponse,
        routing::get,
        Router,
    };
    use coachdesk_cache::MemoryCounterStore;
    use std::time::Duration;
    use tower::ServiceExt;

    const NOW: u64 = 1_700_000_100;

    #[tokio::test]
    async fn test_record_and_snapshot() {
        let recorder = MetricsRecorder::new(Arc::new(MemoryCounterStore::new()));

        recorder.record(Some(ChatMode::Coach), 200, 120, NOW).await.unwrap();
        recorder.record(Some(ChatMode::Review), 200, 80, NOW).await.unwrap();
        recorder.record(None, 429, 2, NOW).await.unwrap();
        // Two buckets earlier
        recorder
            .record(Some(ChatMode::Coach), 418, 10, NOW - 2 * BUCKET_SECONDS)
            .await
            .unwrap();
        // Outside the window
        recorder
            .record(None, 200, 1, NOW - WINDOW_BUCKETS * BUCKET_SECONDS)
            .await
            .unwrap();

        let snapshot = recorder.snapshot(NOW).await.unwrap();
        assert_eq!(snapshot.window_minutes, 60);
        assert_eq!(snapshot.buckets.len(), 12);
        assert_eq!(snapshot.total, 4);
        assert_eq!(snapshot.by_mode["coach"], 2);
        assert_eq!(snapshot.by_mode["review"], 1);
        assert_eq!(snapshot.by_status["200"], 2);
        assert_eq!(snapshot.by_status["429"], 1);
        assert_eq!(snapshot.by_status["other"], 1);
        assert_eq!(snapshot.avg_latency_ms, Some(53.0));

        let latest = snapshot.buckets.last().unwrap();
        assert_eq!(latest.total, 3);
        assert_eq!(
            latest.bucket_start.timestamp() as u64,
            NOW / BUCKET_SECONDS * BUCKET_SECONDS
        );
    }

    #[tokio::test]
    async fn test_middleware_records_mode_from_response() {
        let recorder = Arc::new(MetricsRecorder::new(Arc::new(MemoryCounterStore::new())));
        let app = Router::new()
            .route(
                "/chat",
                get(|| async {
                    let mut response = (StatusCode::PAYMENT_REQUIRED, "no credits").into_response();
                    response.extensions_mut().insert(ChatMode::Review);
                    response
                }),
            )
            .layer(from_fn_with_state(recorder.clone(), record_metrics));

        let response = app
            .oneshot(HttpRequest::builder().uri("/chat").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);

        let mut snapshot = MetricsSnapshot::default();
        for _ in 0..50 {
            snapshot = recorder.snapshot(unix_now()).await.unwrap();
            if snapshot.total > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(snapshot.total, 1);
        assert_eq!(snapshot.by_mode["review"], 1);
        assert_eq!(snapshot.by_status["402"], 1);
    }
}
