use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counters of one five-minute bucket
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsBucket {
    pub bucket_start: DateTime<Utc>,
    pub total: u64,
    pub by_mode: BTreeMap<String, u64>,
    pub by_status: BTreeMap<String, u64>,
    pub latency_ms_sum: u64,
    pub latency_count: u64,
}

impl MetricsBucket {
    pub fn avg_latency_ms(&self) -> Option<f64> {
        if self.latency_count == 0 {
            None
        } else {
            Some(self.latency_ms_sum as f64 / self.latency_count as f64)
        }
    }
}

/// Aggregate over the dashboard window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub window_minutes: u64,
    pub bucket_seconds: u64,
    pub total: u64,
    pub by_mode: BTreeMap<String, u64>,
    pub by_status: BTreeMap<String, u64>,
    pub avg_latency_ms: Option<f64>,
    pub buckets: Vec<MetricsBucket>,
}

impl MetricsSnapshot {
    /// Fold buckets (oldest first) into a snapshot
    pub fn from_buckets(buckets: Vec<MetricsBucket>, bucket_seconds: u64) -> Self {
        let mut snapshot = Self {
            window_minutes: buckets.len() as u64 * bucket_seconds / 60,
            bucket_seconds,
            ..Default::default()
        };

        let mut latency_sum = 0u64;
        let mut latency_count = 0u64;
        for bucket in &buckets {
            snapshot.total += bucket.total;
            for (mode, n) in &bucket.by_mode {
                *snapshot.by_mode.entry(mode.clone()).or_default() += n;
            }
            for (status, n) in &bucket.by_status {
                *snapshot.by_status.entry(status.clone()).or_default() += n;
            }
            latency_sum += bucket.latency_ms_sum;
            latency_count += bucket.latency_count;
        }

        snapshot.avg_latency_ms = if latency_count == 0 {
            None
        } else {
            Some(latency_sum as f64 / latency_count as f64)
        };
        snapshot.buckets = buckets;
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(total: u64, mode: &str, status: &str, latency: u64) -> MetricsBucket {
        MetricsBucket {
            bucket_start: Utc::now(),
            total,
            by_mode: BTreeMap::from([(mode.to_string(), total)]),
            by_status: BTreeMap::from([(status.to_string(), total)]),
            latency_ms_sum: latency * total,
            latency_count: total,
        }
    }

    #[test]
    fn test_snapshot_folds_buckets() {
        let snapshot = MetricsSnapshot::from_buckets(
            vec![
                bucket(2, "coach", "200", 100),
                bucket(3, "review", "200", 200),
                bucket(1, "coach", "429", 10),
            ],
            300,
        );

        assert_eq!(snapshot.total, 6);
        assert_eq!(snapshot.window_minutes, 15);
        assert_eq!(snapshot.by_mode["coach"], 3);
        assert_eq!(snapshot.by_mode["review"], 3);
        assert_eq!(snapshot.by_status["200"], 5);
        assert_eq!(snapshot.by_status["429"], 1);
        assert_eq!(snapshot.avg_latency_ms, Some(810.0 / 6.0));
    }

    #[test]
    fn test_empty_window_has_no_latency() {
        let snapshot = MetricsSnapshot::from_buckets(vec![MetricsBucket::default()], 300);
        assert_eq!(snapshot.total, 0);
        assert_eq!(snapshot.avg_latency_ms, None);
    }
}
