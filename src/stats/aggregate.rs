//! Metrics aggregation across all registered queues.

use super::normalize::{normalize, QueueMetrics, TimeUnit};
use crate::backend::{BackendError, QueuePair, RawMetricsSample};

use chrono::Utc;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};

/// Query parameters of the stats endpoint.
///
/// `start`/`end` are sample-index bounds, not timestamps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,
    #[serde(default)]
    pub timeframe: TimeUnit,
}

/// Response of the stats endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetMetricsResponse {
    pub queues: Vec<QueueMetrics>,
}

impl GetMetricsResponse {
    /// Metrics entry for a queue, by name.
    pub fn get(&self, queue_name: &str) -> Option<&QueueMetrics> {
        self.queues.iter().find(|m| m.queue_name == queue_name)
    }
}

/// Fetch raw samples from every queue concurrently.
///
/// Any single failure fails the whole batch.
pub async fn fetch_samples(
    pairs: &[QueuePair],
    start: Option<i64>,
    end: Option<i64>,
) -> Result<Vec<(String, Option<RawMetricsSample>)>, BackendError> {
    try_join_all(pairs.iter().map(|(name, queue)| async move {
        let sample = queue.get_stats(start, end).await?;
        Ok::<_, BackendError>((name.clone(), sample))
    }))
    .await
}

/// Normalize a batch of fetched samples at a single instant.
pub fn normalize_all(
    samples: Vec<(String, Option<RawMetricsSample>)>,
    now_ms: i64,
    timeframe: TimeUnit,
) -> Vec<QueueMetrics> {
    samples
        .into_iter()
        .map(|(name, sample)| normalize(&name, sample, now_ms, timeframe))
        .collect()
}

/// Collect normalized metrics for every queue in `pairs`.
pub async fn get_stats(
    pairs: &[QueuePair],
    timeframe: TimeUnit,
    start: Option<i64>,
    end: Option<i64>,
) -> Result<Vec<QueueMetrics>, BackendError> {
    if pairs.is_empty() {
        return Ok(Vec::new());
    }

    let samples = fetch_samples(pairs, start, end).await?;
    let metrics = normalize_all(samples, Utc::now().timestamp_millis(), timeframe);

    tracing::debug!("Stats: Normalized metrics for {} queues ({})", metrics.len(), timeframe);

    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{
        Job, JobCounts, JobStatus, MemoryQueue, MetricsMeta, QueueAdapter,
    };
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Adapter returning a fixed sample and counting stats calls.
    struct FixedQueue {
        name: String,
        sample: Option<RawMetricsSample>,
        fail: bool,
        calls: Arc<AtomicUsize>,
        last_range: std::sync::Mutex<Option<(Option<i64>, Option<i64>)>>,
    }

    impl FixedQueue {
        fn new(name: &str, sample: Option<RawMetricsSample>, calls: Arc<AtomicUsize>) -> Self {
            Self {
                name: name.to_string(),
                sample,
                fail: false,
                calls,
                last_range: std::sync::Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl QueueAdapter for FixedQueue {
        fn name(&self) -> &str {
            &self.name
        }

        async fn get_stats(
            &self,
            start: Option<i64>,
            end: Option<i64>,
        ) -> Result<Option<RawMetricsSample>, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_range.lock().unwrap() = Some((start, end));
            if self.fail {
                return Err(BackendError::Unavailable("connection refused".to_string()));
            }
            Ok(self.sample.clone())
        }

        async fn get_job_counts(&self) -> Result<JobCounts, BackendError> {
            Ok(JobCounts::default())
        }

        async fn get_jobs(&self, _: JobStatus, _: u64, _: u64) -> Result<Vec<Job>, BackendError> {
            Ok(Vec::new())
        }

        async fn is_paused(&self) -> Result<bool, BackendError> {
            Ok(false)
        }

        async fn retry_all(&self, _: JobStatus) -> Result<(), BackendError> {
            Ok(())
        }

        async fn promote_all(&self) -> Result<(), BackendError> {
            Ok(())
        }

        async fn clean_all(&self, _: JobStatus) -> Result<(), BackendError> {
            Ok(())
        }

        async fn pause(&self) -> Result<(), BackendError> {
            Ok(())
        }

        async fn resume(&self) -> Result<(), BackendError> {
            Ok(())
        }

        async fn empty(&self) -> Result<(), BackendError> {
            Ok(())
        }

        async fn add_job(
            &self,
            _: &str,
            _: serde_json::Value,
            _: serde_json::Value,
        ) -> Result<Job, BackendError> {
            Err(BackendError::Unavailable("read only".to_string()))
        }
    }

    fn sample(data: Vec<f64>) -> RawMetricsSample {
        RawMetricsSample {
            meta: MetricsMeta {
                count: 110,
                prev_count: 100,
                prev_ts: Utc::now().timestamp_millis() - 60_000,
            },
            count: data.len() as i64,
            data,
        }
    }

    #[tokio::test]
    async fn test_empty_pairs_make_no_calls() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pairs: Vec<QueuePair> = vec![(
            "emails".to_string(),
            Arc::new(FixedQueue::new("emails", Some(sample(vec![30.0])), calls.clone()))
                as Arc<dyn QueueAdapter>,
        )];

        let metrics = get_stats(&pairs[..0], TimeUnit::Min, None, None).await.unwrap();
        assert!(metrics.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // The same adapter is reachable once it is in the slice.
        let metrics = get_stats(&pairs, TimeUnit::Min, None, None).await.unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_one_entry_per_queue() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pairs: Vec<QueuePair> = vec![
            (
                "emails".to_string(),
                Arc::new(FixedQueue::new("emails", Some(sample(vec![30.0, 60.0, 90.0])), calls.clone()))
                    as Arc<dyn QueueAdapter>,
            ),
            (
                "reports".to_string(),
                Arc::new(FixedQueue::new("reports", None, calls.clone())) as Arc<dyn QueueAdapter>,
            ),
        ];

        let metrics = get_stats(&pairs, TimeUnit::Min, Some(0), Some(1440)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(metrics.len(), 2);

        let response = GetMetricsResponse { queues: metrics };
        let emails = response.get("emails").unwrap();
        assert_eq!(emails.average_job_time, 1.0);
        // A few milliseconds pass between building the sample and normalizing it.
        assert!((emails.average_completion_rate - 10.0).abs() < 0.1);

        let reports = response.get("reports").unwrap();
        assert!(reports.metrics.is_none());
        assert_eq!(reports.average_job_time, 0.0);
        assert_eq!(reports.average_completion_rate, 0.0);
    }

    #[tokio::test]
    async fn test_range_forwarded_to_backend() {
        let calls = Arc::new(AtomicUsize::new(0));
        let queue = Arc::new(FixedQueue::new("emails", None, calls));
        let pairs: Vec<QueuePair> = vec![("emails".to_string(), queue.clone() as Arc<dyn QueueAdapter>)];

        get_stats(&pairs, TimeUnit::Day, Some(5), Some(10)).await.unwrap();
        assert_eq!(*queue.last_range.lock().unwrap(), Some((Some(5), Some(10))));
    }

    #[tokio::test]
    async fn test_single_failure_fails_batch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut broken = FixedQueue::new("broken", None, calls.clone());
        broken.fail = true;
        let pairs: Vec<QueuePair> = vec![
            (
                "emails".to_string(),
                Arc::new(FixedQueue::new("emails", Some(sample(vec![])), calls)) as Arc<dyn QueueAdapter>,
            ),
            ("broken".to_string(), Arc::new(broken) as Arc<dyn QueueAdapter>),
        ];

        let result = get_stats(&pairs, TimeUnit::Min, None, None).await;
        assert!(matches!(result, Err(BackendError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_memory_queue_end_to_end() {
        let queue = Arc::new(MemoryQueue::new("emails"));
        queue.add_job("send", json!({}), json!({})).await.unwrap();
        let id = queue.start_next(0).await.unwrap();
        queue.complete(&id, 120.0, Utc::now().timestamp_millis()).await;

        let pairs: Vec<QueuePair> = vec![("emails".to_string(), queue as Arc<dyn QueueAdapter>)];
        let metrics = get_stats(&pairs, TimeUnit::Min, None, None).await.unwrap();
        assert_eq!(metrics[0].queue_name, "emails");
        assert_eq!(metrics[0].average_job_time, 2.0);
        assert!(metrics[0].average_completion_rate.is_finite());
    }

    #[test]
    fn test_normalize_all_uses_one_instant() {
        let now = 1_700_000_000_000;
        let raw = RawMetricsSample {
            meta: MetricsMeta { count: 20, prev_count: 10, prev_ts: now - 60_000 },
            data: vec![],
            count: 0,
        };
        let metrics = normalize_all(
            vec![("a".to_string(), Some(raw.clone())), ("b".to_string(), Some(raw))],
            now,
            TimeUnit::Min,
        );
        assert_eq!(metrics[0].average_completion_rate, 10.0);
        assert_eq!(metrics[1].average_completion_rate, 10.0);
    }
}
