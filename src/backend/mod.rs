//! Queue backend module.
//!
//! The job-queue engine itself lives elsewhere; this module defines the
//! per-queue handle the dashboard talks to, a registry of those handles, and an
//! in-memory engine for local runs.

mod listing;
mod memory;
mod models;

pub use listing::*;
pub use memory::*;
pub use models::*;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Backend error types.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("queue not found: {0}")]
    QueueNotFound(String),
    #[error("cannot {action} jobs with status {status}")]
    InvalidStatus {
        action: &'static str,
        status: JobStatus,
    },
    #[error("invalid job: {0}")]
    InvalidJob(String),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Handle to one backend queue.
#[async_trait]
pub trait QueueAdapter: Send + Sync {
    /// The queue name, unique within a registry.
    fn name(&self) -> &str;

    /// Read the raw metrics sample, limited to the `[start, end]` sample-index range.
    ///
    /// `Ok(None)` means the queue has no metrics yet.
    async fn get_stats(
        &self,
        start: Option<i64>,
        end: Option<i64>,
    ) -> Result<Option<RawMetricsSample>, BackendError>;

    async fn get_job_counts(&self) -> Result<JobCounts, BackendError>;

    /// Jobs in `status`, by inclusive index window `[start, end]`.
    async fn get_jobs(&self, status: JobStatus, start: u64, end: u64)
        -> Result<Vec<Job>, BackendError>;

    async fn is_paused(&self) -> Result<bool, BackendError>;

    async fn retry_all(&self, status: JobStatus) -> Result<(), BackendError>;

    async fn promote_all(&self) -> Result<(), BackendError>;

    async fn clean_all(&self, status: JobStatus) -> Result<(), BackendError>;

    async fn pause(&self) -> Result<(), BackendError>;

    async fn resume(&self) -> Result<(), BackendError>;

    async fn empty(&self) -> Result<(), BackendError>;

    async fn add_job(
        &self,
        name: &str,
        data: serde_json::Value,
        options: serde_json::Value,
    ) -> Result<Job, BackendError>;
}

/// A queue name paired with its backend handle.
pub type QueuePair = (String, Arc<dyn QueueAdapter>);

/// Thread-safe registry of the queues shown on the dashboard.
#[derive(Clone, Default)]
pub struct QueueRegistry {
    queues: Arc<RwLock<BTreeMap<String, Arc<dyn QueueAdapter>>>>,
}

impl QueueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a queue, replacing any queue with the same name.
    pub async fn add(&self, queue: Arc<dyn QueueAdapter>) {
        let name = queue.name().to_string();
        tracing::info!("Registry: Adding queue {}", name);
        self.queues.write().await.insert(name, queue);
    }

    pub async fn remove(&self, name: &str) -> bool {
        let removed = self.queues.write().await.remove(name).is_some();
        if removed {
            tracing::info!("Registry: Removed queue {}", name);
        }
        removed
    }

    pub async fn get(&self, name: &str) -> Result<Arc<dyn QueueAdapter>, BackendError> {
        self.queues
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| BackendError::QueueNotFound(name.to_string()))
    }

    /// Snapshot of all `(name, handle)` pairs in name order.
    pub async fn pairs(&self) -> Vec<QueuePair> {
        self.queues
            .read()
            .await
            .iter()
            .map(|(name, queue)| (name.clone(), queue.clone()))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.queues.read().await.len()
    }
}
