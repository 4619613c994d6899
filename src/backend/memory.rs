//! In-memory queue engine used for demos and tests.

use super::{BackendError, Job, JobCounts, JobStatus, QueueAdapter, RawMetricsSample, MetricsMeta};

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Two weeks of one-per-minute samples.
pub const DEFAULT_MAX_DATA_POINTS: usize = 20160;

/// Completed and failed jobs kept per status; older ones are dropped.
pub const DEFAULT_MAX_FINISHED_JOBS: usize = 1000;

/// How often the completion-rate checkpoint advances.
const CHECKPOINT_INTERVAL_MS: i64 = 60_000;

struct StoredJob {
    status: JobStatus,
    job: Job,
}

#[derive(Default)]
struct MetricsState {
    count: i64,
    prev_count: i64,
    prev_ts: i64,
    /// Newest first.
    data: VecDeque<f64>,
}

#[derive(Default)]
struct QueueState {
    jobs: Vec<StoredJob>,
    paused: bool,
    next_id: u64,
    metrics: MetricsState,
}

impl QueueState {
    fn move_jobs(&mut self, from: JobStatus, to: JobStatus) -> usize {
        let mut moved = 0;
        for stored in self.jobs.iter_mut().filter(|j| j.status == from) {
            stored.status = to;
            moved += 1;
        }
        moved
    }

    /// Drop the oldest jobs in `status` beyond `keep`.
    fn trim_finished(&mut self, status: JobStatus, keep: usize) {
        let held = self.jobs.iter().filter(|j| j.status == status).count();
        let mut excess = held.saturating_sub(keep);
        if excess == 0 {
            return;
        }

        self.jobs.retain(|j| {
            if excess > 0 && j.status == status {
                excess -= 1;
                false
            } else {
                true
            }
        });
    }
}

/// A queue held entirely in process memory.
pub struct MemoryQueue {
    name: String,
    max_data_points: usize,
    max_finished_jobs: usize,
    state: Mutex<QueueState>,
}

impl MemoryQueue {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            max_data_points: DEFAULT_MAX_DATA_POINTS,
            max_finished_jobs: DEFAULT_MAX_FINISHED_JOBS,
            state: Mutex::new(QueueState::default()),
        }
    }

    pub fn with_max_data_points(mut self, max: usize) -> Self {
        self.max_data_points = max.max(1);
        self
    }

    /// Cap on retained completed jobs and, separately, on failed jobs.
    pub fn with_max_finished_jobs(mut self, max: usize) -> Self {
        self.max_finished_jobs = max;
        self
    }

    /// Move the next runnable job to active, prioritized jobs first.
    pub async fn start_next(&self, now_ms: i64) -> Option<String> {
        let mut state = self.state.lock().await;
        if state.paused {
            return None;
        }

        let next = state
            .jobs
            .iter()
            .position(|j| j.status == JobStatus::Prioritized)
            .or_else(|| state.jobs.iter().position(|j| j.status == JobStatus::Waiting))?;

        let stored = &mut state.jobs[next];
        stored.status = JobStatus::Active;
        stored.job.processed_on = Some(now_ms);
        stored.job.attempts_made += 1;
        Some(stored.job.id.clone())
    }

    /// Complete an active job and record its duration sample.
    pub async fn complete(&self, id: &str, duration_secs: f64, now_ms: i64) -> bool {
        let mut state = self.state.lock().await;
        let Some(stored) = state
            .jobs
            .iter_mut()
            .find(|j| j.job.id == id && j.status == JobStatus::Active)
        else {
            return false;
        };

        stored.status = JobStatus::Completed;
        stored.job.finished_on = Some(now_ms);

        let max = self.max_data_points;
        let metrics = &mut state.metrics;
        if metrics.prev_ts == 0 {
            metrics.prev_ts = now_ms;
        } else if now_ms - metrics.prev_ts >= CHECKPOINT_INTERVAL_MS {
            metrics.prev_count = metrics.count;
            metrics.prev_ts = now_ms;
        }
        metrics.count += 1;
        metrics.data.push_front(duration_secs);
        metrics.data.truncate(max);

        state.trim_finished(JobStatus::Completed, self.max_finished_jobs);

        true
    }

    /// Mark an active job as failed.
    pub async fn fail(&self, id: &str, reason: &str, now_ms: i64) -> bool {
        let mut state = self.state.lock().await;
        match state
            .jobs
            .iter_mut()
            .find(|j| j.job.id == id && j.status == JobStatus::Active)
        {
            Some(stored) => {
                stored.status = JobStatus::Failed;
                stored.job.finished_on = Some(now_ms);
                stored.job.failed_reason = Some(reason.to_string());
            }
            None => return false,
        }

        state.trim_finished(JobStatus::Failed, self.max_finished_jobs);
        true
    }

    async fn active_ids(&self) -> Vec<String> {
        self.state
            .lock()
            .await
            .jobs
            .iter()
            .filter(|j| j.status == JobStatus::Active)
            .map(|j| j.job.id.clone())
            .collect()
    }
}

/// Resolve Redis `LRANGE`-style bounds against a list of `len` items.
///
/// Both bounds are inclusive; negative values count from the end.
pub fn lrange_bounds(len: usize, start: i64, end: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    if len == 0 {
        return None;
    }

    let start = if start < 0 { (len + start).max(0) } else { start };
    let end = if end < 0 { len + end } else { end.min(len - 1) };

    if start > end || start >= len {
        return None;
    }

    Some((start as usize, end as usize))
}

#[async_trait]
impl QueueAdapter for MemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_stats(
        &self,
        start: Option<i64>,
        end: Option<i64>,
    ) -> Result<Option<RawMetricsSample>, BackendError> {
        let state = self.state.lock().await;
        let metrics = &state.metrics;
        if metrics.count == 0 {
            return Ok(None);
        }

        let data = match lrange_bounds(metrics.data.len(), start.unwrap_or(0), end.unwrap_or(-1)) {
            Some((s, e)) => metrics.data.range(s..=e).copied().collect(),
            None => Vec::new(),
        };

        Ok(Some(RawMetricsSample {
            meta: MetricsMeta {
                count: metrics.count,
                prev_count: metrics.prev_count,
                prev_ts: metrics.prev_ts,
            },
            data,
            count: metrics.data.len() as i64,
        }))
    }

    async fn get_job_counts(&self) -> Result<JobCounts, BackendError> {
        let state = self.state.lock().await;
        let mut counts = JobCounts::default();
        for stored in &state.jobs {
            counts.increment(stored.status);
        }
        Ok(counts)
    }

    async fn get_jobs(
        &self,
        status: JobStatus,
        start: u64,
        end: u64,
    ) -> Result<Vec<Job>, BackendError> {
        if end < start {
            return Ok(Vec::new());
        }

        let state = self.state.lock().await;
        Ok(state
            .jobs
            .iter()
            .rev()
            .filter(|j| j.status == status)
            .skip(usize::try_from(start).unwrap_or(usize::MAX))
            .take(usize::try_from((end - start).saturating_add(1)).unwrap_or(usize::MAX))
            .map(|j| j.job.clone())
            .collect())
    }

    async fn is_paused(&self) -> Result<bool, BackendError> {
        Ok(self.state.lock().await.paused)
    }

    async fn retry_all(&self, status: JobStatus) -> Result<(), BackendError> {
        if !status.is_retryable() {
            return Err(BackendError::InvalidStatus { action: "retry", status });
        }

        let mut state = self.state.lock().await;
        let target = if state.paused { JobStatus::Paused } else { JobStatus::Waiting };
        for stored in state.jobs.iter_mut().filter(|j| j.status == status) {
            stored.status = target;
            stored.job.processed_on = None;
            stored.job.finished_on = None;
            stored.job.failed_reason = None;
        }
        Ok(())
    }

    async fn promote_all(&self) -> Result<(), BackendError> {
        let mut state = self.state.lock().await;
        let target = if state.paused { JobStatus::Paused } else { JobStatus::Waiting };
        let promoted = state.move_jobs(JobStatus::Delayed, target);
        tracing::debug!("MemoryQueue: Promoted {} jobs in {}", promoted, self.name);
        Ok(())
    }

    async fn clean_all(&self, status: JobStatus) -> Result<(), BackendError> {
        if !status.is_cleanable() {
            return Err(BackendError::InvalidStatus { action: "clean", status });
        }

        self.state.lock().await.jobs.retain(|j| j.status != status);
        Ok(())
    }

    async fn pause(&self) -> Result<(), BackendError> {
        let mut state = self.state.lock().await;
        state.paused = true;
        state.move_jobs(JobStatus::Waiting, JobStatus::Paused);
        Ok(())
    }

    async fn resume(&self) -> Result<(), BackendError> {
        let mut state = self.state.lock().await;
        state.paused = false;
        state.move_jobs(JobStatus::Paused, JobStatus::Waiting);
        Ok(())
    }

    async fn empty(&self) -> Result<(), BackendError> {
        self.state.lock().await.jobs.retain(|j| {
            !matches!(
                j.status,
                JobStatus::Waiting | JobStatus::Delayed | JobStatus::Prioritized | JobStatus::Paused
            )
        });
        Ok(())
    }

    async fn add_job(
        &self,
        name: &str,
        data: serde_json::Value,
        options: serde_json::Value,
    ) -> Result<Job, BackendError> {
        if name.trim().is_empty() {
            return Err(BackendError::InvalidJob("job name must not be empty".to_string()));
        }

        let delay = options.get("delay").and_then(|v| v.as_i64()).unwrap_or(0);
        let priority = options.get("priority").and_then(|v| v.as_i64()).unwrap_or(0);

        let mut state = self.state.lock().await;
        let status = if delay > 0 {
            JobStatus::Delayed
        } else if state.paused {
            JobStatus::Paused
        } else if priority > 0 {
            JobStatus::Prioritized
        } else {
            JobStatus::Waiting
        };

        state.next_id += 1;
        let job = Job {
            id: state.next_id.to_string(),
            name: name.to_string(),
            data,
            opts: options,
            timestamp: Utc::now().timestamp_millis(),
            processed_on: None,
            finished_on: None,
            failed_reason: None,
            attempts_made: 0,
        };

        state.jobs.push(StoredJob { status, job: job.clone() });
        Ok(job)
    }
}

/// Random decisions for one simulator tick, drawn before any await.
struct SimulationPlan {
    arrivals: u32,
    durations: Vec<f64>,
    failures: Vec<bool>,
    starts: u32,
}

impl SimulationPlan {
    fn draw(max_active: usize) -> Self {
        let mut rng = rand::thread_rng();
        Self {
            arrivals: rng.gen_range(0..=3),
            durations: (0..max_active).map(|_| rng.gen_range(0.05..5.0)).collect(),
            failures: (0..max_active).map(|_| rng.gen_bool(0.1)).collect(),
            starts: rng.gen_range(1..=2),
        }
    }
}

async fn simulate_tick(queue: &MemoryQueue) {
    let plan = SimulationPlan::draw(8);

    for n in 0..plan.arrivals {
        let data = serde_json::json!({ "n": n });
        if let Err(e) = queue.add_job("demo-job", data, serde_json::json!({})).await {
            tracing::error!("Simulator: Failed to add job to {}: {}", queue.name, e);
        }
    }

    let now = Utc::now().timestamp_millis();
    for (i, id) in queue.active_ids().await.into_iter().enumerate() {
        let slot = i % plan.durations.len();
        if plan.failures[slot] {
            queue.fail(&id, "simulated failure", now).await;
        } else {
            queue.complete(&id, plan.durations[slot], now).await;
        }
    }

    for _ in 0..plan.starts {
        if queue.start_next(now).await.is_none() {
            break;
        }
    }
}

/// Drive the given queues with synthetic traffic until the task is aborted.
pub fn spawn_simulator(queues: Vec<Arc<MemoryQueue>>, tick: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        tracing::info!("Simulator: Driving {} queues every {:?}", queues.len(), tick);

        loop {
            interval.tick().await;
            for queue in &queues {
                simulate_tick(queue).await;
            }
        }
    })
}
