//! Queue model types shared by the server and the dashboard client.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Checkpoint metadata reported alongside the duration samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsMeta {
    /// Cumulative number of jobs processed.
    pub count: i64,
    /// `count` at the previous checkpoint.
    #[serde(rename = "prevCount")]
    pub prev_count: i64,
    /// Time of the previous checkpoint, epoch milliseconds.
    #[serde(rename = "prevTS")]
    pub prev_ts: i64,
}

/// Raw per-queue metrics as returned by a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMetricsSample {
    pub meta: MetricsMeta,
    /// Job duration samples in seconds, newest first.
    #[serde(deserialize_with = "deserialize_samples")]
    pub data: Vec<f64>,
    /// Total number of samples stored by the backend, regardless of the range read.
    #[serde(default)]
    pub count: i64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SampleValue {
    Number(f64),
    Text(String),
}

/// Accept samples as JSON numbers or numeric strings.
fn deserialize_samples<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<SampleValue>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|v| match v {
            SampleValue::Number(n) => Ok(n),
            SampleValue::Text(s) => s.trim().parse::<f64>().map_err(|_| {
                serde::de::Error::custom(format!("invalid duration sample: {:?}", s))
            }),
        })
        .collect()
}

/// Job status as understood by the queue backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Active,
    #[serde(alias = "wait")]
    Waiting,
    Prioritized,
    Completed,
    Failed,
    Delayed,
    Paused,
}

impl JobStatus {
    pub const ALL: [JobStatus; 7] = [
        JobStatus::Active,
        JobStatus::Waiting,
        JobStatus::Prioritized,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Delayed,
        JobStatus::Paused,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Active => "active",
            JobStatus::Waiting => "waiting",
            JobStatus::Prioritized => "prioritized",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Delayed => "delayed",
            JobStatus::Paused => "paused",
        }
    }

    /// Statuses a bulk retry may target.
    pub fn is_retryable(&self) -> bool {
        matches!(self, JobStatus::Failed | JobStatus::Completed)
    }

    /// Statuses a bulk clean may target. Running jobs are never cleaned.
    pub fn is_cleanable(&self) -> bool {
        !matches!(self, JobStatus::Active)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wait" => Ok(JobStatus::Waiting),
            other => JobStatus::ALL
                .into_iter()
                .find(|status| status.as_str() == other)
                .ok_or_else(|| format!("unknown job status: {}", other)),
        }
    }
}

/// Per-status job counts for one queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounts {
    pub active: u64,
    pub waiting: u64,
    pub prioritized: u64,
    pub completed: u64,
    pub failed: u64,
    pub delayed: u64,
    pub paused: u64,
}

impl JobCounts {
    pub fn get(&self, status: JobStatus) -> u64 {
        match status {
            JobStatus::Active => self.active,
            JobStatus::Waiting => self.waiting,
            JobStatus::Prioritized => self.prioritized,
            JobStatus::Completed => self.completed,
            JobStatus::Failed => self.failed,
            JobStatus::Delayed => self.delayed,
            JobStatus::Paused => self.paused,
        }
    }

    pub fn increment(&mut self, status: JobStatus) {
        match status {
            JobStatus::Active => self.active += 1,
            JobStatus::Waiting => self.waiting += 1,
            JobStatus::Prioritized => self.prioritized += 1,
            JobStatus::Completed => self.completed += 1,
            JobStatus::Failed => self.failed += 1,
            JobStatus::Delayed => self.delayed += 1,
            JobStatus::Paused => self.paused += 1,
        }
    }
}

/// A job as shown in the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub opts: serde_json::Value,
    /// Creation time, epoch milliseconds.
    pub timestamp: i64,
    #[serde(default)]
    pub processed_on: Option<i64>,
    #[serde(default)]
    pub finished_on: Option<i64>,
    #[serde(default)]
    pub failed_reason: Option<String>,
    #[serde(default)]
    pub attempts_made: u32,
}

/// Inclusive job-index window of the page being shown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: u64,
    pub end: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page_count: u64,
    pub range: PageRange,
}

/// One queue entry of the queue list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppQueue {
    pub name: String,
    pub counts: JobCounts,
    #[serde(default)]
    pub jobs: Vec<Job>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    pub is_paused: bool,
    #[serde(default)]
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetQueuesResponse {
    pub queues: Vec<AppQueue>,
}

fn default_page() -> u64 {
    1
}

fn default_jobs_per_page() -> u64 {
    10
}

/// Filters for the queue list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQueuesQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_queue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_jobs_per_page")]
    pub jobs_per_page: u64,
}

impl Default for ListQueuesQuery {
    fn default() -> Self {
        Self {
            active_queue: None,
            status: None,
            page: default_page(),
            jobs_per_page: default_jobs_per_page(),
        }
    }
}
