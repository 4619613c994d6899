//! Conversion of raw queue counters into dashboard rates.

use crate::backend::RawMetricsSample;

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Unit used to express average job duration.
///
/// Unrecognized tokens parse as [`TimeUnit::Min`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum TimeUnit {
    Sec,
    #[default]
    Min,
    Hour,
    Day,
}

impl TimeUnit {
    pub fn from_token(token: &str) -> Self {
        match token {
            "sec" => TimeUnit::Sec,
            "min" => TimeUnit::Min,
            "hour" => TimeUnit::Hour,
            "day" => TimeUnit::Day,
            _ => TimeUnit::Min,
        }
    }

    /// Length of one unit in seconds.
    pub fn seconds(&self) -> f64 {
        match self {
            TimeUnit::Sec => 1.0,
            TimeUnit::Min => 60.0,
            TimeUnit::Hour => 3600.0,
            TimeUnit::Day => 86400.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Sec => "sec",
            TimeUnit::Min => "min",
            TimeUnit::Hour => "hour",
            TimeUnit::Day => "day",
        }
    }
}

impl From<String> for TimeUnit {
    fn from(token: String) -> Self {
        Self::from_token(&token)
    }
}

impl FromStr for TimeUnit {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_token(s))
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized metrics for one queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMetrics {
    pub queue_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<RawMetricsSample>,
    /// Mean job duration expressed in the requested [`TimeUnit`].
    pub average_job_time: f64,
    /// Jobs processed per minute since the previous checkpoint.
    pub average_completion_rate: f64,
}

impl QueueMetrics {
    /// Record for a queue that has no metrics yet.
    pub fn empty(queue_name: &str) -> Self {
        Self {
            queue_name: queue_name.to_string(),
            metrics: None,
            average_job_time: 0.0,
            average_completion_rate: 0.0,
        }
    }
}

/// Normalize one queue's raw sample at wall-clock time `now_ms`.
///
/// A counter reset makes `count - prevCount` negative; the resulting negative
/// rate is reported unchanged.
pub fn normalize(
    queue_name: &str,
    sample: Option<RawMetricsSample>,
    now_ms: i64,
    unit: TimeUnit,
) -> QueueMetrics {
    let Some(sample) = sample else {
        return QueueMetrics::empty(queue_name);
    };

    // Differences in f64: backend-supplied values may span the whole i64 range.
    let elapsed_seconds = (now_ms as f64 - sample.meta.prev_ts as f64) / 1000.0;
    let processed = sample.meta.count as f64 - sample.meta.prev_count as f64;
    let average_completion_rate = if elapsed_seconds == 0.0 {
        0.0
    } else {
        processed / (elapsed_seconds / 60.0)
    };

    let average_job_time = average_duration_seconds(&sample.data) / unit.seconds();

    QueueMetrics {
        queue_name: queue_name.to_string(),
        metrics: Some(sample),
        average_job_time: sanitize_float(average_job_time),
        average_completion_rate: sanitize_float(average_completion_rate),
    }
}

fn average_duration_seconds(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

pub(crate) fn sanitize_float(f: f64) -> f64 {
    if f.is_nan() || f.is_infinite() {
        0.0
    } else {
        f
    }
}
