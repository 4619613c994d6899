//! Plain-text rendering of the dashboard state.

use super::store::QueuesState;
use crate::backend::{AppQueue, JobStatus, RawMetricsSample};
use crate::stats::{QueueMetrics, TimeUnit};

use chrono::{DateTime, Utc};
use std::fmt::{self, Write};
use std::str::FromStr;

const SPARK_BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Samples shown in a sparkline, newest on the right.
const SPARK_WIDTH: usize = 40;

/// Spacing between chart points on the time axis.
const POINT_SPACING_MS: i64 = 60_000;

/// What the per-queue chart plots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetricType {
    /// Raw samples as job counts.
    #[default]
    JobPerMinute,
    /// Samples scaled to milliseconds per job.
    JobAvgTime,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::JobPerMinute => "JobPerMinute",
            MetricType::JobAvgTime => "JobAvgTime",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MetricType::JobPerMinute => "Jobs Per Minute",
            MetricType::JobAvgTime => "Average Job Time",
        }
    }

    fn unit(&self) -> &'static str {
        match self {
            MetricType::JobPerMinute => "jobs",
            MetricType::JobAvgTime => "ms",
        }
    }

    /// Chart values for samples, in the sample order.
    pub fn chart_values(&self, data: &[f64]) -> Vec<f64> {
        match self {
            MetricType::JobPerMinute => data.to_vec(),
            MetricType::JobAvgTime => data.iter().map(|v| v * 1000.0 / 60.0).collect(),
        }
    }
}

impl FromStr for MetricType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "JobPerMinute" | "jobs-per-minute" => Ok(MetricType::JobPerMinute),
            "JobAvgTime" | "avg-time" => Ok(MetricType::JobAvgTime),
            other => Err(format!("unknown metric type: {}", other)),
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Render the whole dashboard.
pub fn render_dashboard(state: &QueuesState, timeframe: TimeUnit, metric: MetricType) -> String {
    let queues = match &state.queues {
        Some(queues) if !state.loading => queues,
        _ => return "Loading queues...\n".to_string(),
    };

    if queues.is_empty() {
        return "No queues registered.\n".to_string();
    }

    let mut out = String::new();
    for queue in queues {
        let metrics = state.metrics.as_ref().and_then(|m| m.get(&queue.name));
        render_queue(&mut out, queue, metrics, timeframe, metric);
    }
    out
}

fn render_queue(
    out: &mut String,
    queue: &AppQueue,
    metrics: Option<&QueueMetrics>,
    timeframe: TimeUnit,
    metric: MetricType,
) {
    let paused = if queue.is_paused { " [paused]" } else { "" };
    let _ = writeln!(out, "{}{}", queue.name, paused);

    let counts: Vec<String> = JobStatus::ALL
        .iter()
        .map(|status| format!("{} {}", status, queue.counts.get(*status)))
        .collect();
    let _ = writeln!(out, "  {}", counts.join(" | "));

    match metrics {
        Some(m) => {
            let _ = writeln!(
                out,
                "  avg job time {:.2} {} | {:.2} jobs/min",
                m.average_job_time, timeframe, m.average_completion_rate
            );
            if let Some(sample) = &m.metrics {
                render_chart(out, sample, metric);
            }
        }
        None => {
            let _ = writeln!(out, "  no metrics");
        }
    }

    if let Some(status) = queue.status {
        let range = &queue.pagination.range;
        let _ = writeln!(
            out,
            "  {} jobs {}-{} of {} pages",
            status, range.start, range.end, queue.pagination.page_count
        );
        for job in &queue.jobs {
            let _ = writeln!(out, "    #{} {}", job.id, job.name);
        }
    }
}

fn render_chart(out: &mut String, sample: &RawMetricsSample, metric: MetricType) {
    let values = metric.chart_values(&sample.data);
    let peak = values
        .iter()
        .take(SPARK_WIDTH)
        .cloned()
        .filter(|v| v.is_finite())
        .fold(0.0_f64, f64::max);

    let _ = writeln!(out, "  {} (peak {:.2} {})", metric.label(), peak, metric.unit());
    let _ = writeln!(out, "  {}", sparkline(&values));

    if let Some((first, last)) = time_span(sample.meta.prev_ts, values.len().min(SPARK_WIDTH)) {
        let _ = writeln!(out, "  {} .. {}", first, last);
    }
}

/// Labels of the first and last chart point, one point per minute from `prev_ts`.
pub fn time_span(prev_ts: i64, points: usize) -> Option<(String, String)> {
    let last_offset = i64::try_from(points.checked_sub(1)?).ok()?.checked_mul(POINT_SPACING_MS)?;
    let first = DateTime::<Utc>::from_timestamp_millis(prev_ts)?;
    let last = DateTime::<Utc>::from_timestamp_millis(prev_ts.checked_add(last_offset)?)?;
    Some((
        first.format("%Y-%m-%d %H:%M").to_string(),
        last.format("%Y-%m-%d %H:%M").to_string(),
    ))
}

/// Bar chart of duration samples. Input is newest-first.
pub fn sparkline(data: &[f64]) -> String {
    let shown: Vec<f64> = data
        .iter()
        .take(SPARK_WIDTH)
        .rev()
        .map(|v| if v.is_finite() { v.max(0.0) } else { 0.0 })
        .collect();

    let max = shown.iter().cloned().fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return SPARK_BARS[0].to_string().repeat(shown.len());
    }

    shown
        .iter()
        .map(|v| {
            let idx = ((v / max) * (SPARK_BARS.len() - 1) as f64).round() as usize;
            SPARK_BARS[idx.min(SPARK_BARS.len() - 1)]
        })
        .collect()
}
