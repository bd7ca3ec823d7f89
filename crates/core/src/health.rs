//! Reliability metrics aggregated over a lookback window of runs and events.

use serde::Serialize;

use crate::run_events::RunEventType;
use crate::types::Timestamp;

pub const DEFAULT_LOOKBACK_HOURS: i64 = 24;
pub const MAX_LOOKBACK_HOURS: i64 = 168;

/// Maximum runs read for one health computation.
pub const HEALTH_RUN_LIMIT: i64 = 300;
/// Maximum events read for one health computation.
pub const HEALTH_EVENT_LIMIT: i64 = 2000;

/// Clamp a requested lookback to `1..=168` hours.
pub fn clamp_lookback_hours(hours: Option<i64>) -> i64 {
    hours
        .unwrap_or(DEFAULT_LOOKBACK_HOURS)
        .clamp(1, MAX_LOOKBACK_HOURS)
}

/// The fields of a run that health reporting needs.
#[derive(Debug, Clone)]
pub struct RunSample {
    pub runtime_seconds: Option<f64>,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub lookback_hours: i64,
    pub run_count: usize,
    pub run_completed: usize,
    pub run_failed: usize,
    pub stage_failed: usize,
    pub stage_retried: usize,
    pub retry_rate: f64,
    pub avg_runtime_seconds: Option<f64>,
    pub p95_runtime_seconds: Option<f64>,
    pub latest_run_at: Option<Timestamp>,
}

/// Nearest-rank percentile: sort ascending, index `ceil(p/100 * n) - 1`
/// clamped to the valid range. `None` for an empty sample.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    let rank = ((p / 100.0) * n as f64).ceil() as i64 - 1;
    let idx = rank.clamp(0, n as i64 - 1) as usize;
    Some(sorted[idx])
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

pub fn compute_health(lookback_hours: i64, runs: &[RunSample], events: &[RunEventType]) -> HealthReport {
    let runtimes: Vec<f64> = runs
        .iter()
        .filter_map(|r| r.runtime_seconds)
        .filter(|v| v.is_finite() && *v > 0.0)
        .collect();

    let count = |kind: RunEventType| events.iter().filter(|e| **e == kind).count();
    let stage_failed = count(RunEventType::StageFailed);
    let stage_retried = count(RunEventType::StageRetryScheduled);

    let retry_rate = if stage_failed > 0 {
        round_to(stage_retried as f64 / stage_failed as f64, 3)
    } else {
        0.0
    };

    let avg_runtime_seconds = if runtimes.is_empty() {
        None
    } else {
        Some(round_to(runtimes.iter().sum::<f64>() / runtimes.len() as f64, 2))
    };

    HealthReport {
        lookback_hours: lookback_hours.clamp(1, MAX_LOOKBACK_HOURS),
        run_count: runs.len(),
        run_completed: count(RunEventType::RunCompleted),
        run_failed: count(RunEventType::RunFailed),
        stage_failed,
        stage_retried,
        retry_rate,
        avg_runtime_seconds,
        p95_runtime_seconds: percentile(&runtimes, 95.0),
        latest_run_at: runs.iter().map(|r| r.created_at).max(),
    }
}
