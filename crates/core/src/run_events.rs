//! Telemetry event kinds and severity levels for `pipeline_run_events`.
//!
//! Stored as text so the audit table stays readable; construction always
//! goes through these enums so unknown values cannot be written.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// What happened during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunEventType {
    RunStarted,
    RunCompleted,
    RunFailed,
    StageStarted,
    StageCompleted,
    StageFailed,
    StageSkipped,
    StageRetryScheduled,
    JobClaimed,
    ManualResumeRequested,
    ManualResumeFailed,
}

impl RunEventType {
    pub const ALL: [RunEventType; 11] = [
        Self::RunStarted,
        Self::RunCompleted,
        Self::RunFailed,
        Self::StageStarted,
        Self::StageCompleted,
        Self::StageFailed,
        Self::StageSkipped,
        Self::StageRetryScheduled,
        Self::JobClaimed,
        Self::ManualResumeRequested,
        Self::ManualResumeFailed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RunStarted => "run_started",
            Self::RunCompleted => "run_completed",
            Self::RunFailed => "run_failed",
            Self::StageStarted => "stage_started",
            Self::StageCompleted => "stage_completed",
            Self::StageFailed => "stage_failed",
            Self::StageSkipped => "stage_skipped",
            Self::StageRetryScheduled => "stage_retry_scheduled",
            Self::JobClaimed => "job_claimed",
            Self::ManualResumeRequested => "manual_resume_requested",
            Self::ManualResumeFailed => "manual_resume_failed",
        }
    }
}

impl fmt::Display for RunEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunEventType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown run event type: {s}")))
    }
}

/// Severity of a run event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventLevel {
    Info,
    Warn,
    Error,
}

impl EventLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for EventLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventLevel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(CoreError::Validation(format!("Unknown event level: {other}"))),
        }
    }
}
