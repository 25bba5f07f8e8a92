//! Job status values and the two label sets stored job records use.
//!
//! Older records speak `queued/running/done/failed`; newer ones speak
//! `pending/running/completed/failed`. Both collapse onto [`JobStatus`].

use serde::{Deserialize, Serialize};

/// Status labels the store filters on when looking for claimable work.
pub const CLAIMABLE_LABELS: [&str; 2] = ["queued", "pending"];

/// Which generation of the job-record schema a row was written with.
///
/// Determines field names (`type`/`kind`, `payload`/`payload_json`,
/// `result`/`result_json`) and which status labels are written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSchema {
    Current,
    Legacy,
}

impl RecordSchema {
    pub fn job_type_field(self) -> &'static str {
        match self {
            RecordSchema::Current => "type",
            RecordSchema::Legacy => "kind",
        }
    }

    pub fn payload_field(self) -> &'static str {
        match self {
            RecordSchema::Current => "payload",
            RecordSchema::Legacy => "payload_json",
        }
    }

    pub fn result_field(self) -> &'static str {
        match self {
            RecordSchema::Current => "result",
            RecordSchema::Legacy => "result_json",
        }
    }
}

/// Canonical job lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Parse a stored status label from either label set.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "queued" | "pending" => Some(JobStatus::Queued),
            "running" => Some(JobStatus::Running),
            "done" | "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// The label this status is written as for a record of `schema`.
    pub fn label(self, schema: RecordSchema) -> &'static str {
        match (self, schema) {
            (JobStatus::Queued, RecordSchema::Legacy) => "queued",
            (JobStatus::Queued, RecordSchema::Current) => "pending",
            (JobStatus::Running, _) => "running",
            (JobStatus::Completed, RecordSchema::Legacy) => "done",
            (JobStatus::Completed, RecordSchema::Current) => "completed",
            (JobStatus::Failed, _) => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn is_claimable(self) -> bool {
        self == JobStatus::Queued
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Whether the engine may move a job from `from` to `to`.
///
/// `Queued -> Failed` is the rejection path for records that never get
/// dispatched. Nothing leaves a terminal status.
pub fn can_transition(from: JobStatus, to: JobStatus) -> bool {
    use JobStatus::*;
    matches!(
        (from, to),
        (Queued, Running) | (Queued, Failed) | (Running, Completed) | (Running, Failed)
    )
}
