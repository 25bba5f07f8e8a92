//! Canonical, schema-agnostic job representation.

use serde::Serialize;

use crate::error::NormalizeError;
use crate::status::{JobStatus, RecordSchema};
use crate::types::{JobId, Timestamp};

/// A job record after normalization.
///
/// Two records that differ only in which schema generation they were
/// written with normalize to equal `Job` values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    pub id: JobId,
    pub job_type: String,
    /// Handed to the handler as-is. Always a JSON object.
    pub payload: serde_json::Map<String, serde_json::Value>,
    pub status: JobStatus,
    pub scheduled_at: Option<Timestamp>,
    pub attempts: i32,
    pub result: Option<serde_json::Value>,
    pub created_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
}

impl Job {
    /// A job is due when it has no schedule or the schedule has passed.
    pub fn is_due(&self, now: Timestamp) -> bool {
        self.scheduled_at.is_none_or(|at| at <= now)
    }
}

/// A record that was claimed but cannot be dispatched.
///
/// The engine fails it directly, without ever writing `running`.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedJob {
    pub id: JobId,
    pub attempts: i32,
    pub scheduled_at: Option<Timestamp>,
    pub error: NormalizeError,
}

/// How writes for a given record must be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordShape {
    pub schema: RecordSchema,
    /// Whether the row carries an `attempts` column that may be written.
    pub tracks_attempts: bool,
}

impl RecordShape {
    pub fn current() -> Self {
        Self {
            schema: RecordSchema::Current,
            tracks_attempts: true,
        }
    }

    pub fn legacy(tracks_attempts: bool) -> Self {
        Self {
            schema: RecordSchema::Legacy,
            tracks_attempts,
        }
    }
}

/// Output of [`normalize`](crate::normalize::normalize) for a record
/// that at least has an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub shape: RecordShape,
    pub job: Result<Job, RejectedJob>,
}

impl NormalizedRecord {
    pub fn id(&self) -> &str {
        match &self.job {
            Ok(job) => &job.id,
            Err(rejected) => &rejected.id,
        }
    }

    pub fn scheduled_at(&self) -> Option<Timestamp> {
        match &self.job {
            Ok(job) => job.scheduled_at,
            Err(rejected) => rejected.scheduled_at,
        }
    }

    /// Same due-check as [`Job::is_due`], applied to rejected records too.
    pub fn is_due(&self, now: Timestamp) -> bool {
        self.scheduled_at().is_none_or(|at| at <= now)
    }
}
