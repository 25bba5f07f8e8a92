//! Field updates the engine writes back to the store.

use chrono::SecondsFormat;
use serde_json::{Map, Value};

use crate::job::RecordShape;
use crate::status::JobStatus;
use crate::types::Timestamp;

/// A single merge-write against one job row.
///
/// Only the engine builds these; handlers never see them.
#[derive(Debug, Clone, PartialEq)]
pub struct JobUpdate {
    pub status: JobStatus,
    pub result: Option<Value>,
    /// New value of the attempts counter, written only on failure.
    pub attempts: Option<i32>,
}

impl JobUpdate {
    pub fn running() -> Self {
        Self {
            status: JobStatus::Running,
            result: None,
            attempts: None,
        }
    }

    pub fn completed(result: Value) -> Self {
        Self {
            status: JobStatus::Completed,
            result: Some(result),
            attempts: None,
        }
    }

    /// `previous_attempts` is the counter as read at claim time.
    pub fn failed(result: Value, previous_attempts: i32) -> Self {
        Self {
            status: JobStatus::Failed,
            result: Some(result),
            attempts: Some(previous_attempts.saturating_add(1)),
        }
    }

    /// Render as column → value for a record of the given shape.
    ///
    /// `updated_at` is always set.
    pub fn to_fields(&self, shape: RecordShape, now: Timestamp) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(
            "status".into(),
            Value::String(self.status.label(shape.schema).into()),
        );
        if let Some(result) = &self.result {
            fields.insert(shape.schema.result_field().into(), result.clone());
        }
        if let (Some(attempts), true) = (self.attempts, shape.tracks_attempts) {
            fields.insert("attempts".into(), Value::from(attempts));
        }
        fields.insert(
            "updated_at".into(),
            Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        fields
    }
}
