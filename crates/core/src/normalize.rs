//! Raw record → canonical [`Job`] mapping.
//!
//! The store hands back JSON rows from either schema generation. This is
//! the only place that knows about both field-name sets; everything after
//! this boundary works with [`Job`] and [`RecordShape`].
//!
//! Field resolution prefers the current schema (`type`, `payload`,
//! `result`) and falls back to the legacy one (`kind`, `payload_json`,
//! `result_json`) when the current field is absent or null.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};

use crate::error::NormalizeError;
use crate::job::{Job, NormalizedRecord, RecordShape, RejectedJob};
use crate::status::{JobStatus, RecordSchema};
use crate::types::{JobId, Timestamp};

const CURRENT_FIELDS: [&str; 3] = ["type", "payload", "result"];
const LEGACY_FIELDS: [&str; 3] = ["kind", "payload_json", "result_json"];

/// Normalize one raw store record.
///
/// Returns `Err` only when the record cannot be addressed at all (not an
/// object, or no id). Every other defect yields a [`RejectedJob`] inside
/// the returned record, so the engine can fail it deterministically.
pub fn normalize(raw: &Value) -> Result<NormalizedRecord, NormalizeError> {
    let obj = raw.as_object().ok_or(NormalizeError::NotAnObject)?;
    let id = read_id(obj).ok_or(NormalizeError::MissingId)?;

    let schema = detect_schema(obj);
    let shape = match schema {
        RecordSchema::Current => RecordShape::current(),
        RecordSchema::Legacy => RecordShape::legacy(obj.contains_key("attempts")),
    };

    let attempts = obj
        .get("attempts")
        .and_then(Value::as_i64)
        .map(|n| n.clamp(0, i32::MAX as i64) as i32)
        .unwrap_or(0);

    let scheduled_at = match read_timestamp(obj, "scheduled_at") {
        Ok(at) => at,
        Err(error) => {
            return Ok(NormalizedRecord {
                shape,
                job: Err(RejectedJob {
                    id,
                    attempts,
                    scheduled_at: None,
                    error,
                }),
            });
        }
    };

    let job = build_job(obj, id.clone(), attempts, scheduled_at).map_err(|error| RejectedJob {
        id,
        attempts,
        scheduled_at,
        error,
    });

    Ok(NormalizedRecord { shape, job })
}

fn build_job(
    obj: &Map<String, Value>,
    id: JobId,
    attempts: i32,
    scheduled_at: Option<Timestamp>,
) -> Result<Job, NormalizeError> {
    let job_type = first_present(obj, "type", "kind")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(NormalizeError::MissingJobType)?
        .to_string();

    let payload = decode_payload(first_present(obj, "payload", "payload_json"))?;

    let status = match obj.get("status").and_then(Value::as_str) {
        Some(label) => JobStatus::from_label(label)
            .ok_or_else(|| NormalizeError::UnknownStatus(label.to_string()))?,
        None => return Err(NormalizeError::UnknownStatus(String::new())),
    };

    Ok(Job {
        id,
        job_type,
        payload,
        status,
        scheduled_at,
        attempts,
        result: first_present(obj, "result", "result_json").cloned(),
        created_at: read_timestamp(obj, "created_at").unwrap_or(None),
        updated_at: read_timestamp(obj, "updated_at").unwrap_or(None),
    })
}

/// Decide which schema generation a row belongs to.
///
/// PostgREST returns every column, nulls included, so key presence tells
/// us which columns the table has. Tables carrying both sets are treated
/// as current.
fn detect_schema(obj: &Map<String, Value>) -> RecordSchema {
    let has_current = CURRENT_FIELDS.iter().any(|k| obj.contains_key(*k));
    let has_legacy = LEGACY_FIELDS.iter().any(|k| obj.contains_key(*k));

    match (has_current, has_legacy) {
        (false, true) => RecordSchema::Legacy,
        (false, false) => {
            let status = obj.get("status").and_then(Value::as_str).unwrap_or_default();
            if matches!(status.trim(), "queued" | "done") {
                RecordSchema::Legacy
            } else {
                RecordSchema::Current
            }
        }
        _ => RecordSchema::Current,
    }
}

fn first_present<'a>(obj: &'a Map<String, Value>, current: &str, legacy: &str) -> Option<&'a Value> {
    obj.get(current)
        .filter(|v| !v.is_null())
        .or_else(|| obj.get(legacy).filter(|v| !v.is_null()))
}

fn read_id(obj: &Map<String, Value>) -> Option<JobId> {
    match obj.get("id")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Payloads arrive as a JSON object, or as a string holding encoded JSON.
/// A missing payload is an empty mapping.
fn decode_payload(value: Option<&Value>) -> Result<Map<String, Value>, NormalizeError> {
    match value {
        None => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(Value::String(encoded)) => {
            if encoded.trim().is_empty() {
                return Ok(Map::new());
            }
            match serde_json::from_str::<Value>(encoded) {
                Ok(Value::Object(map)) => Ok(map),
                Ok(Value::Null) => Ok(Map::new()),
                Ok(other) => Err(NormalizeError::InvalidPayload(format!(
                    "expected an object, got {}",
                    type_name(&other)
                ))),
                Err(e) => Err(NormalizeError::InvalidPayload(e.to_string())),
            }
        }
        Some(other) => Err(NormalizeError::InvalidPayload(format!(
            "expected an object, got {}",
            type_name(other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn read_timestamp(
    obj: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<Timestamp>, NormalizeError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => parse_timestamp(s)
            .map(Some)
            .ok_or_else(|| NormalizeError::InvalidTimestamp {
                field,
                value: s.clone(),
            }),
        Some(other) => Err(NormalizeError::InvalidTimestamp {
            field,
            value: other.to_string(),
        }),
    }
}

/// Parse the timestamp formats Postgres/PostgREST emit.
///
/// Zone-less values are taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<Timestamp> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%#z", "%Y-%m-%d %H:%M:%S%.f%#z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    None
}
