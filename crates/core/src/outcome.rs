//! Handler outcomes.
//!
//! A handler returns a JSON mapping. If that mapping carries a non-empty
//! `error` value the job failed, otherwise it completed. Either way the
//! whole mapping becomes the job's `result`.

use serde_json::{Map, Value};

/// Key that marks a result mapping as a failure.
pub const ERROR_KEY: &str = "error";

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed(Map<String, Value>),
    Failed(Map<String, Value>),
}

impl Outcome {
    /// Classify a handler's result mapping.
    pub fn from_map(map: Map<String, Value>) -> Self {
        let failed = match map.get(ERROR_KEY) {
            None | Some(Value::Null) | Some(Value::Bool(false)) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        };
        if failed {
            Outcome::Failed(map)
        } else {
            Outcome::Completed(map)
        }
    }

    /// A failure whose result is exactly `{"error": message}`.
    pub fn error(message: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert(ERROR_KEY.to_string(), Value::String(message.into()));
        Outcome::Failed(map)
    }

    pub fn unknown_job_type(job_type: &str) -> Self {
        Self::error(format!("unknown job type '{job_type}'"))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    /// The `error` text, if this is a failure with a string error.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Outcome::Failed(map) => map.get(ERROR_KEY).and_then(Value::as_str),
            Outcome::Completed(_) => None,
        }
    }

    pub fn into_result(self) -> Value {
        match self {
            Outcome::Completed(map) | Outcome::Failed(map) => Value::Object(map),
        }
    }
}
