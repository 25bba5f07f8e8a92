//! In-process [`JobStore`] holding raw JSON rows.
//!
//! Mirrors the PostgREST store's claim filter and merge semantics so the
//! engine can be exercised without a network. Records every write for
//! assertions and can be told to fail reads or writes.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use autorun_core::job::{NormalizedRecord, RecordShape};
use autorun_core::normalize::{normalize, parse_timestamp};
use autorun_core::status::CLAIMABLE_LABELS;
use autorun_core::types::{JobId, Timestamp};
use autorun_core::update::JobUpdate;
use chrono::Utc;
use serde_json::{Map, Value};

use crate::{JobStore, StoreError};

type Clock = Box<dyn Fn() -> Timestamp + Send + Sync>;

/// One `update_fields` call as the store saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedWrite {
    pub id: JobId,
    pub fields: Map<String, Value>,
    /// False when the write was rejected by fault injection.
    pub applied: bool,
}

#[derive(Default)]
struct Inner {
    records: Vec<Value>,
    writes: Vec<RecordedWrite>,
    fetches: usize,
    failing_fetches: usize,
    failing_updates: usize,
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
    clock: Clock,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Utc::now)
    }

    pub fn with_clock(clock: impl Fn() -> Timestamp + Send + Sync + 'static) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            clock: Box::new(clock),
        }
    }

    pub fn insert(&self, record: Value) {
        self.lock().records.push(record);
    }

    /// Current state of the row with `id`.
    pub fn record(&self, id: &str) -> Option<Value> {
        self.lock()
            .records
            .iter()
            .find(|r| record_id(r).as_deref() == Some(id))
            .cloned()
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.lock().writes.clone()
    }

    pub fn writes_for(&self, id: &str) -> Vec<RecordedWrite> {
        self.lock()
            .writes
            .iter()
            .filter(|w| w.id == id)
            .cloned()
            .collect()
    }

    pub fn fetch_count(&self) -> usize {
        self.lock().fetches
    }

    /// Make the next `n` fetches fail.
    pub fn fail_next_fetches(&self, n: usize) {
        self.lock().failing_fetches = n;
    }

    /// Make the next `n` updates fail without being applied.
    pub fn fail_next_updates(&self, n: usize) {
        self.lock().failing_updates = n;
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn fetch_next_claimable(&self) -> Result<Option<NormalizedRecord>, StoreError> {
        let now = (self.clock)();
        let mut inner = self.lock();
        inner.fetches += 1;
        if inner.failing_fetches > 0 {
            inner.failing_fetches -= 1;
            return Err(StoreError::Unavailable("injected fetch failure".into()));
        }

        let mut best: Option<(Option<Timestamp>, NormalizedRecord)> = None;
        for raw in &inner.records {
            let claimable = raw
                .get("status")
                .and_then(Value::as_str)
                .is_some_and(|s| CLAIMABLE_LABELS.contains(&s));
            if !claimable {
                continue;
            }
            let record = match normalize(raw) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unaddressable job record");
                    continue;
                }
            };
            if !record.is_due(now) {
                continue;
            }
            let created_at = raw
                .get("created_at")
                .and_then(Value::as_str)
                .and_then(parse_timestamp);
            let older = match &best {
                None => true,
                Some((best_at, _)) => is_older(created_at, *best_at),
            };
            if older {
                best = Some((created_at, record));
            }
        }
        Ok(best.map(|(_, record)| record))
    }

    async fn update_fields(
        &self,
        id: &str,
        shape: RecordShape,
        update: &JobUpdate,
    ) -> Result<(), StoreError> {
        let fields = update.to_fields(shape, (self.clock)());
        let mut inner = self.lock();

        if inner.failing_updates > 0 {
            inner.failing_updates -= 1;
            inner.writes.push(RecordedWrite {
                id: id.to_string(),
                fields,
                applied: false,
            });
            return Err(StoreError::Unavailable("injected update failure".into()));
        }

        if let Some(Value::Object(row)) = inner
            .records
            .iter_mut()
            .find(|r| record_id(r).as_deref() == Some(id))
        {
            for (k, v) in &fields {
                row.insert(k.clone(), v.clone());
            }
        }
        inner.writes.push(RecordedWrite {
            id: id.to_string(),
            fields,
            applied: true,
        });
        Ok(())
    }
}

/// Rows without `created_at` sort after rows with one. Ties keep
/// insertion order.
fn is_older(candidate: Option<Timestamp>, best: Option<Timestamp>) -> bool {
    match (candidate, best) {
        (Some(c), Some(b)) => c < b,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

fn record_id(record: &Value) -> Option<String> {
    match record.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
