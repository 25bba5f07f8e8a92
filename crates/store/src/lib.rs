//! Job store access for the automation worker.
//!
//! [`JobStore`] is the seam the engine depends on: pick the next
//! claimable record, and merge fields into a record by id. Records come
//! back already normalized; field-name differences between schema
//! generations never leave this crate boundary.

pub mod memory;
pub mod postgrest;

use async_trait::async_trait;
use autorun_core::job::{NormalizedRecord, RecordShape};
use autorun_core::update::JobUpdate;

pub use memory::MemoryStore;
pub use postgrest::{PostgrestConfig, PostgrestStore};

/// Errors from store reads and writes.
///
/// All of these are transient from the engine's point of view: it logs
/// them and carries on with the next cycle.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The store answered with a non-2xx status.
    #[error("store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid store configuration: {0}")]
    Config(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Remote table of job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// The oldest (by `created_at`) record with a claimable status whose
    /// `scheduled_at` is absent or not in the future.
    ///
    /// Rows that cannot be addressed by id are logged and passed over;
    /// they never hide the rows behind them.
    async fn fetch_next_claimable(&self) -> Result<Option<NormalizedRecord>, StoreError>;

    /// Merge `update` into the record with `id`, rendered for `shape`.
    /// Always stamps `updated_at`.
    async fn update_fields(
        &self,
        id: &str,
        shape: RecordShape,
        update: &JobUpdate,
    ) -> Result<(), StoreError>;
}
