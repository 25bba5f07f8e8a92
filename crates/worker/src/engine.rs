//! Job lifecycle engine.
//!
//! One cycle: claim the oldest due record, mark it `running`, run its
//! handler, write exactly one terminal status with a `result`. Cycles
//! run strictly one after another; a handler call is awaited to
//! completion before anything else happens.
//!
//! Nothing here takes locks or leases. Claim and update are independent
//! store calls, so two workers polling the same table can both pick up a
//! job.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use autorun_core::job::{Job, RecordShape, RejectedJob};
use autorun_core::outcome::Outcome;
use autorun_core::status::{can_transition, JobStatus};
use autorun_core::types::JobId;
use autorun_core::update::JobUpdate;
use autorun_store::JobStore;
use futures::FutureExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::registry::HandlerRegistry;

/// Default pause between polls when there is nothing to do.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// What one call to [`JobEngine::run_cycle`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cycle {
    /// No claimable job.
    Idle,
    /// Claim failed against the store.
    StoreUnavailable,
    /// A job was claimed but could not be marked running; it was left
    /// untouched for a later claim.
    Skipped { job_id: JobId },
    /// A terminal status was written (or attempted, see `persisted`).
    Finalized {
        job_id: JobId,
        status: JobStatus,
        persisted: bool,
    },
    /// The cycle itself panicked outside any handler.
    Faulted,
}

impl Cycle {
    /// Whether the loop should wait a poll interval before the next claim.
    ///
    /// Only a persisted terminal write claims again immediately. An
    /// unpersisted one may leave the row claimable.
    pub fn should_pace(&self) -> bool {
        !matches!(self, Cycle::Finalized { persisted: true, .. })
    }
}

/// Counters accumulated by [`JobEngine::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub idle_ticks: u64,
    pub store_errors: u64,
    /// Terminal writes the store did not accept.
    pub unpersisted: u64,
    pub faults: u64,
}

impl EngineStats {
    fn record(&mut self, cycle: &Cycle) {
        match cycle {
            Cycle::Idle => self.idle_ticks += 1,
            Cycle::StoreUnavailable => self.store_errors += 1,
            Cycle::Skipped { .. } => self.skipped += 1,
            Cycle::Faulted => self.faults += 1,
            Cycle::Finalized {
                status, persisted, ..
            } => {
                if *status == JobStatus::Completed {
                    self.completed += 1;
                } else {
                    self.failed += 1;
                }
                if !persisted {
                    self.unpersisted += 1;
                }
            }
        }
    }
}

pub struct JobEngine {
    store: Arc<dyn JobStore>,
    registry: HandlerRegistry,
    poll_interval: Duration,
}

impl JobEngine {
    pub fn new(store: Arc<dyn JobStore>, registry: HandlerRegistry, poll_interval: Duration) -> Self {
        Self {
            store,
            registry,
            poll_interval,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Poll until `cancel` fires.
    ///
    /// Cancellation is observed between cycles and while idling, never
    /// during a handler call: the in-flight job is always finalized first.
    pub async fn run(&self, cancel: CancellationToken) -> EngineStats {
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            job_types = ?self.registry.job_types(),
            "Polling for jobs",
        );

        let mut stats = EngineStats::default();
        while !cancel.is_cancelled() {
            let cycle = match AssertUnwindSafe(self.run_cycle()).catch_unwind().await {
                Ok(cycle) => cycle,
                Err(panic) => {
                    tracing::error!(panic = %panic_message(&*panic), "Engine cycle panicked");
                    Cycle::Faulted
                }
            };
            stats.record(&cycle);

            if cycle.should_pace() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
            }
        }

        tracing::info!(
            completed = stats.completed,
            failed = stats.failed,
            idle_ticks = stats.idle_ticks,
            store_errors = stats.store_errors,
            "Job engine stopped",
        );
        stats
    }

    /// Claim and fully process at most one job.
    pub async fn run_cycle(&self) -> Cycle {
        let record = match self.store.fetch_next_claimable().await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::trace!("No claimable job");
                return Cycle::Idle;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch next job");
                return Cycle::StoreUnavailable;
            }
        };

        let shape = record.shape;
        match record.job {
            Ok(job) => self.process(shape, job).await,
            Err(rejected) => self.reject(shape, rejected).await,
        }
    }

    /// Fail a record that normalization refused, without marking it running.
    async fn reject(&self, shape: RecordShape, rejected: RejectedJob) -> Cycle {
        tracing::warn!(
            job_id = %rejected.id,
            error = %rejected.error,
            "Rejecting job record",
        );
        let outcome = Outcome::error(rejected.error.to_string());
        self.finalize(&rejected.id, shape, JobStatus::Queued, rejected.attempts, outcome)
            .await
    }

    async fn process(&self, shape: RecordShape, job: Job) -> Cycle {
        tracing::info!(job_id = %job.id, job_type = %job.job_type, "Picked job");

        let Some(handler) = self.registry.resolve(&job.job_type) else {
            tracing::warn!(job_id = %job.id, job_type = %job.job_type, "Unknown job type");
            let outcome = Outcome::unknown_job_type(&job.job_type);
            return self
                .finalize(&job.id, shape, JobStatus::Queued, job.attempts, outcome)
                .await;
        };

        if !self.write(&job.id, shape, &JobUpdate::running()).await {
            // Still claimable in the store; left for a later cycle.
            return Cycle::Skipped { job_id: job.id };
        }

        let started = Instant::now();
        let outcome = match AssertUnwindSafe(handler.handle(&job.payload))
            .catch_unwind()
            .await
        {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(fault)) => {
                tracing::warn!(job_id = %job.id, error = %format!("{fault:#}"), "Handler failed");
                Outcome::error(format!("{fault:#}"))
            }
            Err(panic) => {
                let message = panic_message(&*panic);
                tracing::error!(job_id = %job.id, panic = %message, "Handler panicked");
                Outcome::error(format!("handler panicked: {message}"))
            }
        };

        tracing::debug!(
            job_id = %job.id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            failed = outcome.is_failure(),
            "Handler returned",
        );

        self.finalize(&job.id, shape, JobStatus::Running, job.attempts, outcome)
            .await
    }

    /// Write the one terminal update for a job.
    async fn finalize(
        &self,
        job_id: &str,
        shape: RecordShape,
        from: JobStatus,
        attempts: i32,
        outcome: Outcome,
    ) -> Cycle {
        let update = match outcome {
            Outcome::Completed(map) => JobUpdate::completed(Value::Object(map)),
            Outcome::Failed(map) => JobUpdate::failed(Value::Object(map), attempts),
        };
        debug_assert!(can_transition(from, update.status));

        let persisted = self.write(job_id, shape, &update).await;
        if persisted {
            tracing::info!(job_id, status = %update.status, "Finished job");
        }

        Cycle::Finalized {
            job_id: job_id.to_string(),
            status: update.status,
            persisted,
        }
    }

    /// Store write that never propagates: failures are logged and
    /// reported as `false`. Not retried within the cycle.
    async fn write(&self, job_id: &str, shape: RecordShape, update: &JobUpdate) -> bool {
        match self.store.update_fields(job_id, shape, update).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(job_id, status = %update.status, error = %e, "Failed to update job");
                false
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
