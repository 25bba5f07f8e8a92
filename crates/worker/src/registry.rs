//! Job type → handler lookup.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use autorun_core::outcome::Outcome;
use serde_json::{Map, Value};

/// Executes one job type.
///
/// Expected failures (bad payload, page error with a useful message) are
/// returned as [`Outcome::Failed`]. Unexpected faults are returned as
/// `Err`; the engine records their `Display` text as `result.error`.
/// Handlers enforce their own deadlines.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, payload: &Map<String, Value>) -> anyhow::Result<Outcome>;
}

/// Adapter turning an async closure into a [`TaskHandler`].
pub struct FnHandler<F>(F);

/// Wrap `f` so it can be registered as a handler.
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Outcome>> + Send + 'static,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut> TaskHandler for FnHandler<F>
where
    F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Outcome>> + Send + 'static,
{
    async fn handle(&self, payload: &Map<String, Value>) -> anyhow::Result<Outcome> {
        (self.0)(payload.clone()).await
    }
}

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `job_type`, replacing any previous one.
    pub fn register(
        &mut self,
        job_type: impl Into<String>,
        handler: impl TaskHandler + 'static,
    ) -> &mut Self {
        self.handlers.insert(job_type.into(), Arc::new(handler));
        self
    }

    /// Handler for `job_type`. `None` means the caller finalizes the job
    /// with [`Outcome::unknown_job_type`] without running anything.
    pub fn resolve(&self, job_type: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(job_type).cloned()
    }

    /// Registered job types, sorted.
    pub fn job_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}
