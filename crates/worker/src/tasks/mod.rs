//! Browser-driven task handlers.
//!
//! Each handler validates its payload before touching the browser, opens
//! exactly one session, and closes it before returning regardless of
//! how the task went.

pub mod browse_search;
pub mod fill_form;
pub mod visit_url;

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use autorun_browser::{Browser, BrowserSession};
use autorun_core::outcome::Outcome;
use futures::FutureExt;
use serde_json::{Map, Value};

pub use browse_search::BrowseSearch;
pub use fill_form::FillForm;
pub use visit_url::VisitUrl;

use crate::registry::HandlerRegistry;

/// Per-step deadlines and endpoints shared by the tasks.
#[derive(Debug, Clone)]
pub struct TaskConfig {
    /// Search engine home page used by `browse_search`.
    pub search_url: String,
    pub navigation_timeout: Duration,
    pub selector_timeout: Duration,
    /// How long to wait for the page to settle after a form submit.
    pub settle_timeout: Duration,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            search_url: "https://www.google.com".into(),
            navigation_timeout: Duration::from_secs(120),
            selector_timeout: Duration::from_secs(60),
            settle_timeout: Duration::from_secs(120),
        }
    }
}

/// Registry with every built-in task.
pub fn default_registry(browser: Arc<dyn Browser>, config: TaskConfig) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry
        .register(
            visit_url::JOB_TYPE,
            VisitUrl::new(Arc::clone(&browser), config.clone()),
        )
        .register(
            browse_search::JOB_TYPE,
            BrowseSearch::new(Arc::clone(&browser), config.clone()),
        )
        .register(fill_form::JOB_TYPE, FillForm::new(browser, config));
    registry
}

/// Non-empty string field of the payload.
fn payload_str<'a>(payload: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Drive `work` against `session`, then close the session. The session
/// is closed even if `work` panics; the panic is resumed afterwards.
async fn in_session<F>(session: &dyn BrowserSession, work: F) -> anyhow::Result<Outcome>
where
    F: Future<Output = anyhow::Result<Outcome>> + Send,
{
    let result = AssertUnwindSafe(work).catch_unwind().await;
    release(session).await;
    match result {
        Ok(result) => result,
        Err(panic) => panic::resume_unwind(panic),
    }
}

/// Close a session, logging instead of failing the task.
async fn release(session: &dyn BrowserSession) {
    if let Err(e) = session.close().await {
        tracing::warn!(error = %e, "Failed to close browser session");
    }
}
