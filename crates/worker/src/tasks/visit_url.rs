//! `visit_url`: open a page and report where it landed.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use autorun_browser::{Browser, BrowserSession};
use autorun_core::outcome::Outcome;
use serde_json::{Map, Value};

use super::{in_session, payload_str, TaskConfig};
use crate::registry::TaskHandler;

pub const JOB_TYPE: &str = "visit_url";

pub struct VisitUrl {
    browser: Arc<dyn Browser>,
    config: TaskConfig,
}

impl VisitUrl {
    pub fn new(browser: Arc<dyn Browser>, config: TaskConfig) -> Self {
        Self { browser, config }
    }

    async fn visit(&self, session: &dyn BrowserSession, url: &str) -> anyhow::Result<Outcome> {
        session
            .goto(url, self.config.navigation_timeout)
            .await
            .with_context(|| format!("failed to load {url}"))?;
        let final_url = session.current_url().await?;
        let title = session.title().await?;

        let mut out = Map::new();
        out.insert("final_url".into(), Value::String(final_url));
        out.insert("title".into(), Value::String(title));
        Ok(Outcome::from_map(out))
    }
}

#[async_trait]
impl TaskHandler for VisitUrl {
    async fn handle(&self, payload: &Map<String, Value>) -> anyhow::Result<Outcome> {
        let Some(url) = payload_str(payload, "url") else {
            return Ok(Outcome::error("visit_url requires payload.url"));
        };

        tracing::debug!(url, "Visiting page");
        let session = self.browser.open_session().await?;
        in_session(session.as_ref(), self.visit(session.as_ref(), url)).await
    }
}
