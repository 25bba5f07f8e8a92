//! `browse_search`: run a web search and collect the top result links.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use autorun_browser::{Browser, BrowserSession};
use autorun_core::outcome::Outcome;
use serde_json::{Map, Value};

use super::{in_session, payload_str, TaskConfig};
use crate::registry::TaskHandler;

pub const JOB_TYPE: &str = "browse_search";

const DEFAULT_MAX_LINKS: usize = 5;
const MAX_LINKS_CAP: usize = 50;

/// Search box on the results home page. Newer Google layouts use a textarea.
const QUERY_SELECTOR: &str = "textarea[name=q], input[name=q]";

/// Result headings; each sits inside the result's anchor.
const RESULT_SELECTOR: &str = "a h3";

pub struct BrowseSearch {
    browser: Arc<dyn Browser>,
    config: TaskConfig,
}

impl BrowseSearch {
    pub fn new(browser: Arc<dyn Browser>, config: TaskConfig) -> Self {
        Self { browser, config }
    }

    async fn search(
        &self,
        session: &dyn BrowserSession,
        query: &str,
        max_links: usize,
    ) -> anyhow::Result<Outcome> {
        session
            .goto(&self.config.search_url, self.config.navigation_timeout)
            .await
            .with_context(|| format!("failed to load {}", self.config.search_url))?;
        session.fill(QUERY_SELECTOR, query).await?;
        session.press_enter(QUERY_SELECTOR).await?;
        session
            .wait_for(RESULT_SELECTOR, self.config.selector_timeout)
            .await
            .context("search results did not appear")?;

        let links = session.links_under(RESULT_SELECTOR, max_links).await?;

        let mut out = Map::new();
        out.insert("links".into(), serde_json::to_value(links)?);
        Ok(Outcome::from_map(out))
    }
}

/// `max_links` may arrive as a number or a numeric string; anything
/// missing, zero or unparsable falls back to the default.
fn max_links(payload: &Map<String, Value>) -> usize {
    let requested = match payload.get("max_links") {
        Some(Value::Number(n)) => n.as_u64().map(|n| n as usize),
        Some(Value::String(s)) => s.trim().parse::<usize>().ok(),
        _ => None,
    };
    match requested {
        Some(n) if n > 0 => n.min(MAX_LINKS_CAP),
        _ => DEFAULT_MAX_LINKS,
    }
}

#[async_trait]
impl TaskHandler for BrowseSearch {
    async fn handle(&self, payload: &Map<String, Value>) -> anyhow::Result<Outcome> {
        let Some(query) = payload_str(payload, "query") else {
            return Ok(Outcome::error("browse_search requires payload.query"));
        };
        let max_links = max_links(payload);

        tracing::debug!(query, max_links, "Running search");
        let session = self.browser.open_session().await?;
        in_session(session.as_ref(), self.search(session.as_ref(), query, max_links)).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn payload(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn max_links_defaults_and_caps() {
        assert_eq!(max_links(&payload(json!({}))), 5);
        assert_eq!(max_links(&payload(json!({"max_links": 0}))), 5);
        assert_eq!(max_links(&payload(json!({"max_links": "3"}))), 3);
        assert_eq!(max_links(&payload(json!({"max_links": 500}))), 50);
        assert_eq!(max_links(&payload(json!({"max_links": -2}))), 5);
        assert_eq!(max_links(&payload(json!({"max_links": "lots"}))), 5);
    }
}
