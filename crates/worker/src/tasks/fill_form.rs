//! `fill_form`: fill form fields on a page, optionally submit and
//! screenshot the result.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use autorun_browser::{Browser, BrowserError, BrowserSession};
use autorun_core::outcome::Outcome;
use serde_json::{Map, Value};

use super::{in_session, payload_str, TaskConfig};
use crate::registry::TaskHandler;

pub const JOB_TYPE: &str = "fill_form";

#[derive(Debug, Clone, PartialEq)]
struct FieldInput {
    selector: String,
    value: String,
}

pub struct FillForm {
    browser: Arc<dyn Browser>,
    config: TaskConfig,
}

impl FillForm {
    pub fn new(browser: Arc<dyn Browser>, config: TaskConfig) -> Self {
        Self { browser, config }
    }

    async fn fill(
        &self,
        session: &dyn BrowserSession,
        url: &str,
        fields: &[FieldInput],
        submit_selector: Option<&str>,
        screenshot: bool,
    ) -> anyhow::Result<Outcome> {
        session
            .goto(url, self.config.navigation_timeout)
            .await
            .with_context(|| format!("failed to load {url}"))?;

        for field in fields {
            session
                .wait_for(&field.selector, self.config.selector_timeout)
                .await
                .with_context(|| format!("field '{}' did not appear", field.selector))?;
            session.fill(&field.selector, &field.value).await?;
        }

        if let Some(submit) = submit_selector {
            session.click(submit).await?;
            match session.wait_for_idle(self.config.settle_timeout).await {
                Ok(()) => {}
                // A page that never settles still gets reported.
                Err(BrowserError::Timeout { .. }) => {
                    tracing::debug!(url, "Page did not settle after submit");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let mut out = Map::new();
        out.insert("final_url".into(), Value::String(session.current_url().await?));
        if screenshot {
            out.insert(
                "screenshot_b64".into(),
                Value::String(session.screenshot_base64().await?),
            );
        }
        Ok(Outcome::from_map(out))
    }
}

/// Parse `payload.fields`. Entries without a selector are dropped;
/// non-string values are rendered as their JSON text.
fn parse_fields(payload: &Map<String, Value>) -> Result<Vec<FieldInput>, &'static str> {
    let items = match payload.get("fields") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => return Err("fill_form payload.fields must be a list"),
    };

    Ok(items
        .iter()
        .filter_map(|item| {
            let selector = item.get("selector")?.as_str()?.trim();
            if selector.is_empty() {
                return None;
            }
            let value = match item.get("value") {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            };
            Some(FieldInput {
                selector: selector.to_string(),
                value,
            })
        })
        .collect())
}

#[async_trait]
impl TaskHandler for FillForm {
    async fn handle(&self, payload: &Map<String, Value>) -> anyhow::Result<Outcome> {
        let Some(url) = payload_str(payload, "url") else {
            return Ok(Outcome::error("fill_form requires payload.url"));
        };
        let fields = match parse_fields(payload) {
            Ok(fields) => fields,
            Err(message) => return Ok(Outcome::error(message)),
        };
        let submit_selector = payload_str(payload, "submit_selector");
        let screenshot = payload
            .get("screenshot")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        tracing::debug!(url, fields = fields.len(), screenshot, "Filling form");
        let session = self.browser.open_session().await?;
        let work = self.fill(session.as_ref(), url, &fields, submit_selector, screenshot);
        in_session(session.as_ref(), work).await
    }
}
