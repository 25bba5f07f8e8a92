//! Shared fixtures for worker integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use autorun_browser::{Browser, BrowserError, BrowserSession, Link};

/// Scripted page state and failure points for [`FakeBrowser`].
#[derive(Debug, Clone, Default)]
pub struct FakePage {
    pub final_url: String,
    pub title: String,
    pub links: Vec<Link>,
    /// Selectors that never appear.
    pub missing_selectors: Vec<String>,
    /// Make navigation time out.
    pub navigation_hangs: bool,
    /// Make `wait_for_idle` time out.
    pub never_settles: bool,
    /// Make `title` panic.
    pub title_panics: bool,
}

/// In-memory [`Browser`] that records every call made against it.
#[derive(Clone, Default)]
pub struct FakeBrowser {
    page: FakePage,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeBrowser {
    pub fn new(page: FakePage) -> Self {
        Self {
            page,
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn open_session(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        self.log("open".into());
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl BrowserSession for FakeBrowser {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        self.log(format!("goto {url}"));
        if self.page.navigation_hangs {
            return Err(BrowserError::Timeout {
                step: "navigation",
                secs: timeout.as_secs(),
            });
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.page.final_url.clone())
    }

    async fn title(&self) -> Result<String, BrowserError> {
        if self.page.title_panics {
            panic!("title lookup crashed");
        }
        Ok(self.page.title.clone())
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        self.log(format!("wait_for {selector}"));
        if self.page.missing_selectors.iter().any(|s| s == selector) {
            return Err(BrowserError::Timeout {
                step: "waiting for selector",
                secs: timeout.as_secs(),
            });
        }
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), BrowserError> {
        self.log(format!("fill {selector}={value}"));
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        self.log(format!("click {selector}"));
        Ok(())
    }

    async fn press_enter(&self, selector: &str) -> Result<(), BrowserError> {
        self.log(format!("enter {selector}"));
        Ok(())
    }

    async fn links_under(&self, selector: &str, limit: usize) -> Result<Vec<Link>, BrowserError> {
        self.log(format!("links {selector} {limit}"));
        Ok(self.page.links.iter().take(limit).cloned().collect())
    }

    async fn wait_for_idle(&self, timeout: Duration) -> Result<(), BrowserError> {
        self.log("wait_for_idle".into());
        if self.page.never_settles {
            return Err(BrowserError::Timeout {
                step: "waiting for page load",
                secs: timeout.as_secs(),
            });
        }
        Ok(())
    }

    async fn screenshot_base64(&self) -> Result<String, BrowserError> {
        self.log("screenshot".into());
        Ok("iVBORw0KGgo=".into())
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.log("close".into());
        Ok(())
    }
}

pub fn payload(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    value.as_object().cloned().expect("payload must be an object")
}
