//! Headless browser sessions for task handlers.
//!
//! [`Browser`] opens sessions; [`BrowserSession`] is the handful of page
//! operations the automation tasks need. [`webdriver::WebDriverBrowser`]
//! implements both over the W3C WebDriver HTTP protocol.
//!
//! A session holds a real browser process on the driver side. Callers
//! must [`close`](BrowserSession::close) it before returning, on every
//! path.

pub mod webdriver;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

pub use webdriver::{WebDriverBrowser, WebDriverConfig};

/// A result link scraped from a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub title: String,
    pub url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    /// The HTTP request to the driver failed.
    #[error("WebDriver request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The driver answered with an error or an unexpected body.
    #[error("WebDriver error: {0}")]
    Protocol(String),

    #[error("no element matches '{0}'")]
    NoSuchElement(String),

    #[error("{step} timed out after {secs}s")]
    Timeout { step: &'static str, secs: u64 },
}

#[async_trait]
pub trait Browser: Send + Sync {
    async fn open_session(&self) -> Result<Box<dyn BrowserSession>, BrowserError>;
}

#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate and wait for the page load, bounded by `timeout`.
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    async fn current_url(&self) -> Result<String, BrowserError>;

    async fn title(&self) -> Result<String, BrowserError>;

    /// Poll until `selector` matches an element.
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Replace the contents of the first element matching `selector`.
    async fn fill(&self, selector: &str, value: &str) -> Result<(), BrowserError>;

    async fn click(&self, selector: &str) -> Result<(), BrowserError>;

    async fn press_enter(&self, selector: &str) -> Result<(), BrowserError>;

    /// For up to `limit` elements matching `selector`, the text of the
    /// element and the `href` of its closest enclosing anchor. Elements
    /// without an anchor are skipped.
    async fn links_under(&self, selector: &str, limit: usize) -> Result<Vec<Link>, BrowserError>;

    /// Wait until the document reports `readyState == "complete"`.
    async fn wait_for_idle(&self, timeout: Duration) -> Result<(), BrowserError>;

    /// Base64 PNG of the whole page. Drivers that cannot capture beyond
    /// the viewport return the viewport only.
    async fn screenshot_base64(&self) -> Result<String, BrowserError>;

    /// End the session and release the browser.
    async fn close(&self) -> Result<(), BrowserError>;
}
