//! W3C WebDriver client (chromedriver, Selenium) over [`reqwest`].
//!
//! Only the endpoints the tasks use are wrapped. Responses follow the
//! W3C shape `{"value": ...}`; errors carry `value.error` and
//! `value.message`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};

use crate::{Browser, BrowserError, BrowserSession, Link};

/// Key under which W3C drivers return element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// WebDriver key code for Enter.
const ENTER_KEY: &str = "\u{E007}";

/// Interval between element / readiness polls.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Script returning `{title, href}` for an element's closest anchor.
const LINK_SCRIPT: &str = "const el = arguments[0]; \
    const a = el.closest('a'); \
    return a ? { title: (el.innerText || '').trim(), href: a.href } : null;";

/// Script returning the document's scrollable size.
const PAGE_SIZE_SCRIPT: &str = "const d = document.documentElement; \
    return { width: d.scrollWidth, height: d.scrollHeight };";

#[derive(Debug, Clone)]
pub struct WebDriverConfig {
    /// Driver endpoint, e.g. `http://localhost:4444`.
    pub endpoint: String,
    /// Extra Chrome arguments. Headless and no-sandbox are always added.
    pub chrome_args: Vec<String>,
    /// HTTP timeout for any single driver command.
    pub command_timeout: Duration,
}

impl WebDriverConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            chrome_args: Vec::new(),
            command_timeout: Duration::from_secs(60),
        }
    }
}

pub struct WebDriverBrowser {
    client: reqwest::Client,
    config: WebDriverConfig,
}

impl WebDriverBrowser {
    pub fn new(config: WebDriverConfig) -> Result<Self, BrowserError> {
        let client = reqwest::Client::builder()
            .timeout(config.command_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    fn capabilities(&self) -> Value {
        let mut args = vec!["--headless=new".to_string(), "--no-sandbox".to_string()];
        args.extend(self.config.chrome_args.iter().cloned());
        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args },
                }
            }
        })
    }
}

#[async_trait]
impl Browser for WebDriverBrowser {
    async fn open_session(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let endpoint = self.config.endpoint.trim_end_matches('/');
        let response = self
            .client
            .post(format!("{endpoint}/session"))
            .json(&self.capabilities())
            .send()
            .await?;
        let body = parse_response(response).await?;

        // W3C drivers nest the id under `value`; older Selenium puts it at the top.
        let session_id = body["value"]["sessionId"]
            .as_str()
            .or_else(|| body["sessionId"].as_str())
            .ok_or_else(|| BrowserError::Protocol("session response has no sessionId".into()))?
            .to_string();

        tracing::debug!(session_id = %session_id, "Opened browser session");

        Ok(Box::new(WebDriverSession {
            client: self.client.clone(),
            base: format!("{endpoint}/session/{session_id}"),
            session_id,
        }))
    }
}

pub struct WebDriverSession {
    client: reqwest::Client,
    base: String,
    session_id: String,
}

impl WebDriverSession {
    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, BrowserError> {
        let mut request = self
            .client
            .request(method.clone(), format!("{}{}", self.base, path));
        if let Some(body) = body {
            request = request.json(&body);
        } else if method == Method::POST {
            request = request.json(&json!({}));
        }
        let response = request.send().await?;
        let mut body = parse_response(response).await?;
        Ok(body.get_mut("value").map(Value::take).unwrap_or(Value::Null))
    }

    async fn find(&self, selector: &str) -> Result<String, BrowserError> {
        let value = self
            .command(
                Method::POST,
                "/element",
                Some(json!({ "using": "css selector", "value": selector })),
            )
            .await
            .map_err(|e| match e {
                BrowserError::NoSuchElement(_) => BrowserError::NoSuchElement(selector.into()),
                other => other,
            })?;
        element_id(&value)
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<String>, BrowserError> {
        let value = self
            .command(
                Method::POST,
                "/elements",
                Some(json!({ "using": "css selector", "value": selector })),
            )
            .await?;
        let items = value
            .as_array()
            .ok_or_else(|| BrowserError::Protocol("elements response is not an array".into()))?;
        items.iter().map(element_id).collect()
    }

    async fn send_keys(&self, element: &str, text: &str) -> Result<(), BrowserError> {
        self.command(
            Method::POST,
            &format!("/element/{element}/value"),
            Some(json!({ "text": text })),
        )
        .await?;
        Ok(())
    }

    async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value, BrowserError> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": args })),
        )
        .await
    }

    /// Full-page capture through chromedriver's DevTools passthrough.
    async fn full_page_screenshot(&self) -> Result<String, BrowserError> {
        let size = self.execute(PAGE_SIZE_SCRIPT, Vec::new()).await?;
        let width = size["width"].as_f64().unwrap_or_default();
        let height = size["height"].as_f64().unwrap_or_default();
        if width <= 0.0 || height <= 0.0 {
            return Err(BrowserError::Protocol(format!("unusable page size {size}")));
        }

        let value = self
            .command(
                Method::POST,
                "/goog/cdp/execute",
                Some(json!({
                    "cmd": "Page.captureScreenshot",
                    "params": {
                        "format": "png",
                        "captureBeyondViewport": true,
                        "clip": { "x": 0, "y": 0, "width": width, "height": height, "scale": 1 },
                    },
                })),
            )
            .await?;
        value["data"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| BrowserError::Protocol("screenshot response has no data".into()))
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        let navigate = self
            .client
            .post(format!("{}/url", self.base))
            .timeout(timeout)
            .json(&json!({ "url": url }))
            .send();

        let response = tokio::time::timeout(timeout, navigate)
            .await
            .map_err(|_| BrowserError::Timeout {
                step: "navigation",
                secs: timeout.as_secs(),
            })??;
        parse_response(response).await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        let value = self.command(Method::GET, "/url", None).await?;
        string_value(value, "url")
    }

    async fn title(&self) -> Result<String, BrowserError> {
        let value = self.command(Method::GET, "/title", None).await?;
        string_value(value, "title")
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.find(selector).await {
                Ok(_) => return Ok(()),
                Err(BrowserError::NoSuchElement(_)) if Instant::now() < deadline => {
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
                Err(BrowserError::NoSuchElement(_)) => {
                    return Err(BrowserError::Timeout {
                        step: "waiting for selector",
                        secs: timeout.as_secs(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), BrowserError> {
        let element = self.find(selector).await?;
        self.command(Method::POST, &format!("/element/{element}/clear"), None)
            .await?;
        self.send_keys(&element, value).await
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        let element = self.find(selector).await?;
        self.command(Method::POST, &format!("/element/{element}/click"), None)
            .await?;
        Ok(())
    }

    async fn press_enter(&self, selector: &str) -> Result<(), BrowserError> {
        let element = self.find(selector).await?;
        self.send_keys(&element, ENTER_KEY).await
    }

    async fn links_under(&self, selector: &str, limit: usize) -> Result<Vec<Link>, BrowserError> {
        let elements = self.find_all(selector).await?;
        let mut links = Vec::new();
        for element in elements.into_iter().take(limit) {
            let reference = json!({ ELEMENT_KEY: element });
            let value = match self.execute(LINK_SCRIPT, vec![reference]).await {
                Ok(v) => v,
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping unreadable result element");
                    continue;
                }
            };
            let title = value["title"].as_str().unwrap_or_default();
            let url = value["href"].as_str().unwrap_or_default();
            if !title.is_empty() && !url.is_empty() {
                links.push(Link {
                    title: title.to_string(),
                    url: url.to_string(),
                });
            }
        }
        Ok(links)
    }

    async fn wait_for_idle(&self, timeout: Duration) -> Result<(), BrowserError> {
        let deadline = Instant::now() + timeout;
        loop {
            let state = self.execute("return document.readyState;", Vec::new()).await?;
            if state.as_str() == Some("complete") {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout {
                    step: "waiting for page load",
                    secs: timeout.as_secs(),
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn screenshot_base64(&self) -> Result<String, BrowserError> {
        match self.full_page_screenshot().await {
            Ok(data) => return Ok(data),
            Err(e) => tracing::debug!(error = %e, "Full-page capture unavailable, using viewport"),
        }
        let value = self.command(Method::GET, "/screenshot", None).await?;
        string_value(value, "screenshot")
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.command(Method::DELETE, "", None).await?;
        tracing::debug!(session_id = %self.session_id, "Closed browser session");
        Ok(())
    }
}

/// Decode a driver response, mapping W3C error bodies to [`BrowserError`].
async fn parse_response(response: reqwest::Response) -> Result<Value, BrowserError> {
    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);
    if status.is_success() {
        return Ok(body);
    }

    let error = body["value"]["error"].as_str().unwrap_or("unknown error");
    let message = body["value"]["message"].as_str().unwrap_or_default();
    if error == "no such element" {
        return Err(BrowserError::NoSuchElement(message.to_string()));
    }
    Err(BrowserError::Protocol(format!(
        "HTTP {}: {error}: {message}",
        status.as_u16()
    )))
}

fn element_id(value: &Value) -> Result<String, BrowserError> {
    value[ELEMENT_KEY]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| BrowserError::Protocol("response is not an element reference".into()))
}

fn string_value(value: Value, what: &str) -> Result<String, BrowserError> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(BrowserError::Protocol(format!(
            "expected {what} string, got {other}"
        ))),
    }
}
