//! Protocol tests for the WebDriver client against a mock driver.

use std::time::Duration;

use assert_matches::assert_matches;
use autorun_browser::{Browser, BrowserError, WebDriverBrowser, WebDriverConfig};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

async fn driver_with_session() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": { "sessionId": "s1", "capabilities": {} }
        })))
        .mount(&server)
        .await;
    server
}

fn browser(server: &MockServer) -> WebDriverBrowser {
    WebDriverBrowser::new(WebDriverConfig::new(server.uri())).unwrap()
}

#[tokio::test]
async fn navigates_and_reads_page_state() {
    let server = driver_with_session().await;
    Mock::given(method("POST"))
        .and(path("/session/s1/url"))
        .and(body_partial_json(json!({"url": "https://example.com"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": null})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/session/s1/url"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": "https://example.com/"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/session/s1/title"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": "Example"})))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/session/s1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": null})))
        .expect(1)
        .mount(&server)
        .await;

    let session = browser(&server).open_session().await.unwrap();
    session
        .goto("https://example.com", Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(session.current_url().await.unwrap(), "https://example.com/");
    assert_eq!(session.title().await.unwrap(), "Example");
    session.close().await.unwrap();
}

#[tokio::test]
async fn missing_element_maps_to_no_such_element() {
    let server = driver_with_session().await;
    Mock::given(method("POST"))
        .and(path("/session/s1/element"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "value": { "error": "no such element", "message": "Unable to locate element" }
        })))
        .mount(&server)
        .await;

    let session = browser(&server).open_session().await.unwrap();
    let err = session.click("#submit").await.unwrap_err();
    assert_matches!(err, BrowserError::NoSuchElement(ref s) if s == "#submit");
}

#[tokio::test]
async fn wait_for_times_out_when_element_never_appears() {
    let server = driver_with_session().await;
    Mock::given(method("POST"))
        .and(path("/session/s1/element"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "value": { "error": "no such element", "message": "" }
        })))
        .mount(&server)
        .await;

    let session = browser(&server).open_session().await.unwrap();
    let err = session
        .wait_for("a h3", Duration::from_millis(300))
        .await
        .unwrap_err();
    assert_matches!(err, BrowserError::Timeout { step: "waiting for selector", .. });
}

#[tokio::test]
async fn fill_clears_then_types() {
    let server = driver_with_session().await;
    Mock::given(method("POST"))
        .and(path("/session/s1/element"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": { ELEMENT_KEY: "e1" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/session/s1/element/e1/clear"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": null})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/session/s1/element/e1/value"))
        .and(body_partial_json(json!({"text": "hello"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": null})))
        .expect(1)
        .mount(&server)
        .await;

    let session = browser(&server).open_session().await.unwrap();
    session.fill("input[name=q]", "hello").await.unwrap();
}

async fn mount_page_size(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/session/s1/execute/sync"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": { "width": 1280, "height": 4000 }
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn screenshot_captures_full_page_through_devtools() {
    let server = driver_with_session().await;
    mount_page_size(&server).await;
    Mock::given(method("POST"))
        .and(path("/session/s1/goog/cdp/execute"))
        .and(body_partial_json(json!({
            "cmd": "Page.captureScreenshot",
            "params": { "captureBeyondViewport": true, "clip": { "height": 4000.0 } },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": { "data": "RlVMTA==" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/session/s1/screenshot"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": "VklFVw=="})))
        .expect(0)
        .mount(&server)
        .await;

    let session = browser(&server).open_session().await.unwrap();
    assert_eq!(session.screenshot_base64().await.unwrap(), "RlVMTA==");
}

#[tokio::test]
async fn screenshot_falls_back_to_viewport_without_devtools() {
    let server = driver_with_session().await;
    mount_page_size(&server).await;
    Mock::given(method("POST"))
        .and(path("/session/s1/goog/cdp/execute"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "value": { "error": "unknown command", "message": "" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/session/s1/screenshot"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": "VklFVw=="})))
        .expect(1)
        .mount(&server)
        .await;

    let session = browser(&server).open_session().await.unwrap();
    assert_eq!(session.screenshot_base64().await.unwrap(), "VklFVw==");
}

#[tokio::test]
async fn session_without_id_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": {}})))
        .mount(&server)
        .await;

    let result = browser(&server).open_session().await;
    assert!(matches!(result, Err(BrowserError::Protocol(_))));
}
