// src/discovery/webdriver.rs
//! Minimal W3C WebDriver client (chromedriver, geckodriver, selenium grid).
//! Only the handful of commands discovery needs.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use super::PageRenderer;
use crate::config::DiscoveryConfig;

const RESULT_SELECTOR: &str = "ytd-video-renderer";
const POLL_EVERY: Duration = Duration::from_millis(500);

pub struct WebDriverRenderer {
    http: reqwest::Client,
    base: String,
    user_agent: String,
    wait_timeout: Duration,
    scroll_steps: u32,
    scroll_px: u32,
    scroll_pause: Duration,
}

impl WebDriverRenderer {
    pub fn new(endpoint: &str, cfg: &DiscoveryConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(cfg.wait_timeout_secs + 30))
            .build()
            .context("building webdriver client")?;
        Ok(Self {
            http,
            base: endpoint.trim_end_matches('/').to_string(),
            user_agent: cfg.user_agent.clone(),
            wait_timeout: Duration::from_secs(cfg.wait_timeout_secs),
            scroll_steps: cfg.scroll_steps,
            scroll_px: cfg.scroll_px,
            scroll_pause: Duration::from_millis(cfg.scroll_pause_ms),
        })
    }

    fn capabilities(&self) -> Value {
        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": {
                        "args": [
                            "--headless=new",
                            "--no-sandbox",
                            "--disable-dev-shm-usage",
                            "--disable-gpu",
                            "--window-size=1920,1080",
                            format!("--user-agent={}", self.user_agent),
                        ]
                    }
                }
            }
        })
    }

    /// Send a command and unwrap the `value` member of the reply.
    async fn command(&self, method: reqwest::Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = format!("{}{}", self.base, path);
        let mut req = self.http.request(method, &url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req.send().await.with_context(|| format!("webdriver {path}"))?;
        let status = resp.status();
        let mut reply: Value = resp
            .json()
            .await
            .with_context(|| format!("webdriver {path}: reading reply"))?;
        let value = reply.get_mut("value").map(Value::take).unwrap_or(Value::Null);
        if !status.is_success() {
            let error = value["error"].as_str().unwrap_or("unknown error");
            let message = value["message"].as_str().unwrap_or("");
            bail!("webdriver {path}: {status} {error}: {message}");
        }
        Ok(value)
    }

    async fn new_session(&self) -> Result<String> {
        let value = self
            .command(reqwest::Method::POST, "/session", Some(self.capabilities()))
            .await?;
        value["sessionId"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("webdriver: session reply without sessionId"))
    }

    async fn wait_for_results(&self, sid: &str) -> Result<()> {
        let deadline = tokio::time::Instant::now() + self.wait_timeout;
        let query = json!({ "using": "css selector", "value": RESULT_SELECTOR });
        loop {
            let found = self
                .command(
                    reqwest::Method::POST,
                    &format!("/session/{sid}/elements"),
                    Some(query.clone()),
                )
                .await?;
            if found.as_array().is_some_and(|a| !a.is_empty()) {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                bail!("no {RESULT_SELECTOR} within {:?}", self.wait_timeout);
            }
            tokio::time::sleep(POLL_EVERY).await;
        }
    }

    async fn drive(&self, sid: &str, url: &str) -> Result<String> {
        self.command(
            reqwest::Method::POST,
            &format!("/session/{sid}/url"),
            Some(json!({ "url": url })),
        )
        .await?;
        self.wait_for_results(sid).await?;

        for _ in 0..self.scroll_steps {
            self.command(
                reqwest::Method::POST,
                &format!("/session/{sid}/execute/sync"),
                Some(json!({
                    "script": "window.scrollBy(0, arguments[0]);",
                    "args": [self.scroll_px],
                })),
            )
            .await?;
            tokio::time::sleep(self.scroll_pause).await;
        }

        let source = self
            .command(reqwest::Method::GET, &format!("/session/{sid}/source"), None)
            .await?;
        source
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("webdriver: page source is not a string"))
    }
}

/// Closes a session if `render` is dropped before it gets to do so itself
/// (deadline, aborted task). The delete then runs as a detached task.
struct SessionGuard {
    http: reqwest::Client,
    url: String,
    armed: bool,
}

impl SessionGuard {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(url = %self.url, "webdriver session leaked: no runtime to close it");
            return;
        };
        let http = self.http.clone();
        let url = std::mem::take(&mut self.url);
        handle.spawn(async move {
            if let Err(e) = http.delete(&url).send().await {
                tracing::warn!(error = %e, "webdriver session not closed after cancellation");
            }
        });
    }
}

#[async_trait]
impl PageRenderer for WebDriverRenderer {
    async fn render(&self, url: &str) -> Result<String> {
        let sid = self.new_session().await?;
        let guard = SessionGuard {
            http: self.http.clone(),
            url: format!("{}/session/{sid}", self.base),
            armed: true,
        };
        let result = self.drive(&sid, url).await;
        guard.disarm();
        // the session is closed whatever happened above
        if let Err(e) = self
            .command(reqwest::Method::DELETE, &format!("/session/{sid}"), None)
            .await
        {
            tracing::warn!(error = %e, "webdriver session not closed");
        }
        result
    }

    fn name(&self) -> &'static str {
        "webdriver"
    }
}
