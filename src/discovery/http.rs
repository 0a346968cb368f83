// src/discovery/http.rs
//! Plain HTTP page load, no script execution. Results come from the
//! server-rendered `ytInitialData` blob.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::PageRenderer;
use crate::config::DiscoveryConfig;

pub struct HttpPageRenderer {
    http: reqwest::Client,
}

impl HttpPageRenderer {
    pub fn new(cfg: &DiscoveryConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(cfg.wait_timeout_secs.max(1)))
            .build()
            .context("building discovery http client")?;
        Ok(Self { http })
    }
}

#[async_trait]
impl PageRenderer for HttpPageRenderer {
    async fn render(&self, url: &str) -> Result<String> {
        self.http
            .get(url)
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await
            .context("results page request")?
            .error_for_status()
            .context("results page status")?
            .text()
            .await
            .context("results page body")
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
