// src/llm/gemini.rs
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{clean_output, http_client, TextGenerator};

const ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Google Gemini provider (generateContent API). Requires an api key.
pub struct GeminiGenerator {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiGenerator {
    pub fn new(api_key: &str, model: &str, timeout: Duration) -> Self {
        Self {
            http: http_client(timeout),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}
#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}
#[derive(Serialize)]
struct Req<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Deserialize)]
struct Resp {
    #[serde(default)]
    candidates: Vec<Candidate>,
}
#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}
#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<RespPart>,
}
#[derive(Deserialize)]
struct RespPart {
    #[serde(default)]
    text: String,
}

fn first_candidate_text(resp: Resp) -> String {
    resp.candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().map(|p| p.text).collect::<String>())
        .unwrap_or_default()
}

impl TextGenerator for GeminiGenerator {
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>> {
        Box::pin(async move {
            if self.api_key.is_empty() {
                return None;
            }

            let req = Req {
                contents: vec![Content {
                    parts: vec![Part { text: prompt }],
                }],
            };
            let url = format!("{ENDPOINT}/{}:generateContent", self.model);

            let resp = match self
                .http
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&req)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(error = %e, model = %self.model, "gemini request failed");
                    return None;
                }
            };

            if !resp.status().is_success() {
                tracing::warn!(status = %resp.status(), model = %self.model, "gemini returned error status");
                return None;
            }
            let body: Resp = resp.json().await.ok()?;
            clean_output(&first_candidate_text(body))
        })
    }

    fn provider_name(&self) -> &'static str {
        "gemini"
    }
}
