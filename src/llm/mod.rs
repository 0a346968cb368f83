//! Text generation: provider abstraction + concrete providers + a mock.
//!
//! A generator returns `None` when it produced nothing usable (HTTP error, empty
//! candidate list, blank text). Callers decide what "nothing" means for them.

pub mod gemini;
pub mod openai;

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::LlmConfig;

pub use gemini::GeminiGenerator;
pub use openai::OpenAiGenerator;

/// Trait object used by the article cache and the report synthesizer.
pub trait TextGenerator: Send + Sync {
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynTextGenerator = Arc<dyn TextGenerator>;

/// Factory: build a generator for `model` according to config and environment.
///
/// * If `AI_TEST_MODE=mock`, returns a deterministic mock.
/// * Else builds the configured provider; unknown providers yield a disabled client.
pub fn build_generator(config: &LlmConfig, model: &str) -> DynTextGenerator {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Arc::new(MockGenerator::fixed(
            "# Mock write-up\n\n- A point worth making [sec:0]",
        ));
    }

    let timeout = Duration::from_secs(config.timeout_secs.max(1));
    match config.provider.as_str() {
        "gemini" => Arc::new(GeminiGenerator::new(&config.api_key, model, timeout)),
        "openai" => Arc::new(OpenAiGenerator::new(&config.api_key, model, timeout)),
        other => {
            tracing::warn!(provider = other, "unknown LLM provider; generation disabled");
            Arc::new(DisabledGenerator)
        }
    }
}

pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(concat!("video-research/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(10))
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default reqwest client");
            reqwest::Client::new()
        })
}

/// Trim, drop a fence that wraps the whole reply, and map blank output to `None`.
///
/// A reply that merely starts with a code block keeps its fences. Only an
/// untagged or `markdown`/`md` fence closing at the very end counts as a wrapper.
pub fn clean_output(raw: &str) -> Option<String> {
    let mut text = raw.trim();
    if let Some(body) = fenced_body(text) {
        text = body.trim();
    }
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn fenced_body(text: &str) -> Option<&str> {
    let (opening, rest) = text.strip_prefix("```")?.split_once('\n')?;
    let body = rest.trim_end().strip_suffix("```")?;
    match opening.trim().to_ascii_lowercase().as_str() {
        "markdown" | "md" => Some(body),
        // an inner fence means the first one closes early: not a wrapper
        "" if !body.lines().any(|l| l.trim_start().starts_with("```")) => Some(body),
        _ => None,
    }
}

/// Returns `None` always; used when generation is disabled.
pub struct DisabledGenerator;

impl TextGenerator for DisabledGenerator {
    fn generate<'a>(
        &'a self,
        _prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>> {
        Box::pin(async { None })
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

type Responder = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Scriptable generator for tests/local runs. Counts every call.
pub struct MockGenerator {
    responder: Box<Responder>,
    calls: AtomicUsize,
}

impl MockGenerator {
    pub fn new(responder: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn fixed(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Some(text.clone()))
    }

    pub fn silent() -> Self {
        Self::new(|_| None)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TextGenerator for MockGenerator {
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let out = (self.responder)(prompt);
        Box::pin(async move { out })
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_output_strips_fences_and_blank() {
        assert_eq!(clean_output("  \n "), None);
        assert_eq!(clean_output("# Title\nbody\n").as_deref(), Some("# Title\nbody"));
        assert_eq!(
            clean_output("```markdown\n# Title\nbody\n```").as_deref(),
            Some("# Title\nbody")
        );
        assert_eq!(clean_output("```\n```"), None);
        assert_eq!(clean_output("```\n# Bare\n```").as_deref(), Some("# Bare"));
    }

    #[test]
    fn clean_output_keeps_leading_code_blocks() {
        let md = "```rust\nfn main() {}\n```\n\nExplanation [sec:3]";
        assert_eq!(clean_output(md).as_deref(), Some(md));

        let tagged = "```rust\nfn main() {}\n```";
        assert_eq!(clean_output(tagged).as_deref(), Some(tagged));

        let two_blocks = "```\nlet a = 1;\n```\ntext\n```\nlet b = 2;\n```";
        assert_eq!(clean_output(two_blocks).as_deref(), Some(two_blocks));

        let wrapped = "```markdown\n# T\n```rust\nfn x() {}\n```\nend\n```";
        assert_eq!(
            clean_output(wrapped).as_deref(),
            Some("# T\n```rust\nfn x() {}\n```\nend")
        );
    }

    #[tokio::test]
    async fn mock_counts_calls() {
        let m = MockGenerator::new(|p| Some(format!("echo: {p}")));
        assert_eq!(m.generate("hi").await.as_deref(), Some("echo: hi"));
        assert!(MockGenerator::silent().generate("x").await.is_none());
        assert_eq!(m.calls(), 1);
    }

    #[tokio::test]
    async fn disabled_generator_returns_none() {
        assert!(DisabledGenerator.generate("anything").await.is_none());
    }
}
