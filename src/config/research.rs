// src/config/research.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{env, fs, path::Path, path::PathBuf};

pub const ENV_CONFIG_PATH: &str = "RESEARCH_CONFIG_PATH";
pub const ENV_APP_ENV: &str = "APP_ENV";

/// Languages tried, in order, when picking a caption track.
pub const DEFAULT_TRANSCRIPT_LANGUAGES: &[&str] = &[
    "en", "es", "fr", "de", "it", "pt", "ru", "zh", "hi", "uk", "cs", "sv",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchConfig {
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub transcript: TranscriptConfig,
    #[serde(default)]
    pub store: StoreConfig,
    /// Set from `APP_ENV=development`; never read from the file.
    #[serde(skip)]
    pub development: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
}

fn default_max_concurrent() -> usize {
    25
}
fn default_deadline_secs() -> u64 {
    90
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            deadline_secs: default_deadline_secs(),
        }
    }
}

impl AggregationConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_scroll_steps")]
    pub scroll_steps: u32,
    #[serde(default = "default_scroll_px")]
    pub scroll_px: u32,
    #[serde(default = "default_scroll_pause_ms")]
    pub scroll_pause_ms: u64,
    /// Upper bound on waiting for the first result elements to render.
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    /// Browser sessions allowed at once across all queries.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    /// W3C WebDriver endpoint (e.g. chromedriver). Plain HTTP fetch when absent.
    #[serde(default)]
    pub webdriver_url: Option<String>,
    #[serde(default = "default_search_url")]
    pub search_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_max_results() -> usize {
    25
}
fn default_scroll_steps() -> u32 {
    4
}
fn default_scroll_px() -> u32 {
    800
}
fn default_scroll_pause_ms() -> u64 {
    2_000
}
fn default_wait_timeout_secs() -> u64 {
    30
}
fn default_max_attempts() -> u32 {
    2
}
fn default_backoff_ms() -> u64 {
    1_000
}
fn default_max_sessions() -> usize {
    1
}
fn default_search_url() -> String {
    "https://www.youtube.com/results".to_string()
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36".to_string()
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            scroll_steps: default_scroll_steps(),
            scroll_px: default_scroll_px(),
            scroll_pause_ms: default_scroll_pause_ms(),
            wait_timeout_secs: default_wait_timeout_secs(),
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            max_sessions: default_max_sessions(),
            webdriver_url: None,
            search_url: default_search_url(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "gemini" | "openai" (case-insensitive)
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model for per-source articles.
    #[serde(default = "default_model")]
    pub model: String,
    /// Model for the final report; falls back to `model`.
    #[serde(default)]
    pub report_model: Option<String>,
    /// "ENV" means: read from GEMINI_API_KEY / OPENAI_API_KEY (by provider)
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "gemini".to_string()
}
fn default_model() -> String {
    "gemini-2.5-flash-lite".to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            report_model: None,
            api_key: default_api_key(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

impl LlmConfig {
    pub fn report_model(&self) -> &str {
        self.report_model.as_deref().unwrap_or(&self.model)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptConfig {
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    #[serde(default = "default_transcript_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
}

fn default_languages() -> Vec<String> {
    DEFAULT_TRANSCRIPT_LANGUAGES
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_transcript_timeout_secs() -> u64 {
    30
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            languages: default_languages(),
            timeout_secs: default_transcript_timeout_secs(),
            proxy: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    /// Port of the rotating gateway, used for bulk research fetches.
    #[serde(default)]
    pub rotate_port: Option<u16>,
    #[serde(default)]
    pub username: String,
    /// "ENV" means: read from PROXY_PASSWORD
    #[serde(default)]
    pub password: String,
}

impl ProxyConfig {
    pub fn url(&self, rotate: bool) -> String {
        let port = if rotate {
            self.rotate_port.unwrap_or(self.port)
        } else {
            self.port
        };
        format!("http://{}:{}", self.host, port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_dir")]
    pub dir: PathBuf,
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("cache/artifacts")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
        }
    }
}

impl ResearchConfig {
    /// Load from an explicit path. TOML or JSON, chosen by extension.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading research config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = parse_config(&data, &ext)?;
        cfg.finish()
    }

    /// Load using env var + fallbacks:
    /// 1) $RESEARCH_CONFIG_PATH
    /// 2) config/research.toml
    /// 3) config/research.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from_file(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        for candidate in ["config/research.toml", "config/research.json"] {
            let pb = PathBuf::from(candidate);
            if pb.exists() {
                return Self::load_from_file(&pb);
            }
        }
        Self::default().finish()
    }

    /// Apply environment-derived values and clamp out-of-range numbers.
    fn finish(mut self) -> Result<Self> {
        self.development = env::var(ENV_APP_ENV)
            .map(|v| v.eq_ignore_ascii_case("development"))
            .unwrap_or(false);

        self.llm.provider = self.llm.provider.trim().to_lowercase();
        if self.llm.api_key.trim().eq_ignore_ascii_case("env") {
            let var = match self.llm.provider.as_str() {
                "gemini" => "GEMINI_API_KEY",
                "openai" => "OPENAI_API_KEY",
                other => anyhow::bail!("Unsupported provider in config: {other}"),
            };
            self.llm.api_key = env::var(var).unwrap_or_else(|_| {
                tracing::warn!(var, "LLM api key env var missing; generation will be disabled");
                String::new()
            });
        }

        if let Some(proxy) = self.transcript.proxy.as_mut() {
            if proxy.password.trim().eq_ignore_ascii_case("env") {
                proxy.password = env::var("PROXY_PASSWORD")
                    .map_err(|_| anyhow!("Missing PROXY_PASSWORD env var"))?;
            }
        }

        self.sanitize();
        Ok(self)
    }

    fn sanitize(&mut self) {
        let a = &mut self.aggregation;
        a.max_concurrent = a.max_concurrent.clamp(1, 256);
        if a.deadline_secs == 0 {
            a.deadline_secs = default_deadline_secs();
        }

        let d = &mut self.discovery;
        d.max_results = d.max_results.clamp(1, 100);
        d.max_attempts = d.max_attempts.clamp(1, 5);
        d.scroll_steps = d.scroll_steps.min(20);
        d.max_sessions = d.max_sessions.clamp(1, 16);

        if self.transcript.languages.is_empty() {
            self.transcript.languages = default_languages();
        }
    }

    /// Proxy routing is skipped in development.
    pub fn transcript_proxy(&self) -> Option<&ProxyConfig> {
        if self.development {
            None
        } else {
            self.transcript.proxy.as_ref()
        }
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<ResearchConfig> {
    if hint_ext == "toml" {
        return toml::from_str(s).context("parsing research config toml");
    }
    if let Ok(cfg) = serde_json::from_str(s) {
        return Ok(cfg);
    }
    toml::from_str(s).map_err(|_| anyhow!("unsupported research config format"))
}
