// src/bootstrap.rs
//! Wires concrete adapters from `ResearchConfig` into a ready-to-serve runtime.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::aggregate::BoundedAggregator;
use crate::article::{ArticleCache, ArticleKind};
use crate::config::ResearchConfig;
use crate::discovery::{DiscoveryService, HttpPageRenderer, PageRenderer, WebDriverRenderer};
use crate::engine::{ResearchEngine, SharedEngine};
use crate::llm::build_generator;
use crate::store::{DynArtifactStore, FsArtifactStore};
use crate::transcript::YoutubeTranscriptSource;

pub struct ResearchRuntime {
    pub cfg: ResearchConfig,
    pub store: DynArtifactStore,
    pub engine: SharedEngine,
    /// Single-video path; transcripts go through the sticky proxy port.
    pub articles: Arc<ArticleCache>,
    /// Single-video TLDRs; same transcript path as `articles`.
    pub tldrs: Arc<ArticleCache>,
}

impl ResearchRuntime {
    pub fn from_config(cfg: ResearchConfig) -> Result<Self> {
        // Safe diagnostics: provider, models and key length only
        info!(
            provider = %cfg.llm.provider,
            model = %cfg.llm.model,
            report_model = %cfg.llm.report_model(),
            key_len = cfg.llm.api_key.len(),
            proxy = cfg.transcript_proxy().is_some(),
            webdriver = cfg.discovery.webdriver_url.is_some(),
            development = cfg.development,
            "research runtime config"
        );

        let store: DynArtifactStore = Arc::new(FsArtifactStore::new(&cfg.store.dir));
        let article_llm = build_generator(&cfg.llm, &cfg.llm.model);
        let report_llm = build_generator(&cfg.llm, cfg.llm.report_model());

        let bulk_transcripts = Arc::new(YoutubeTranscriptSource::new(
            &cfg.transcript,
            cfg.transcript_proxy(),
            true,
        )?);
        let single_transcripts = Arc::new(YoutubeTranscriptSource::new(
            &cfg.transcript,
            cfg.transcript_proxy(),
            false,
        )?);

        let research_cache = Arc::new(ArticleCache::new(
            store.clone(),
            bulk_transcripts,
            article_llm.clone(),
        ));
        let articles = Arc::new(ArticleCache::new(
            store.clone(),
            single_transcripts.clone(),
            article_llm.clone(),
        ));
        let tldrs = Arc::new(
            ArticleCache::new(store.clone(), single_transcripts, article_llm)
                .with_kind(ArticleKind::Tldr),
        );

        let renderer: Arc<dyn PageRenderer> = match cfg.discovery.webdriver_url.as_deref() {
            Some(endpoint) => Arc::new(WebDriverRenderer::new(endpoint, &cfg.discovery)?),
            None => Arc::new(HttpPageRenderer::new(&cfg.discovery)?),
        };
        let discovery =
            Arc::new(DiscoveryService::new(renderer, &cfg.discovery).with_snapshots(store.clone()));

        let engine = Arc::new(ResearchEngine::new(
            discovery,
            BoundedAggregator::from_config(research_cache, &cfg.aggregation),
            crate::synth::ReportSynthesizer::new(report_llm),
        ));

        Ok(Self {
            cfg,
            store,
            engine,
            articles,
            tldrs,
        })
    }

    pub fn load_default() -> Result<Self> {
        Self::from_config(ResearchConfig::load_default()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_from_defaults_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = ResearchConfig::default();
        cfg.store.dir = dir.path().to_path_buf();
        cfg.discovery.webdriver_url = Some("http://127.0.0.1:9515".into());
        let rt = ResearchRuntime::from_config(cfg).unwrap();
        assert_eq!(rt.cfg.aggregation.max_concurrent, 25);
        assert_eq!(rt.articles.kind(), ArticleKind::WriteUp);
        assert_eq!(rt.tldrs.kind(), ArticleKind::Tldr);
    }
}
