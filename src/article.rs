// src/article.rs
//! Per-source article cache: stored article, or transcript -> write-up -> store.
//!
//! Two derivations share the flow: the full write-up used by research reports
//! and `/generate_tutorial`, and the short TLDR behind `/generate_tldr`. Each
//! has its own key space.

use std::time::Instant;

use metrics::counter;

use crate::aggregate::ArticleSource;
use crate::citations::{expand_placeholders, heading_or_first_line};
use crate::error::ResearchError;
use crate::llm::DynTextGenerator;
use crate::metrics as m;
use crate::store::{DynArtifactStore, CONTENT_TYPE_JSON};
use crate::transcript::DynTranscriptSource;
use crate::types::{watch_url, Article, SourceRef, TranscriptSegment};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleKind {
    /// Full sectioned write-up.
    WriteUp,
    /// Title, one-line overview, a handful of bullets.
    Tldr,
}

impl ArticleKind {
    pub fn key(self, source_id: &str) -> String {
        match self {
            Self::WriteUp => cache_key(source_id),
            Self::Tldr => format!("tldr:{source_id}"),
        }
    }

    pub fn prompt(self, segments: &[TranscriptSegment], source_url: &str) -> String {
        match self {
            Self::WriteUp => build_article_prompt(segments, source_url),
            Self::Tldr => build_tldr_prompt(segments, source_url),
        }
    }

    /// Title used when neither discovery nor the generated text provides one.
    pub fn fallback_title(self, source_id: &str) -> String {
        match self {
            Self::WriteUp => format!("YouTube video {source_id}"),
            Self::Tldr => format!("TLDR: YouTube Video {source_id}"),
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::WriteUp => "write_up",
            Self::Tldr => "tldr",
        }
    }
}

pub fn cache_key(source_id: &str) -> String {
    format!("article:{source_id}")
}

const TRANSCRIPT_FORMAT: &str = "The transcript is a JSON list of {\"text\", \"start\"} objects; \
     `start` is the offset in whole seconds where that text begins.\n\n";

/// Write-up prompt for one transcript. Segments go in as a JSON list so the
/// model sees every start offset.
pub fn build_article_prompt(segments: &[TranscriptSegment], source_url: &str) -> String {
    let transcript = serde_json::to_string(segments).unwrap_or_default();

    let mut p = String::with_capacity(2048 + segments.len() * 64);
    p.push_str("# Write-up from a video transcript\n\n");
    p.push_str("## Goal\n");
    p.push_str(
        "Write a detailed, well structured article covering everything said in the video below. \
         Long transcripts get the same level of detail from start to finish.\n",
    );
    p.push_str(TRANSCRIPT_FORMAT);
    p.push_str("## Instructions\n");
    p.push_str("1. Open with a short introduction to the main topic and why it matters.\n");
    p.push_str("2. Split the body into sections with descriptive headings. End each section heading with its start offset written as [sec:N], e.g. [sec:100].\n");
    p.push_str("3. Explain each point in bullet points or numbered lists. End each point with the single offset where it starts, as [sec:N]. Never write time ranges or several offsets for one point.\n");
    p.push_str("4. Close with the key takeaways.\n");
    p.push_str("5. The top-level title carries no offset.\n\n");
    p.push_str(&format!("## Source\n{source_url}\n\n"));
    p.push_str(&format!("## Transcript\n{transcript}\n\n"));
    p.push_str("## Output\nMarkdown only: headings, lists and code blocks where useful.\n");
    p
}

/// Short-summary prompt: title, overview, unique bullets with one offset each.
pub fn build_tldr_prompt(segments: &[TranscriptSegment], source_url: &str) -> String {
    let transcript = serde_json::to_string(segments).unwrap_or_default();

    let mut p = String::with_capacity(1536 + segments.len() * 64);
    p.push_str("# TLDR from a video transcript\n\n");
    p.push_str("## Goal\n");
    p.push_str(
        "Write a concise TLDR of the whole video below, drawing on the entire transcript \
         rather than its opening minutes.\n",
    );
    p.push_str(TRANSCRIPT_FORMAT);
    p.push_str("## Instructions\n");
    p.push_str("1. Start with a `# ` title saying what the video is about, then a one-sentence overview.\n");
    p.push_str("2. Follow with 3 to 5 bullet points (more only if the video has more key takeaways). Each starts with its topic in **bold** and is one or two sentences long.\n");
    p.push_str("3. Bullets must not overlap: a topic revisited several times gets one bullet. Favour points the speaker stresses or returns to, and say why they matter.\n");
    p.push_str("4. End every bullet with the single offset where the point starts, as [sec:N], e.g. [sec:100].\n");
    p.push_str("5. Finish with a one or two sentence conclusion. Stay under 200 words in total.\n\n");
    p.push_str(&format!("## Source\n{source_url}\n\n"));
    p.push_str(&format!("## Transcript\n{transcript}\n\n"));
    p.push_str("## Output\nMarkdown only.\n");
    p
}

/// Decode a stored entry. Anything that looks like JSON must decode as an
/// `Article`; plain markdown from older writers is taken as the content.
fn decode_entry(bytes: &[u8], source: &SourceRef) -> Option<Article> {
    if let Ok(article) = serde_json::from_slice::<Article>(bytes) {
        return Some(article);
    }
    let text = std::str::from_utf8(bytes).ok()?.trim();
    if text.is_empty() || text.starts_with('{') {
        return None;
    }
    Some(Article {
        source_id: source.id.clone(),
        title: source.title.clone(),
        content: text.to_string(),
    })
}

pub struct ArticleCache {
    store: DynArtifactStore,
    transcripts: DynTranscriptSource,
    generator: DynTextGenerator,
    kind: ArticleKind,
}

impl ArticleCache {
    pub fn new(
        store: DynArtifactStore,
        transcripts: DynTranscriptSource,
        generator: DynTextGenerator,
    ) -> Self {
        Self {
            store,
            transcripts,
            generator,
            kind: ArticleKind::WriteUp,
        }
    }

    /// Same cache flow for another derivation, e.g. `ArticleKind::Tldr`.
    pub fn with_kind(mut self, kind: ArticleKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn kind(&self) -> ArticleKind {
        self.kind
    }

    async fn lookup(&self, source: &SourceRef) -> Option<Article> {
        let key = self.kind.key(&source.id);
        match self.store.get(&key).await {
            Ok(Some(bytes)) => {
                let article = decode_entry(&bytes, source);
                if article.is_none() {
                    tracing::warn!(key, "undecodable article entry; regenerating");
                }
                article
            }
            Ok(None) => None,
            Err(e) => {
                // treated as a miss
                tracing::warn!(key, error = %e, "article lookup failed");
                None
            }
        }
    }

    async fn derive(&self, source: &SourceRef) -> Result<Article, ResearchError> {
        let segments = self
            .transcripts
            .fetch(&source.id)
            .await
            .map_err(|e| ResearchError::unavailable(&source.id, format!("transcript: {e:#}")))?;

        let prompt = self.kind.prompt(&segments, &watch_url(&source.id));
        let text = self
            .generator
            .generate(&prompt)
            .await
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ResearchError::unavailable(&source.id, "generator returned no text"))?;

        let content = expand_placeholders(&text, &source.id);
        let title = if source.title.trim().is_empty() {
            heading_or_first_line(&content)
                .unwrap_or_else(|| self.kind.fallback_title(&source.id))
        } else {
            source.title.clone()
        };
        Ok(Article {
            source_id: source.id.clone(),
            title,
            content,
        })
    }

    async fn persist(&self, article: &Article) {
        let key = self.kind.key(&article.source_id);
        let bytes = match serde_json::to_vec(article) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(key, error = %e, "article not serializable");
                return;
            }
        };
        if let Err(e) = self.store.put(&key, bytes, CONTENT_TYPE_JSON).await {
            tracing::warn!(key, error = %e, "article not stored; returning it anyway");
        }
    }

    /// Stored article if present, otherwise derive one and store it.
    pub async fn get_or_create(&self, source: &SourceRef) -> Result<Article, ResearchError> {
        if let Some(article) = self.lookup(source).await {
            counter!(m::CACHE_HITS).increment(1);
            tracing::debug!(source_id = %source.id, "article cache hit");
            return Ok(article);
        }
        counter!(m::CACHE_MISSES).increment(1);

        let t0 = Instant::now();
        let article = self.derive(source).await?;
        self.persist(&article).await;
        tracing::info!(
            source_id = %source.id,
            kind = self.kind.label(),
            provider = self.generator.provider_name(),
            chars = article.content.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "article derived"
        );
        Ok(article)
    }
}

#[async_trait::async_trait]
impl ArticleSource for ArticleCache {
    async fn get_or_create(&self, source: &SourceRef) -> Result<Article, ResearchError> {
        ArticleCache::get_or_create(self, source).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockGenerator;
    use crate::store::{ArtifactStore, MemoryArtifactStore};
    use crate::transcript::StaticTranscripts;
    use std::sync::Arc;

    const ID: &str = "dQw4w9WgXcQ";

    fn source() -> SourceRef {
        SourceRef::from_url(&watch_url(ID), "Never gonna").unwrap()
    }

    fn transcripts() -> Arc<StaticTranscripts> {
        Arc::new(StaticTranscripts::new().with(
            ID,
            vec![
                TranscriptSegment::from_offset("intro", 0.4),
                TranscriptSegment::from_offset("chorus", 125.9),
            ],
        ))
    }

    #[test]
    fn prompt_carries_offsets_and_url() {
        let segs = vec![TranscriptSegment::from_offset("hello", 100.0)];
        let p = build_article_prompt(&segs, &watch_url(ID));
        assert!(p.contains(r#"[{"text":"hello","start":100}]"#));
        assert!(p.contains("https://youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(p.contains("[sec:N]"));
    }

    #[tokio::test]
    async fn second_call_is_served_from_store() {
        let store = Arc::new(MemoryArtifactStore::new());
        let llm = Arc::new(MockGenerator::fixed("# Song\n\n## Chorus [sec:125]\n- it repeats [sec:7]"));
        let cache = ArticleCache::new(store.clone(), transcripts(), llm.clone());

        let first = cache.get_or_create(&source()).await.unwrap();
        let second = cache.get_or_create(&source()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(llm.calls(), 1);
        assert!(first.content.contains("## Chorus [2m5s](https://youtu.be/dQw4w9WgXcQ?t=125)"));
        assert_eq!(first.title, "Never gonna");
        assert_eq!(
            store.content_type(&cache_key(ID)).as_deref(),
            Some(CONTENT_TYPE_JSON)
        );
    }

    #[tokio::test]
    async fn missing_transcript_is_source_unavailable() {
        let llm = Arc::new(MockGenerator::fixed("unused"));
        let cache = ArticleCache::new(
            Arc::new(MemoryArtifactStore::new()),
            Arc::new(StaticTranscripts::new()),
            llm.clone(),
        );
        let err = cache.get_or_create(&source()).await.unwrap_err();
        assert!(matches!(err, ResearchError::SourceUnavailable { ref source_id, .. } if source_id == ID));
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn blank_generation_is_source_unavailable_and_not_stored() {
        let store = Arc::new(MemoryArtifactStore::new());
        let cache = ArticleCache::new(
            store.clone(),
            transcripts(),
            Arc::new(MockGenerator::new(|_| Some("   ".into()))),
        );
        assert!(cache.get_or_create(&source()).await.is_err());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn legacy_markdown_entry_is_a_hit() {
        let store = Arc::new(MemoryArtifactStore::new());
        store
            .put(&cache_key(ID), b"# Old write-up\n\nbody".to_vec(), "text/markdown")
            .await
            .unwrap();
        let llm = Arc::new(MockGenerator::silent());
        let cache = ArticleCache::new(store, transcripts(), llm.clone());

        let article = cache.get_or_create(&source()).await.unwrap();
        assert_eq!(article.content, "# Old write-up\n\nbody");
        assert_eq!(article.title, "Never gonna");
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn untitled_source_takes_heading() {
        let cache = ArticleCache::new(
            Arc::new(MemoryArtifactStore::new()),
            transcripts(),
            Arc::new(MockGenerator::fixed("# Derived title\n\ntext")),
        );
        let bare = SourceRef::from_url(&watch_url(ID), "").unwrap();
        assert_eq!(cache.get_or_create(&bare).await.unwrap().title, "Derived title");
    }

    #[tokio::test]
    async fn truncated_json_entry_is_regenerated() {
        let store = Arc::new(MemoryArtifactStore::new());
        let partial = br##"{"source_id":"dQw4w9WgXcQ","title":"t","content":"# Wri"##;
        store
            .put(&cache_key(ID), partial.to_vec(), CONTENT_TYPE_JSON)
            .await
            .unwrap();
        let llm = Arc::new(MockGenerator::fixed("# Fresh

body [sec:3]"));
        let cache = ArticleCache::new(store.clone(), transcripts(), llm.clone());

        let article = cache.get_or_create(&source()).await.unwrap();
        assert_eq!(llm.calls(), 1);
        assert!(article.content.starts_with("# Fresh"));

        let stored = store.get(&cache_key(ID)).await.unwrap().unwrap();
        let decoded: Article = serde_json::from_slice(&stored).unwrap();
        assert_eq!(decoded, article);
    }

    #[tokio::test]
    async fn untitled_source_without_heading_falls_back_to_video_title() {
        let cache = ArticleCache::new(
            Arc::new(MemoryArtifactStore::new()),
            transcripts(),
            Arc::new(MockGenerator::fixed("[sec:5]")),
        );
        let bare = SourceRef::from_url(&watch_url(ID), "").unwrap();
        assert_eq!(
            cache.get_or_create(&bare).await.unwrap().title,
            "YouTube video dQw4w9WgXcQ"
        );
    }

    #[test]
    fn tldr_prompt_asks_for_short_cited_bullets() {
        let segs = vec![TranscriptSegment::from_offset("hello", 42.0)];
        let p = build_tldr_prompt(&segs, &watch_url(ID));
        assert!(p.starts_with("# TLDR from a video transcript"));
        assert!(p.contains(r#"[{"text":"hello","start":42}]"#));
        assert!(p.contains("[sec:N]"));
        assert!(p.contains("3 to 5 bullet points"));
        assert!(p.contains("under 200 words"));
    }

    #[tokio::test]
    async fn tldr_cache_uses_its_own_keys() {
        let store = Arc::new(MemoryArtifactStore::new());
        let prompts = Arc::new(std::sync::Mutex::new(Vec::<String>::new()));
        let seen = prompts.clone();
        let llm = Arc::new(MockGenerator::new(move |p| {
            seen.lock().unwrap().push(p.to_string());
            Some("[sec:5] only a link".into())
        }));
        let tldrs = ArticleCache::new(store.clone(), transcripts(), llm.clone())
            .with_kind(ArticleKind::Tldr);
        let bare = SourceRef::from_url(&watch_url(ID), "").unwrap();

        let tldr = tldrs.get_or_create(&bare).await.unwrap();
        tldrs.get_or_create(&bare).await.unwrap();

        assert_eq!(llm.calls(), 1);
        assert_eq!(tldr.title, "only a link");
        assert_eq!(store.keys(), vec!["tldr:dQw4w9WgXcQ".to_string()]);
        assert!(prompts.lock().unwrap()[0].starts_with("# TLDR"));
    }

    #[test]
    fn fallback_titles_name_the_video() {
        assert_eq!(ArticleKind::WriteUp.fallback_title("abc"), "YouTube video abc");
        assert_eq!(ArticleKind::Tldr.fallback_title("abc"), "TLDR: YouTube Video abc");
    }
}
