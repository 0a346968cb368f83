// src/transcript.rs
//! Transcript retrieval: source id -> ordered `(text, start)` segments.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::config::{ProxyConfig, TranscriptConfig};
use crate::scrape::balanced_json_after;
use crate::types::TranscriptSegment;

#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// Segments in playback order. Errors on network/quota failure or when no
    /// caption track is available.
    async fn fetch(&self, source_id: &str) -> Result<Vec<TranscriptSegment>>;
}

pub type DynTranscriptSource = Arc<dyn TranscriptSource>;

// ------------------------------------------------------------
// YouTube captions over HTTP
// ------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct CaptionTrack {
    #[serde(rename = "baseUrl")]
    base_url: String,
    #[serde(rename = "languageCode")]
    language_code: String,
    /// "asr" for auto-generated tracks
    #[serde(default)]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Json3 {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
struct Json3Event {
    #[serde(rename = "tStartMs", default)]
    t_start_ms: u64,
    #[serde(default)]
    segs: Vec<Json3Seg>,
}

#[derive(Debug, Deserialize)]
struct Json3Seg {
    #[serde(default)]
    utf8: String,
}

pub struct YoutubeTranscriptSource {
    http: reqwest::Client,
    languages: Vec<String>,
}

impl YoutubeTranscriptSource {
    /// `rotate` selects the proxy's rotating gateway port (bulk fetches).
    pub fn new(cfg: &TranscriptConfig, proxy: Option<&ProxyConfig>, rotate: bool) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)));
        if let Some(p) = proxy {
            let mut px = reqwest::Proxy::all(p.url(rotate)).context("building transcript proxy")?;
            if !p.username.is_empty() {
                px = px.basic_auth(&p.username, &p.password);
            }
            builder = builder.proxy(px);
        }
        Ok(Self {
            http: builder.build().context("building transcript http client")?,
            languages: cfg.languages.clone(),
        })
    }

    async fn caption_tracks(&self, video_id: &str) -> Result<Vec<CaptionTrack>> {
        let page = self
            .http
            .get("https://www.youtube.com/watch")
            .query(&[("v", video_id)])
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await
            .context("watch page request")?
            .error_for_status()
            .context("watch page status")?
            .text()
            .await
            .context("watch page body")?;
        parse_caption_tracks(&page)
    }
}

fn parse_caption_tracks(page: &str) -> Result<Vec<CaptionTrack>> {
    let raw = balanced_json_after(page, r#""captionTracks":"#)
        .ok_or_else(|| anyhow!("no caption tracks on watch page"))?;
    serde_json::from_str(raw).context("parsing caption tracks")
}

/// First language in preference order wins; a manual track beats an
/// auto-generated one in the same language.
fn pick_track<'a>(tracks: &'a [CaptionTrack], languages: &[String]) -> Option<&'a CaptionTrack> {
    for lang in languages {
        let same_lang: Vec<&CaptionTrack> = tracks
            .iter()
            .filter(|t| t.language_code.eq_ignore_ascii_case(lang))
            .collect();
        let manual = same_lang
            .iter()
            .find(|t| t.kind.as_deref() != Some("asr"));
        if let Some(t) = manual.or_else(|| same_lang.first()) {
            return Some(*t);
        }
    }
    None
}

fn parse_json3(body: &str) -> Result<Vec<TranscriptSegment>> {
    let doc: Json3 = serde_json::from_str(body).context("parsing json3 captions")?;
    let segments = doc
        .events
        .into_iter()
        .filter_map(|ev| {
            let text: String = ev.segs.into_iter().map(|s| s.utf8).collect();
            let text = text.replace('\n', " ");
            let text = text.trim();
            if text.is_empty() {
                None
            } else {
                Some(TranscriptSegment::from_offset(
                    html_escape::decode_html_entities(text),
                    ev.t_start_ms as f64 / 1000.0,
                ))
            }
        })
        .collect();
    Ok(segments)
}

#[async_trait]
impl TranscriptSource for YoutubeTranscriptSource {
    async fn fetch(&self, source_id: &str) -> Result<Vec<TranscriptSegment>> {
        let tracks = self.caption_tracks(source_id).await?;
        let track = pick_track(&tracks, &self.languages)
            .ok_or_else(|| anyhow!("no transcript in preferred languages"))?;

        let body = self
            .http
            .get(&track.base_url)
            .query(&[("fmt", "json3")])
            .send()
            .await
            .context("caption request")?
            .error_for_status()
            .context("caption status")?
            .text()
            .await
            .context("caption body")?;

        let segments = parse_json3(&body)?;
        if segments.is_empty() {
            return Err(anyhow!("caption track is empty"));
        }
        tracing::debug!(
            source_id,
            lang = %track.language_code,
            segments = segments.len(),
            "transcript fetched"
        );
        Ok(segments)
    }
}

// ------------------------------------------------------------
// Static transcripts (tests, local runs)
// ------------------------------------------------------------

/// Serves fixed transcripts by id; unknown ids fail like a missing caption track.
#[derive(Default)]
pub struct StaticTranscripts {
    items: HashMap<String, Vec<TranscriptSegment>>,
}

impl StaticTranscripts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source_id: &str, segments: Vec<TranscriptSegment>) -> Self {
        self.items.insert(source_id.to_string(), segments);
        self
    }
}

#[async_trait]
impl TranscriptSource for StaticTranscripts {
    async fn fetch(&self, source_id: &str) -> Result<Vec<TranscriptSegment>> {
        self.items
            .get(source_id)
            .cloned()
            .ok_or_else(|| anyhow!("no transcript for {source_id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(lang: &str, kind: Option<&str>) -> CaptionTrack {
        CaptionTrack {
            base_url: format!("https://captions.test/{lang}"),
            language_code: lang.into(),
            kind: kind.map(str::to_string),
        }
    }

    #[test]
    fn caption_tracks_parse_from_watch_page() {
        let page = r#"..."captions":{"playerCaptionsTracklistRenderer":{"captionTracks":[{"baseUrl":"https://www.youtube.com/api/timedtext?v=x&lang=en","name":{"runs":[{"text":"English"}]},"languageCode":"en","kind":"asr"}],"audioTracks":[]}}..."#;
        let tracks = parse_caption_tracks(page).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(
            tracks[0].base_url,
            "https://www.youtube.com/api/timedtext?v=x&lang=en"
        );
        assert_eq!(tracks[0].kind.as_deref(), Some("asr"));
        assert!(parse_caption_tracks("<html>no captions</html>").is_err());
    }

    #[test]
    fn track_choice_follows_language_order_and_prefers_manual() {
        let langs: Vec<String> = vec!["en".into(), "de".into()];
        let tracks = vec![track("de", None), track("en", Some("asr")), track("en", None)];
        let t = pick_track(&tracks, &langs).unwrap();
        assert_eq!(t.language_code, "en");
        assert_eq!(t.kind, None);

        let only_de = vec![track("fr", None), track("de", Some("asr"))];
        assert_eq!(pick_track(&only_de, &langs).unwrap().language_code, "de");
        assert!(pick_track(&[track("ja", None)], &langs).is_none());
    }

    #[test]
    fn json3_drops_durations_and_truncates_offsets() {
        let body = r#"{"events":[
            {"tStartMs":0,"dDurationMs":1500},
            {"tStartMs":1999,"dDurationMs":2000,"segs":[{"utf8":"hello"},{"utf8":" world"}]},
            {"tStartMs":62500,"segs":[{"utf8":"\n"}]},
            {"tStartMs":62900,"segs":[{"utf8":"it&#39;s fine"}]}
        ]}"#;
        let segs = parse_json3(body).unwrap();
        assert_eq!(
            segs,
            vec![
                TranscriptSegment { text: "hello world".into(), start: 1 },
                TranscriptSegment { text: "it's fine".into(), start: 62 },
            ]
        );
    }

    #[tokio::test]
    async fn static_transcripts_fail_for_unknown_ids() {
        let src = StaticTranscripts::new().with("abc", vec![TranscriptSegment::from_offset("x", 1.0)]);
        assert_eq!(src.fetch("abc").await.unwrap().len(), 1);
        assert!(src.fetch("zzz").await.is_err());
    }
}
