// src/types.rs
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A candidate video found by discovery. Order is discovery order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceRef {
    pub id: String, // 11-char video id
    pub title: String,
    pub url: String,
}

impl SourceRef {
    /// Build from a video url; `None` if no video id can be found in it.
    pub fn from_url(url: &str, title: &str) -> Option<Self> {
        let id = extract_video_id(url)?;
        Some(Self {
            id,
            title: title.trim().to_string(),
            url: url.to_string(),
        })
    }
}

/// One transcript line with its start offset in whole seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TranscriptSegment {
    pub text: String,
    pub start: u64,
}

impl TranscriptSegment {
    /// Offsets arrive as fractional seconds; they are truncated, not rounded.
    pub fn from_offset(text: impl Into<String>, start_secs: f64) -> Self {
        let start = if start_secs.is_finite() && start_secs > 0.0 {
            start_secs.trunc() as u64
        } else {
            0
        };
        Self {
            text: text.into(),
            start,
        }
    }
}

/// Per-source markdown write-up with timestamp links already expanded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Article {
    pub source_id: String,
    pub title: String,
    pub content: String,
}

/// Articles that made it through aggregation, in completion order.
pub type AggregationResult = Vec<Article>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportSource {
    pub number: usize,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Report {
    pub title: String,
    pub content: String,
    pub sources: Vec<ReportSource>,
}

fn video_id_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?:v=|/)([0-9A-Za-z_-]{11})").expect("video id regex"))
}

/// Pull the 11-char video id out of a watch, short or embed url.
pub fn extract_video_id(url: &str) -> Option<String> {
    video_id_re()
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://youtube.com/watch?v={video_id}")
}

pub fn timestamp_url(video_id: &str, secs: u64) -> String {
    format!("https://youtu.be/{video_id}?t={secs}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_id_from_common_url_shapes() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=10s").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            extract_video_id("https://youtu.be/dQw4w9WgXcQ?t=5").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            extract_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(extract_video_id("https://example.com/x"), None);
    }

    #[test]
    fn segment_offsets_truncate() {
        assert_eq!(TranscriptSegment::from_offset("a", 12.99).start, 12);
        assert_eq!(TranscriptSegment::from_offset("a", 0.4).start, 0);
        assert_eq!(TranscriptSegment::from_offset("a", -3.0).start, 0);
        assert_eq!(TranscriptSegment::from_offset("a", f64::NAN).start, 0);
    }

    #[test]
    fn source_ref_from_url_trims_title() {
        let s = SourceRef::from_url("/watch?v=abcdefghijk", "  Intro to Rust ").unwrap();
        assert_eq!(s.id, "abcdefghijk");
        assert_eq!(s.title, "Intro to Rust");
    }
}
