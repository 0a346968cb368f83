// src/discovery/extract.rs
//! Pull `(id, title, url)` triples out of a rendered results page, in render order.

use std::collections::HashSet;

use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::Value;

use crate::scrape::balanced_json_after;
use crate::types::{watch_url, SourceRef};

const SITE: &str = "https://www.youtube.com";

fn anchor_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r#"(?is)<a\b[^>]*\bid="video-title"[^>]*>"#).expect("anchor regex"))
}

fn attr_re(name: &str) -> Regex {
    Regex::new(&format!(r#"(?is)\b{name}="([^"]*)""#)).expect("attr regex")
}

fn href_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| attr_re("href"))
}

fn title_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| attr_re("title"))
}

/// DOM anchors first (browser-rendered pages); `ytInitialData` when the page
/// was fetched without script execution. Capped at `max`, duplicates dropped.
pub fn extract_sources(html: &str, max: usize) -> Vec<SourceRef> {
    let from_dom = from_dom_anchors(html, max);
    if !from_dom.is_empty() {
        return from_dom;
    }
    from_initial_data(html, max)
}

fn push_unique(out: &mut Vec<SourceRef>, seen: &mut HashSet<String>, source: SourceRef) {
    if seen.insert(source.id.clone()) {
        out.push(source);
    }
}

pub fn from_dom_anchors(html: &str, max: usize) -> Vec<SourceRef> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for tag in anchor_re().find_iter(html) {
        if out.len() >= max {
            break;
        }
        let tag = tag.as_str();
        let (Some(href), Some(title)) = (
            href_re().captures(tag).map(|c| c[1].to_string()),
            title_re().captures(tag).map(|c| c[1].to_string()),
        ) else {
            continue;
        };
        let href = html_escape::decode_html_entities(&href).into_owned();
        let title = html_escape::decode_html_entities(&title).into_owned();
        if !href.contains("watch?v=") || title.trim().is_empty() {
            continue;
        }
        let absolute = if href.starts_with('/') {
            format!("{SITE}{href}")
        } else {
            href
        };
        if let Some(source) = SourceRef::from_url(&absolute, &title) {
            push_unique(&mut out, &mut seen, source);
        }
    }
    out
}

pub fn from_initial_data(html: &str, max: usize) -> Vec<SourceRef> {
    let Some(raw) = balanced_json_after(html, "ytInitialData") else {
        return Vec::new();
    };
    let Ok(data) = serde_json::from_str::<Value>(raw) else {
        tracing::debug!("ytInitialData present but not valid json");
        return Vec::new();
    };

    let mut renderers = Vec::new();
    collect_video_renderers(&data, &mut renderers);

    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for r in renderers {
        if out.len() >= max {
            break;
        }
        let Some(id) = r.get("videoId").and_then(Value::as_str) else {
            continue;
        };
        let title = renderer_title(r);
        if id.len() != 11 || title.trim().is_empty() {
            continue;
        }
        if let Some(source) = SourceRef::from_url(&watch_url(id), &title) {
            push_unique(&mut out, &mut seen, source);
        }
    }
    out
}

// Depth-first, arrays in document order.
fn collect_video_renderers<'a>(v: &'a Value, out: &mut Vec<&'a Value>) {
    match v {
        Value::Object(map) => {
            if let Some(r) = map.get("videoRenderer") {
                out.push(r);
                return;
            }
            for child in map.values() {
                collect_video_renderers(child, out);
            }
        }
        Value::Array(items) => {
            for child in items {
                collect_video_renderers(child, out);
            }
        }
        _ => {}
    }
}

fn renderer_title(r: &Value) -> String {
    let title = &r["title"];
    if let Some(s) = title["simpleText"].as_str() {
        return s.to_string();
    }
    title["runs"]
        .as_array()
        .map(|runs| {
            runs.iter()
                .filter_map(|run| run["text"].as_str())
                .collect::<String>()
        })
        .unwrap_or_default()
}
