// src/citations.rs
//! Citation text handling, in one place:
//! - expanding `[sec:N]` placeholders emitted by the generator into timestamp links,
//! - renumbering timestamp links in a synthesized report against the final source list,
//! - title extraction and the trailing `## Sources` section.

use std::collections::HashMap;

use once_cell::sync::OnceCell;
use regex::{Captures, Regex};

use crate::error::ResearchError;
use crate::types::{timestamp_url, watch_url, Article, Report, ReportSource};

const TITLE_MAX_CHARS: usize = 100;

fn placeholder_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\[sec:(\d+)\]").expect("placeholder regex"))
}

// Any markdown link pointing at youtu.be; the target is validated separately.
fn candidate_link_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(r"\[([^\[\]]+)\]\((https://youtu\.be/[^)\s]*)\)").expect("link regex")
    })
}

fn timestamp_target_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(r"^https://youtu\.be/([0-9A-Za-z_-]{11})\?t=(\d+)$").expect("target regex")
    })
}

/// Human time label: `45s`, `2m5s`, `1hr2m5s`.
pub fn format_offset(secs: u64) -> String {
    if secs >= 3600 {
        format!("{}hr{}m{}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m{}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}

/// Markdown link to `secs` into the given video.
pub fn timestamp_link(video_id: &str, secs: u64) -> String {
    format!("[{}]({})", format_offset(secs), timestamp_url(video_id, secs))
}

/// Replace every well-formed `[sec:N]` with a timestamp link. Anything that does not
/// parse (including offsets too large for `u64`) is left as literal text.
pub fn expand_placeholders(text: &str, video_id: &str) -> String {
    placeholder_re()
        .replace_all(text, |caps: &Captures| match caps[1].parse::<u64>() {
            Ok(secs) => timestamp_link(video_id, secs),
            Err(_) => caps[0].to_string(),
        })
        .into_owned()
}

/// Parse a timestamp link target into `(video_id, secs)`.
pub fn parse_timestamp_target(target: &str) -> Result<(String, u64), ResearchError> {
    let malformed = || ResearchError::MalformedCitation(target.to_string());
    let caps = timestamp_target_re().captures(target).ok_or_else(malformed)?;
    let secs = caps[2].parse::<u64>().map_err(|_| malformed())?;
    Ok((caps[1].to_string(), secs))
}

/// source id -> 1-based number, in article order.
#[derive(Debug, Clone, Default)]
pub struct SourceIndexMap {
    numbers: HashMap<String, usize>,
    ordered: Vec<ReportSource>,
}

impl SourceIndexMap {
    pub fn from_articles(articles: &[Article]) -> Self {
        let mut map = Self::default();
        for article in articles {
            if map.numbers.contains_key(&article.source_id) {
                continue;
            }
            let number = map.ordered.len() + 1;
            map.numbers.insert(article.source_id.clone(), number);
            map.ordered.push(ReportSource {
                number,
                title: article.title.clone(),
                url: watch_url(&article.source_id),
            });
        }
        map
    }

    pub fn number_of(&self, source_id: &str) -> Option<usize> {
        self.numbers.get(source_id).copied()
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn into_sources(self) -> Vec<ReportSource> {
        self.ordered
    }

    pub fn sources(&self) -> &[ReportSource] {
        &self.ordered
    }
}

/// Prefix the label of every recognized timestamp link with its source number.
/// Unknown sources and malformed targets pass through untouched.
pub fn renumber_links(markdown: &str, index: &SourceIndexMap) -> String {
    candidate_link_re()
        .replace_all(markdown, |caps: &Captures| {
            let label = &caps[1];
            let target = &caps[2];
            match parse_timestamp_target(target) {
                Ok((video_id, _secs)) => match index.number_of(&video_id) {
                    Some(n) => format!("[({n}) {label}]({target})"),
                    None => caps[0].to_string(),
                },
                Err(e) => {
                    tracing::debug!(kind = e.kind(), link = &caps[0], "passing link through");
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}

fn any_link_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\[([^\[\]]*)\]\(([^)\s]*)\)").expect("any link regex"))
}

fn spaces_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("spaces regex"))
}

/// Plain text of a markdown line: timestamp links dropped, other links reduced
/// to their label, whitespace collapsed.
pub fn strip_links(line: &str) -> String {
    let plain = any_link_re().replace_all(line, |caps: &Captures| {
        if caps[2].starts_with("https://youtu.be/") {
            String::new()
        } else {
            caps[1].to_string()
        }
    });
    spaces_re().replace_all(plain.trim(), " ").into_owned()
}

/// First `#`/`##` heading, else the first non-empty line capped at 100 chars.
/// Link markup is stripped; lines that are nothing but links are skipped.
pub fn heading_or_first_line(markdown: &str) -> Option<String> {
    for line in markdown.lines() {
        let t = line.trim();
        if let Some(rest) = t.strip_prefix("## ").or_else(|| t.strip_prefix("# ")) {
            let heading = strip_links(rest);
            if !heading.is_empty() {
                return Some(heading);
            }
        }
    }

    markdown
        .lines()
        .map(strip_links)
        .find(|l| !l.is_empty())
        .map(|l| l.chars().take(TITLE_MAX_CHARS).collect())
}

/// Report title, falling back to `Research report: <query>`.
pub fn extract_title(markdown: &str, query: &str) -> String {
    heading_or_first_line(markdown)
        .unwrap_or_else(|| format!("Research report: {}", query.trim()))
}

pub fn sources_section(index: &SourceIndexMap) -> String {
    let mut out = String::from("## Sources\n\n");
    for s in index.sources() {
        out.push_str(&format!("- ({}) [{}]({})\n", s.number, s.title, s.url));
    }
    out
}

/// Turn synthesized markdown into the final report.
pub fn rewrite(raw_markdown: &str, articles: &[Article], query: &str) -> Report {
    let index = SourceIndexMap::from_articles(articles);
    let title = extract_title(raw_markdown, query);
    let body = renumber_links(raw_markdown.trim(), &index);

    let mut content = body;
    if !content.is_empty() {
        content.push_str("\n\n");
    }
    content.push_str(&sources_section(&index));

    Report {
        title,
        content,
        sources: index.into_sources(),
    }
}
