// tests/pipeline.rs
//
// End-to-end runs of the research engine over in-crate fakes:
// discovery -> aggregation -> synthesis -> citation rewrite.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;

use video_research::aggregate::BoundedAggregator;
use video_research::article::{cache_key, ArticleCache};
use video_research::discovery::StaticDiscovery;
use video_research::llm::MockGenerator;
use video_research::store::MemoryArtifactStore;
use video_research::synth::ReportSynthesizer;
use video_research::transcript::StaticTranscripts;
use video_research::types::watch_url;
use video_research::{ResearchEngine, ResearchError, SourceRef, TranscriptSegment};

const IDS: [&str; 4] = ["aaaaaaaaaaa", "bbbbbbbbbbb", "ccccccccccc", "ddddddddddd"];

fn sources() -> Vec<SourceRef> {
    IDS.iter()
        .enumerate()
        .map(|(i, id)| SourceRef::from_url(&watch_url(id), &format!("Video {i}")).unwrap())
        .collect()
}

fn transcripts(skip: &[&str]) -> StaticTranscripts {
    IDS.iter()
        .filter(|id| !skip.contains(id))
        .fold(StaticTranscripts::new(), |t, id| {
            t.with(
                id,
                vec![
                    TranscriptSegment::from_offset("opening", 0.0),
                    TranscriptSegment::from_offset("main point", 125.7),
                ],
            )
        })
}

/// Article prompts get a fixed write-up; the report prompt is answered by
/// citing every timestamp link found in the source material.
fn scripted_llm() -> Arc<MockGenerator> {
    let link = Regex::new(r"\[[^\[\]]+\]\(https://youtu\.be/[^)]+\)").unwrap();
    Arc::new(MockGenerator::new(move |prompt| {
        if prompt.starts_with("# Research task") {
            let cites: Vec<&str> = link.find_iter(prompt).map(|m| m.as_str()).collect();
            Some(format!(
                "# Findings\n\n## Overview\n\nEvidence: {}.\n\nAlso [docs](https://doc.rust-lang.org).",
                cites.join(", ")
            ))
        } else {
            Some("# Write-up\n\n## Main point [sec:125]\n- detail [sec:0]".into())
        }
    }))
}

fn engine(
    store: Arc<MemoryArtifactStore>,
    llm: Arc<MockGenerator>,
    transcripts: StaticTranscripts,
) -> ResearchEngine {
    let cache = Arc::new(ArticleCache::new(store, Arc::new(transcripts), llm.clone()));
    ResearchEngine::new(
        Arc::new(StaticDiscovery::new(sources())),
        BoundedAggregator::new(cache, 25, Duration::from_secs(90)),
        ReportSynthesizer::new(llm),
    )
}

fn numbers_in(re: &Regex, text: &str) -> BTreeSet<usize> {
    re.captures_iter(text)
        .map(|c| c[1].parse::<usize>().unwrap())
        .collect()
}

#[tokio::test]
async fn report_citations_and_sources_are_a_bijection() {
    let store = Arc::new(MemoryArtifactStore::new());
    let report = engine(store, scripted_llm(), transcripts(&[]))
        .run("  how does rust ownership work  ")
        .await
        .expect("report");

    assert_eq!(report.title, "Findings");
    assert_eq!(report.sources.len(), IDS.len());

    let (body, sources_section) = report
        .content
        .split_once("## Sources")
        .expect("sources section");

    let cited = numbers_in(&Regex::new(r"\[\((\d+)\) [^\]]+\]\(https://youtu\.be/").unwrap(), body);
    let listed = numbers_in(&Regex::new(r"(?m)^- \((\d+)\) \[").unwrap(), sources_section);
    let expected: BTreeSet<usize> = (1..=IDS.len()).collect();

    assert_eq!(cited, expected);
    assert_eq!(listed, expected);

    // each label points at the source carrying that number
    for s in &report.sources {
        let id = s.url.rsplit('=').next().unwrap();
        assert!(body.contains(&format!("[({}) 2m5s](https://youtu.be/{id}?t=125)", s.number)));
    }
    // non-timestamp links are untouched
    assert!(body.contains("[docs](https://doc.rust-lang.org)"));
}

#[tokio::test]
async fn failed_sources_are_omitted_from_the_report() {
    let store = Arc::new(MemoryArtifactStore::new());
    let report = engine(store, scripted_llm(), transcripts(&["bbbbbbbbbbb"]))
        .run("rust")
        .await
        .expect("report");

    assert_eq!(report.sources.len(), IDS.len() - 1);
    assert!(report.sources.iter().all(|s| !s.url.ends_with("bbbbbbbbbbb")));
    assert!(!report.content.contains("youtu.be/bbbbbbbbbbb"));
}

#[tokio::test]
async fn second_run_reuses_stored_articles() {
    let store = Arc::new(MemoryArtifactStore::new());
    let llm = scripted_llm();

    let e = engine(store.clone(), llm.clone(), transcripts(&[]));
    e.run("rust").await.expect("first report");
    assert_eq!(llm.calls(), IDS.len() + 1);
    for id in IDS {
        assert!(store.keys().contains(&cache_key(id)));
    }

    e.run("rust again").await.expect("second report");
    // only the synthesis call is new
    assert_eq!(llm.calls(), IDS.len() + 2);
}

#[tokio::test]
async fn every_transcript_missing_means_no_sources() {
    let llm = scripted_llm();
    let store = Arc::new(MemoryArtifactStore::new());
    let res = engine(store, llm.clone(), transcripts(&IDS)).run("rust").await;
    assert_eq!(res, Err(ResearchError::NoSources));
    assert_eq!(llm.calls(), 0);
}
