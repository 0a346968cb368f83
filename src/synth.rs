// src/synth.rs
//! One prompt from the query and every article; one generator call.

use std::time::Instant;

use crate::error::ResearchError;
use crate::llm::DynTextGenerator;
use crate::types::Article;

const INSTRUCTIONS: &str = "\
## Approach
1. Work out what the query needs: a direct answer, a broad synthesis, a comparison or a how-to.
2. Shape the report to fit that need. Do not name the query type and do not mention that the material comes from video transcripts.

## Content
- Open with a `# ` title that sums up the report.
- Use `## ` sections in whatever order serves the query best.
- Analyse rather than summarise: compare perspectives, surface connections and disagreements between sources, and draw conclusions that answer the query.
- Cover practical implications and limitations where they matter.

## Citations
- Back claims, quotes, examples and contrasting views with the timestamp links already present in the material, e.g. [2m5s](https://youtu.be/VIDEO_ID?t=125).
- Copy link targets exactly. Cite several sources when a point is supported by more than one.
- Work citations into the prose instead of listing them at the end.

## Formatting
- Standard markdown: `#`/`##` headings, `-` and `1.` lists, `>` for quotes, **bold** for emphasis.
";

pub struct ReportSynthesizer {
    generator: DynTextGenerator,
}

impl ReportSynthesizer {
    pub fn new(generator: DynTextGenerator) -> Self {
        Self { generator }
    }

    pub fn build_prompt(query: &str, articles: &[Article]) -> String {
        let body: usize = articles.iter().map(|a| a.content.len() + a.title.len() + 32).sum();
        let mut p = String::with_capacity(INSTRUCTIONS.len() + query.len() + body + 256);
        p.push_str("# Research task\n\n");
        p.push_str(&format!("## Query\n{query}\n\n"));
        p.push_str(INSTRUCTIONS);
        p.push_str("\n## Source material\n");
        for (i, a) in articles.iter().enumerate() {
            p.push_str(&format!("\n### Source {}: {}\n{}\n", i + 1, a.title, a.content));
        }
        p
    }

    /// Raw markdown, exactly as generated.
    pub async fn synthesize(&self, query: &str, articles: &[Article]) -> Result<String, ResearchError> {
        let prompt = Self::build_prompt(query, articles);
        let t0 = Instant::now();
        let out = self.generator.generate(&prompt).await;
        tracing::debug!(
            provider = self.generator.provider_name(),
            prompt_chars = prompt.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "synthesis call returned"
        );
        match out {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(ResearchError::Synthesis),
        }
    }
}
