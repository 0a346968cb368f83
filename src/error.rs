// src/error.rs
//! Closed set of failure kinds for the research pipeline.
//!
//! Per-source kinds (`SourceUnavailable`, `AggregationTimeout`) are recovered
//! inside the aggregator and never reach a caller. `Discovery` is recovered
//! by the discovery service itself (it degrades to zero sources).
//! `MalformedCitation` only ever signals "pass this link through unchanged".

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResearchError {
    #[error("source discovery failed: {0}")]
    Discovery(String),

    #[error("source {source_id} unavailable: {reason}")]
    SourceUnavailable { source_id: String, reason: String },

    #[error("source {source_id} did not finish before the aggregation deadline")]
    AggregationTimeout { source_id: String },

    #[error("report synthesis produced no text")]
    Synthesis,

    #[error("malformed citation link: {0}")]
    MalformedCitation(String),

    #[error("no sources yielded content")]
    NoSources,

    #[error("empty research query")]
    InvalidQuery,
}

impl ResearchError {
    pub fn unavailable(source_id: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            source_id: source_id.into(),
            reason: reason.to_string(),
        }
    }

    /// Kind label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Discovery(_) => "discovery",
            Self::SourceUnavailable { .. } => "source_unavailable",
            Self::AggregationTimeout { .. } => "aggregation_timeout",
            Self::Synthesis => "synthesis",
            Self::MalformedCitation(_) => "malformed_citation",
            Self::NoSources => "no_sources",
            Self::InvalidQuery => "invalid_query",
        }
    }

    /// Failures that end a whole request (as opposed to dropping one source).
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Synthesis | Self::NoSources | Self::InvalidQuery)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_source_kinds_are_not_fatal() {
        assert!(!ResearchError::unavailable("abc", "quota").is_fatal());
        assert!(!ResearchError::AggregationTimeout {
            source_id: "abc".into()
        }
        .is_fatal());
        assert!(!ResearchError::MalformedCitation("[x](y)".into()).is_fatal());
        assert!(ResearchError::Synthesis.is_fatal());
        assert!(ResearchError::NoSources.is_fatal());
    }

    #[test]
    fn display_includes_source_id() {
        let e = ResearchError::unavailable("dQw4w9WgXcQ", "no captions");
        assert_eq!(
            e.to_string(),
            "source dQw4w9WgXcQ unavailable: no captions"
        );
        assert_eq!(e.kind(), "source_unavailable");
    }
}
