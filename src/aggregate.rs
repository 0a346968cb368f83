// src/aggregate.rs
//! Bounded fan-out over sources with a global deadline; fan-in in completion order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::{counter, histogram};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::config::AggregationConfig;
use crate::error::ResearchError;
use crate::metrics as m;
use crate::types::{AggregationResult, Article, SourceRef};

/// Anything that can turn a source into an article.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    async fn get_or_create(&self, source: &SourceRef) -> Result<Article, ResearchError>;
}

pub struct BoundedAggregator {
    articles: Arc<dyn ArticleSource>,
    max_concurrent: usize,
    deadline: Duration,
}

impl BoundedAggregator {
    pub fn new(articles: Arc<dyn ArticleSource>, max_concurrent: usize, deadline: Duration) -> Self {
        Self {
            articles,
            max_concurrent: max_concurrent.max(1),
            deadline,
        }
    }

    pub fn from_config(articles: Arc<dyn ArticleSource>, cfg: &AggregationConfig) -> Self {
        Self::new(articles, cfg.max_concurrent, cfg.deadline())
    }

    /// One unit per source. Failed, panicked and overdue units are logged and
    /// left out; everything that finished in time is returned.
    pub async fn aggregate(&self, sources: &[SourceRef]) -> AggregationResult {
        let started = Instant::now();
        let deadline = started + self.deadline;
        let limiter = Arc::new(Semaphore::new(self.max_concurrent));

        let mut units = JoinSet::new();
        let mut pending: HashMap<tokio::task::Id, SourceRef> = HashMap::with_capacity(sources.len());
        for source in sources {
            let limiter = limiter.clone();
            let articles = self.articles.clone();
            let unit_source = source.clone();
            let handle = units.spawn(async move {
                // held until the unit ends, whatever the outcome
                let _permit = limiter
                    .acquire_owned()
                    .await
                    .map_err(|_| ResearchError::unavailable(&unit_source.id, "limiter closed"))?;
                articles.get_or_create(&unit_source).await
            });
            pending.insert(handle.id(), source.clone());
        }

        let mut out = Vec::with_capacity(sources.len());
        let sleep = tokio::time::sleep_until(deadline);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                joined = units.join_next_with_id() => {
                    let Some(joined) = joined else { break };
                    match joined {
                        Ok((id, Ok(article))) => {
                            pending.remove(&id);
                            out.push(article);
                        }
                        Ok((id, Err(e))) => {
                            pending.remove(&id);
                            counter!(m::SOURCE_FAILURES).increment(1);
                            tracing::warn!(kind = e.kind(), error = %e, "source dropped");
                        }
                        Err(join_err) => {
                            let source = pending.remove(&join_err.id());
                            counter!(m::SOURCE_FAILURES).increment(1);
                            tracing::warn!(
                                source_id = source.as_ref().map(|s| s.id.as_str()).unwrap_or("?"),
                                error = %join_err,
                                "source unit panicked or was cancelled"
                            );
                        }
                    }
                }
                _ = &mut sleep => {
                    units.abort_all();
                    for source in pending.values() {
                        let e = ResearchError::AggregationTimeout { source_id: source.id.clone() };
                        counter!(m::SOURCE_TIMEOUTS).increment(1);
                        tracing::warn!(kind = e.kind(), error = %e, "source abandoned");
                    }
                    break;
                }
            }
        }

        let elapsed = started.elapsed();
        histogram!(m::AGGREGATION_MS).record(elapsed.as_millis() as f64);
        tracing::info!(
            requested = sources.len(),
            completed = out.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "aggregation finished"
        );
        out
    }
}
