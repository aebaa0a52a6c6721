// Concurrent settle-all fetch across data sources
use chrono::Utc;
use futures::future::join_all;
use log::{error, info, warn};
use serde_json::Value;
use std::time::Instant;

use crate::data_sources::{DataSource, SourceKind};
use crate::error::FetchError;
use crate::models::{DegradedSource, SentimentSnapshot};
use crate::normalizer::PayloadNormalizer;

/// Result of one source call within a refresh
#[derive(Debug)]
pub struct SourceOutcome {
    pub source: String,
    pub kind: SourceKind,
    pub result: Result<Value, FetchError>,
}

impl SourceOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct SentimentFetcher {
    sources: Vec<Box<dyn DataSource>>,
}

impl SentimentFetcher {
    pub fn new(sources: Vec<Box<dyn DataSource>>) -> Self {
        Self { sources }
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Call every source concurrently and wait for all of them. One
    /// failing call never cancels the others.
    pub async fn fetch_all(&self) -> Vec<SourceOutcome> {
        let calls = self.sources.iter().map(|source| async move {
            let start = Instant::now();
            let result = source.fetch().await;
            match &result {
                Ok(_) => info!("Fetched {} in {:.2}s", source.name(), start.elapsed().as_secs_f32()),
                Err(e) => warn!("Fetch from {} failed: {}", source.name(), e),
            }
            SourceOutcome {
                source: source.name().to_string(),
                kind: source.kind(),
                result,
            }
        });

        join_all(calls).await
    }

    /// Fetch and normalize into one snapshot. Failed calls are listed in
    /// `degraded`; an error is returned only when nothing succeeded.
    pub async fn refresh(&self) -> Result<SentimentSnapshot, FetchError> {
        if self.sources.is_empty() {
            return Err(FetchError::NoSources);
        }

        let outcomes = self.fetch_all().await;
        assemble_snapshot(outcomes)
    }
}

/// Merge settled outcomes into a snapshot
pub fn assemble_snapshot(outcomes: Vec<SourceOutcome>) -> Result<SentimentSnapshot, FetchError> {
    let total = outcomes.len();
    let mut snapshot = SentimentSnapshot::empty();
    let mut normalizer = PayloadNormalizer::new();
    let mut succeeded = 0;

    for outcome in outcomes {
        match outcome.result {
            Ok(payload) => {
                succeeded += 1;
                match outcome.kind {
                    SourceKind::Sentiment => {
                        snapshot.sources.extend(normalizer.source_readings(&payload));
                        snapshot.historical.extend(normalizer.historical(&payload));
                        snapshot.social_platforms += normalizer.count_entries(&payload, "socialPlatforms");
                        snapshot.contrarian_opportunities +=
                            normalizer.count_entries(&payload, "contrarianOpportunities");
                    }
                    SourceKind::News => {
                        snapshot.news.extend(normalizer.news_items(&payload, false));
                    }
                }
            }
            Err(e) => {
                snapshot.degraded.push(DegradedSource {
                    source: outcome.source,
                    reason: e.to_string(),
                });
            }
        }
    }

    if succeeded == 0 {
        error!("All {} data sources failed", total);
        return Err(FetchError::AllSourcesFailed(total));
    }

    let report = normalizer.report();
    if report.dropped > 0 {
        warn!("Normalization dropped {} malformed entries", report.dropped);
    }

    snapshot.news.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    snapshot.fetched_at = Utc::now();

    info!(
        "Snapshot assembled: {} sources, {} history points, {} articles, {} degraded",
        snapshot.sources.len(), snapshot.historical.len(), snapshot.news.len(), snapshot.degraded.len()
    );

    Ok(snapshot)
}
