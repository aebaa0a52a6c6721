use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use log::{error, info, warn};

use sentiment_node::error::FetchError;
use sentiment_node::live_feed::LiveFeed;
use sentiment_node::models::{Insight, NewsItem, SentimentMetrics, SentimentSnapshot};
use sentiment_node::{InsightGenerator, MetricsAggregator, SentimentFetcher};

use crate::models::{ApiError, HealthResponse, MetricsResponse, ServiceStatus};

pub const DEFAULT_NEWS_LIMIT: usize = 20;

#[derive(Default)]
struct DashboardState {
    snapshot: Option<SentimentSnapshot>,
    metrics: Option<SentimentMetrics>,
    insight: Option<Insight>,
    last_error: Option<String>,
}

/// Service holding the latest computed dashboard data
#[derive(Clone)]
pub struct DashboardService {
    // Latest snapshot and everything derived from it
    state: Arc<RwLock<DashboardState>>,
    // Live news feed, owned by the application
    feed: Arc<LiveFeed>,
    aggregator: Arc<MetricsAggregator>,
    insights: Arc<InsightGenerator>,
}

impl DashboardService {
    /// Create a new instance of the dashboard service
    pub fn new(feed: Arc<LiveFeed>) -> Self {
        Self {
            state: Arc::new(RwLock::new(DashboardState::default())),
            feed,
            aggregator: Arc::new(MetricsAggregator::new()),
            insights: Arc::new(InsightGenerator::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, DashboardState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, DashboardState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Recompute metrics and insight for a new snapshot and store all three
    pub fn apply_snapshot(&self, snapshot: SentimentSnapshot) {
        let metrics = self.aggregator.aggregate_snapshot(&snapshot);
        let insight = self.insights.generate(&metrics, &snapshot.counts());

        let mut state = self.write();
        state.snapshot = Some(snapshot);
        state.metrics = Some(metrics);
        state.insight = Some(insight);
        state.last_error = None;
    }

    /// Keep serving the previous snapshot but remember why the refresh failed
    pub fn record_failure(&self, reason: String) {
        self.write().last_error = Some(reason);
    }

    pub async fn refresh(&self, fetcher: &SentimentFetcher) -> Result<(), FetchError> {
        match fetcher.refresh().await {
            Ok(snapshot) => {
                for degraded in &snapshot.degraded {
                    warn!("Source degraded: {} ({})", degraded.source, degraded.reason);
                }
                self.apply_snapshot(snapshot);
                Ok(())
            }
            Err(e) => {
                self.record_failure(e.to_string());
                Err(e)
            }
        }
    }

    /// Get the latest metrics
    pub fn get_metrics(&self) -> Result<MetricsResponse, ApiError> {
        let state = self.read();
        match (&state.metrics, &state.snapshot) {
            (Some(metrics), Some(snapshot)) => Ok(MetricsResponse {
                metrics: metrics.clone(),
                fetched_at: snapshot.fetched_at,
                degraded: snapshot.degraded.clone(),
            }),
            _ => Err(self.not_ready(&state)),
        }
    }

    /// Get the latest insight
    pub fn get_insight(&self) -> Result<Insight, ApiError> {
        let state = self.read();
        state.insight.clone().ok_or_else(|| self.not_ready(&state))
    }

    pub fn get_snapshot(&self) -> Result<SentimentSnapshot, ApiError> {
        let state = self.read();
        state.snapshot.clone().ok_or_else(|| self.not_ready(&state))
    }

    /// Newest-first news, from the live feed when it has items and from the
    /// last snapshot otherwise
    pub fn get_recent_news(&self, limit: Option<usize>) -> Result<Vec<NewsItem>, ApiError> {
        let limit = limit.unwrap_or(DEFAULT_NEWS_LIMIT);
        if limit == 0 {
            return Err(ApiError::BadRequest("limit must be at least 1".to_string()));
        }

        let mut items = self.feed.recent();
        if items.is_empty() {
            items = self.read().snapshot
                .as_ref()
                .map(|s| s.news.clone())
                .unwrap_or_default();
        }

        items.truncate(limit);
        Ok(items)
    }

    pub fn health(&self) -> HealthResponse {
        let state = self.read();
        let degraded_sources: Vec<String> = state.snapshot
            .as_ref()
            .map(|s| s.degraded.iter().map(|d| d.source.clone()).collect())
            .unwrap_or_default();

        let status = match &state.snapshot {
            None => ServiceStatus::Starting,
            Some(_) if state.last_error.is_some() || !degraded_sources.is_empty() => ServiceStatus::Degraded,
            Some(_) => ServiceStatus::Ok,
        };

        HealthResponse {
            status,
            feed: self.feed.state(),
            last_refresh: state.snapshot.as_ref().map(|s| s.fetched_at),
            last_error: state.last_error.clone(),
            degraded_sources,
        }
    }

    fn not_ready(&self, state: &DashboardState) -> ApiError {
        match &state.last_error {
            Some(reason) => ApiError::ServiceUnavailable(format!("No sentiment data available: {}", reason)),
            None => ApiError::ServiceUnavailable("Sentiment data has not been fetched yet".to_string()),
        }
    }
}

/// Refresh the service on a fixed interval until the process exits
pub fn spawn_refresh_loop(service: DashboardService, fetcher: SentimentFetcher, interval: Duration) {
    tokio::spawn(async move {
        loop {
            match service.refresh(&fetcher).await {
                Ok(()) => info!("Dashboard refreshed"),
                Err(e) => error!("Dashboard refresh failed: {}", e),
            }
            tokio::time::sleep(interval).await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sentiment_node::live_feed::DEFAULT_BUFFER_CAP;
    use sentiment_node::models::{DegradedSource, SentimentLabel, SourceReading};

    fn sample_snapshot() -> SentimentSnapshot {
        let mut snapshot = SentimentSnapshot::empty();
        snapshot.sources = vec![
            SourceReading::new("Analysts".to_string(), 90.0).with_weight(0.5).with_reliability(0.9),
            SourceReading::new("Social".to_string(), 10.0).with_weight(0.5).with_reliability(0.9),
        ];
        snapshot.news = (0..3)
            .map(|i| NewsItem {
                timestamp: Utc::now(),
                headline: format!("headline {}", i),
                source: "Wire".to_string(),
                sentiment: SentimentLabel::Neutral,
                sentiment_score: 50.0,
                confidence: 0.7,
                is_real_time: false,
            })
            .collect();
        snapshot
    }

    fn service() -> DashboardService {
        DashboardService::new(Arc::new(LiveFeed::new(DEFAULT_BUFFER_CAP)))
    }

    #[test]
    fn test_not_ready_before_first_snapshot() {
        let service = service();
        assert!(matches!(service.get_metrics(), Err(ApiError::ServiceUnavailable(_))));
        assert_eq!(service.health().status, ServiceStatus::Starting);
    }

    #[test]
    fn test_apply_snapshot_computes_metrics() {
        let service = service();
        service.apply_snapshot(sample_snapshot());

        let response = service.get_metrics().unwrap();
        assert_eq!(response.metrics.overall, 50.0);
        assert_eq!(response.metrics.divergence, 40.0);
        assert_eq!(response.metrics.contrarian, 100.0);
        assert!(service.get_insight().unwrap().market_summary.contains("reversal"));
        assert_eq!(service.health().status, ServiceStatus::Ok);
    }

    #[test]
    fn test_failure_keeps_previous_snapshot() {
        let service = service();
        service.apply_snapshot(sample_snapshot());
        service.record_failure("All 2 data sources failed".to_string());

        assert!(service.get_metrics().is_ok());
        let health = service.health();
        assert_eq!(health.status, ServiceStatus::Degraded);
        assert_eq!(health.last_error.as_deref(), Some("All 2 data sources failed"));
    }

    #[test]
    fn test_degraded_sources_reported() {
        let service = service();
        let mut snapshot = sample_snapshot();
        snapshot.degraded.push(DegradedSource { source: "News API".to_string(), reason: "HTTP 503".to_string() });
        service.apply_snapshot(snapshot);

        let health = service.health();
        assert_eq!(health.status, ServiceStatus::Degraded);
        assert_eq!(health.degraded_sources, vec!["News API".to_string()]);
    }

    #[test]
    fn test_recent_news_falls_back_to_snapshot() {
        let service = service();
        assert!(service.get_recent_news(None).unwrap().is_empty());

        service.apply_snapshot(sample_snapshot());
        assert_eq!(service.get_recent_news(None).unwrap().len(), 3);
        assert_eq!(service.get_recent_news(Some(2)).unwrap().len(), 2);
        assert!(matches!(service.get_recent_news(Some(0)), Err(ApiError::BadRequest(_))));
    }
}
