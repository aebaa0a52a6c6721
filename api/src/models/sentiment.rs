use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sentiment_node::live_feed::ConnectionState;
use sentiment_node::models::{DegradedSource, SentimentMetrics};

/// Response for /api/sentiment/metrics
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsResponse {
    pub metrics: SentimentMetrics,
    pub fetched_at: DateTime<Utc>,
    pub degraded: Vec<DegradedSource>,
}

/// Query for /api/news/recent
#[derive(Debug, Deserialize)]
pub struct RecentNewsQuery {
    pub limit: Option<usize>,
}

/// Overall state reported by /health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Starting,
    Ok,
    Degraded,
}

/// Response for /health
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: ServiceStatus,
    pub feed: ConnectionState,
    pub last_refresh: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub degraded_sources: Vec<String>,
}
