// Data models for the sentiment dashboard
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// Current reading from a single sentiment provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceReading {
    pub source: String,
    pub score: f64,
    pub previous_score: f64,
    pub change: f64,
    pub weight: f64,
    pub reliability: f64,
}

/// One point of the overall sentiment time series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalPoint {
    pub date: String,
    pub overall: f64,
    pub analyst: f64,
    pub social: f64,
    pub volume: f64,
}

/// Summary metrics derived from one snapshot of readings and history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentMetrics {
    pub overall: f64,
    pub momentum: f64,
    pub volatility: f64,
    pub extreme_readings: usize,
    pub contrarian: f64,
    pub confidence: f64,
    pub divergence: f64,
}

/// Display-only figures shown next to the insight text. These are
/// formula-derived from the confidence score, not measured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStats {
    pub accuracy: u32,
    pub precision: u32,
    pub recall: u32,
    pub data_sources: usize,
}

/// Templated text summary of the current metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    pub market_summary: String,
    pub opportunities: Vec<String>,
    pub risks: Vec<String>,
    pub forecast: String,
    pub technical_details: String,
    pub model_stats: ModelStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    pub fn from_score(score: f64) -> Self {
        if score >= 60.0 {
            SentimentLabel::Positive
        } else if score <= 40.0 {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "positive" | "bullish" => Some(SentimentLabel::Positive),
            "negative" | "bearish" => Some(SentimentLabel::Negative),
            "neutral" => Some(SentimentLabel::Neutral),
            _ => None,
        }
    }
}

/// News item delivered by a fetch or by the live feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub timestamp: DateTime<Utc>,
    pub headline: String,
    pub source: String,
    pub sentiment: SentimentLabel,
    pub sentiment_score: f64,
    pub confidence: f64,
    pub is_real_time: bool,
}

/// A data source whose call failed during the last refresh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DegradedSource {
    pub source: String,
    pub reason: String,
}

/// Everything gathered in one refresh cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentSnapshot {
    pub sources: Vec<SourceReading>,
    pub historical: Vec<HistoricalPoint>,
    pub news: Vec<NewsItem>,
    pub social_platforms: usize,
    pub contrarian_opportunities: usize,
    pub degraded: Vec<DegradedSource>,
    pub fetched_at: DateTime<Utc>,
}

/// Counts taken from the raw dataset for the insight generator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetCounts {
    pub sources: usize,
    pub social_platforms: usize,
    pub articles: usize,
    pub contrarian_opportunities: usize,
}

impl SourceReading {
    pub fn new(source: String, score: f64) -> Self {
        Self {
            source,
            score,
            previous_score: score,
            change: 0.0,
            weight: 0.0,
            reliability: 0.0,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_reliability(mut self, reliability: f64) -> Self {
        self.reliability = reliability;
        self
    }

    pub fn with_previous_score(mut self, previous_score: f64) -> Self {
        self.previous_score = previous_score;
        self.change = self.score - previous_score;
        self
    }
}

impl HistoricalPoint {
    pub fn new(date: String, overall: f64) -> Self {
        Self {
            date,
            overall,
            analyst: overall,
            social: overall,
            volume: 0.0,
        }
    }
}

impl SentimentSnapshot {
    pub fn empty() -> Self {
        Self {
            sources: Vec::new(),
            historical: Vec::new(),
            news: Vec::new(),
            social_platforms: 0,
            contrarian_opportunities: 0,
            degraded: Vec::new(),
            fetched_at: Utc::now(),
        }
    }

    pub fn counts(&self) -> DatasetCounts {
        DatasetCounts {
            sources: self.sources.len(),
            social_platforms: self.social_platforms,
            articles: self.news.len(),
            contrarian_opportunities: self.contrarian_opportunities,
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}
