// Data sources for fetching sentiment and news payloads
use async_trait::async_trait;
use log::{debug, warn};
use rand::Rng;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use crate::error::FetchError;

pub const SENTIMENT_PATH: &str = "/api/sentiment";
pub const NEWS_PATH: &str = "/api/news/sentiment";

/// What a source's payload contains, which decides how it is normalized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Sentiment,
    News,
}

#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch(&self) -> Result<Value, FetchError>;
    fn name(&self) -> &str;
    fn kind(&self) -> SourceKind;
}

pub fn build_client(timeout: Duration) -> Result<Client, FetchError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| FetchError::from_reqwest("<client>", e))
}

/// JSON endpoint on the dashboard REST API
pub struct RestEndpoint {
    client: Client,
    name: String,
    url: String,
    kind: SourceKind,
}

impl RestEndpoint {
    pub fn new(client: Client, name: &str, base_url: &str, path: &str, kind: SourceKind) -> Self {
        Self {
            client,
            name: name.to_string(),
            url: format!("{}{}", base_url.trim_end_matches('/'), path),
            kind,
        }
    }

    pub fn sentiment(client: Client, base_url: &str) -> Self {
        Self::new(client, "Sentiment API", base_url, SENTIMENT_PATH, SourceKind::Sentiment)
    }

    pub fn news(client: Client, base_url: &str) -> Self {
        Self::new(client, "News API", base_url, NEWS_PATH, SourceKind::News)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl DataSource for RestEndpoint {
    async fn fetch(&self) -> Result<Value, FetchError> {
        debug!("GET {}", self.url);

        let response = self.client.get(&self.url).send().await
            .map_err(|e| FetchError::from_reqwest(&self.url, e))?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: self.url.clone(),
                status: response.status().as_u16(),
            });
        }

        response.json::<Value>().await
            .map_err(|e| FetchError::from_reqwest(&self.url, e))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }
}

/// Random payload generator for local development.
///
/// Only built when explicitly requested; every call logs a warning so
/// simulated numbers are never mistaken for live data.
pub struct SimulatedSource {
    kind: SourceKind,
}

impl SimulatedSource {
    pub fn new(kind: SourceKind) -> Self {
        Self { kind }
    }

    fn sentiment_payload(&self) -> Value {
        let mut rng = rand::thread_rng();
        let providers = [("Analysts", 0.35, 0.9), ("News", 0.25, 0.8), ("Social", 0.25, 0.6), ("Options", 0.15, 0.75)];

        let sources: Vec<Value> = providers.iter()
            .map(|(name, weight, reliability)| {
                let score: f64 = rng.gen_range(10.0..95.0);
                let previous: f64 = (score + rng.gen_range(-8.0..8.0)).clamp(0.0, 100.0);
                json!({
                    "source": name,
                    "score": score,
                    "previousScore": previous,
                    "weight": weight,
                    "reliability": reliability,
                })
            })
            .collect();

        let today = chrono::Utc::now().date_naive();
        let mut level: f64 = rng.gen_range(40.0..60.0);
        let historical: Vec<Value> = (0..30i64).rev()
            .map(|days_ago| {
                level = (level + rng.gen_range(-4.0..4.0)).clamp(5.0, 95.0);
                json!({
                    "date": (today - chrono::Duration::days(days_ago)).format("%Y-%m-%d").to_string(),
                    "overall": level,
                    "analyst": (level + rng.gen_range(-5.0..5.0)).clamp(0.0, 100.0),
                    "social": (level + rng.gen_range(-10.0..10.0)).clamp(0.0, 100.0),
                    "volume": rng.gen_range(500.0..5000.0),
                })
            })
            .collect();

        json!({
            "sources": sources,
            "historicalData": historical,
            "socialPlatforms": [{ "name": "Reddit" }, { "name": "X" }, { "name": "StockTwits" }],
            "contrarianOpportunities": [{ "symbol": "XYZ" }, { "symbol": "ABC" }],
        })
    }

    fn news_payload(&self) -> Value {
        let mut rng = rand::thread_rng();
        let headlines = [
            "Markets open mixed ahead of inflation data",
            "Tech earnings beat expectations",
            "Energy stocks fall on supply concerns",
        ];

        let articles: Vec<Value> = headlines.iter()
            .map(|headline| {
                json!({
                    "title": headline,
                    "source": { "name": "Simulated Wire" },
                    "publishedAt": chrono::Utc::now().to_rfc3339(),
                    "sentimentScore": rng.gen_range(0.0..100.0),
                    "confidence": rng.gen_range(0.5..1.0),
                })
            })
            .collect();

        json!({ "articles": articles })
    }
}

#[async_trait]
impl DataSource for SimulatedSource {
    async fn fetch(&self) -> Result<Value, FetchError> {
        warn!("Serving SIMULATED {:?} data; do not use outside development", self.kind);
        Ok(match self.kind {
            SourceKind::Sentiment => self.sentiment_payload(),
            SourceKind::News => self.news_payload(),
        })
    }

    fn name(&self) -> &str {
        match self.kind {
            SourceKind::Sentiment => "Simulated Sentiment",
            SourceKind::News => "Simulated News",
        }
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }
}
