// Sentiment dashboard node - fetches sentiment data and derives dashboard metrics
pub mod aggregator;
pub mod config;
pub mod data_sources;
pub mod error;
pub mod fetcher;
pub mod health;
pub mod insights;
pub mod live_feed;
pub mod metrics;
pub mod models;
pub mod normalizer;

pub use aggregator::MetricsAggregator;
pub use config::NodeConfig;
pub use error::FetchError;
pub use fetcher::SentimentFetcher;
pub use insights::InsightGenerator;
pub use live_feed::LiveFeed;
