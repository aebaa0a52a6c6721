// Metrics aggregation over a sentiment snapshot
use log::{debug, warn};

use crate::metrics;
use crate::models::{HistoricalPoint, SentimentMetrics, SentimentSnapshot, SourceReading};

/// Tuning for the aggregator's sanity checks
#[derive(Debug, Clone)]
pub struct AggregatorParams {
    /// How far the weight sum may stray from 1.0 before a warning is logged
    pub weight_sum_tolerance: f64,
}

impl Default for AggregatorParams {
    fn default() -> Self {
        Self {
            weight_sum_tolerance: 0.01,
        }
    }
}

pub struct MetricsAggregator {
    params: AggregatorParams,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self {
            params: AggregatorParams::default(),
        }
    }

    pub fn with_params(params: AggregatorParams) -> Self {
        Self { params }
    }

    /// Compose the metric primitives into one summary.
    ///
    /// `overall` is Σ score × weight without dividing by Σ weight, so it
    /// only stays inside 0–100 when the weights sum to 1.
    pub fn aggregate(&self, sources: &[SourceReading], historical: &[HistoricalPoint]) -> SentimentMetrics {
        if sources.is_empty() {
            debug!("No source readings, returning zeroed metrics");
            return SentimentMetrics::default();
        }

        let weight_sum: f64 = sources.iter().map(|s| s.weight).sum();
        if (weight_sum - 1.0).abs() > self.params.weight_sum_tolerance {
            warn!(
                "Source weights sum to {:.3}; overall sentiment is not renormalized and may leave 0-100",
                weight_sum
            );
        }

        let overall = self.calculate_overall(sources);

        SentimentMetrics {
            overall,
            momentum: metrics::momentum(historical),
            volatility: metrics::volatility(historical),
            extreme_readings: metrics::extreme_readings_count(sources),
            contrarian: metrics::contrarian_signal(sources),
            confidence: metrics::confidence_score(sources),
            divergence: metrics::divergence(sources),
        }
    }

    pub fn aggregate_snapshot(&self, snapshot: &SentimentSnapshot) -> SentimentMetrics {
        self.aggregate(&snapshot.sources, &snapshot.historical)
    }

    fn calculate_overall(&self, sources: &[SourceReading]) -> f64 {
        sources.iter()
            .map(|s| s.score * s.weight)
            .sum()
    }
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}
