// Templated insight text built from computed metrics
use crate::models::{DatasetCounts, Insight, ModelStats, SentimentMetrics};

const OPPORTUNITY_CANDIDATES: [&str; 5] = [
    "Contrarian entries where crowd sentiment has reached an extreme",
    "Sectors where analyst sentiment leads social sentiment",
    "Names with improving sentiment momentum but flat price action",
    "Mean-reversion setups in sources with high divergence",
    "Accumulation during low-volatility sentiment regimes",
];

const RISK_CANDIDATES: [&str; 4] = [
    "Sentiment extremes often precede sharp reversals",
    "Low source agreement reduces signal reliability",
    "Social sentiment can shift quickly on headline news",
    "Elevated sentiment volatility increases whipsaw risk",
];

pub struct InsightGenerator;

impl InsightGenerator {
    pub fn new() -> Self {
        Self {}
    }

    /// Build the insight for `metrics`. The output depends only on its
    /// inputs, so identical inputs give identical text.
    pub fn generate(&self, metrics: &SentimentMetrics, counts: &DatasetCounts) -> Insight {
        Insight {
            market_summary: self.market_summary(metrics),
            opportunities: self.opportunities(counts),
            risks: self.risks(metrics),
            forecast: self.forecast(metrics),
            technical_details: self.technical_details(metrics, counts),
            model_stats: self.model_stats(metrics, counts),
        }
    }

    fn market_summary(&self, metrics: &SentimentMetrics) -> String {
        let stance = if metrics.overall >= 60.0 {
            "bullish"
        } else if metrics.overall >= 40.0 {
            "neutral"
        } else {
            "bearish"
        };
        let direction = if metrics.momentum > 0.0 { "improving" } else { "deteriorating" };

        let mut summary = format!(
            "Overall market sentiment is {} at {:.1} with {} momentum ({:+.1}%).",
            stance, metrics.overall, direction, metrics.momentum
        );

        if metrics.contrarian > 50.0 {
            summary.push_str(&format!(
                " {:.0}% of sources are at extreme readings, raising the likelihood of a contrarian reversal.",
                metrics.contrarian
            ));
        }

        summary
    }

    fn opportunities(&self, counts: &DatasetCounts) -> Vec<String> {
        let take = counts.contrarian_opportunities.clamp(1, OPPORTUNITY_CANDIDATES.len());
        OPPORTUNITY_CANDIDATES[..take].iter().map(|s| s.to_string()).collect()
    }

    fn risks(&self, metrics: &SentimentMetrics) -> Vec<String> {
        let take = (metrics.extreme_readings + 2).min(4).max(2);
        RISK_CANDIDATES[..take].iter().map(|s| s.to_string()).collect()
    }

    fn forecast(&self, metrics: &SentimentMetrics) -> String {
        if metrics.momentum > 0.0 {
            format!(
                "Positive momentum of {:+.1}% suggests sentiment continues to improve over the next 1-2 weeks, \
                 with confidence at {:.0}%.",
                metrics.momentum, metrics.confidence
            )
        } else {
            format!(
                "Momentum of {:+.1}% suggests sentiment stays under pressure over the next 1-2 weeks, \
                 with confidence at {:.0}%.",
                metrics.momentum, metrics.confidence
            )
        }
    }

    fn technical_details(&self, metrics: &SentimentMetrics, counts: &DatasetCounts) -> String {
        format!(
            "Weighted sentiment {:.1} across {} sources. Momentum {:+.2}%, annualized volatility {:.2}%. \
             {} extreme readings (contrarian signal {:.0}%), source divergence {:.0}, confidence {:.0}%.",
            metrics.overall,
            counts.sources,
            metrics.momentum,
            metrics.volatility,
            metrics.extreme_readings,
            metrics.contrarian,
            metrics.divergence,
            metrics.confidence,
        )
    }

    /// Synthetic display values derived from confidence. Not an evaluation
    /// of any model.
    fn model_stats(&self, metrics: &SentimentMetrics, counts: &DatasetCounts) -> ModelStats {
        let confidence = metrics.confidence.max(0.0);
        let band = |base: f64, divisor: f64, min: f64, max: f64| {
            (base + (confidence / divisor).floor()).clamp(min, max) as u32
        };

        ModelStats {
            accuracy: band(75.0, 5.0, 70.0, 95.0),
            precision: band(70.0, 6.0, 65.0, 92.0),
            recall: band(68.0, 7.0, 60.0, 90.0),
            data_sources: counts.sources + counts.social_platforms + counts.articles / 10,
        }
    }
}

impl Default for InsightGenerator {
    fn default() -> Self {
        Self::new()
    }
}
