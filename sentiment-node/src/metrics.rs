// Metric primitives over sentiment readings and history
//
// Every function here is total: empty input yields 0 instead of an error.
use crate::models::{HistoricalPoint, SourceReading};

/// Number of points in each momentum window
pub const MOMENTUM_WINDOW: usize = 5;

/// Trading days per year used to annualize volatility. Applied to the
/// series regardless of its actual cadence.
pub const ANNUALIZATION_DAYS: f64 = 252.0;

pub const EXTREME_HIGH: f64 = 80.0;
pub const EXTREME_LOW: f64 = 20.0;

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation
fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = mean(values);
    let variance = values.iter()
        .map(|v| (v - mean).powi(2))
        .sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Relative change (percent) between the mean of the last five `overall`
/// values and the mean of the five before them.
///
/// Returns 0 with fewer than five points, or when the older window is
/// empty or averages to zero.
pub fn momentum(history: &[HistoricalPoint]) -> f64 {
    if history.len() < MOMENTUM_WINDOW {
        return 0.0;
    }

    let len = history.len();
    let recent: Vec<f64> = history[len - MOMENTUM_WINDOW..].iter().map(|p| p.overall).collect();
    let older_start = len.saturating_sub(MOMENTUM_WINDOW * 2);
    let older: Vec<f64> = history[older_start..len - MOMENTUM_WINDOW].iter().map(|p| p.overall).collect();

    let recent_avg = mean(&recent);
    let older_avg = mean(&older);

    if older_avg == 0.0 {
        return 0.0;
    }

    (recent_avg - older_avg) / older_avg * 100.0
}

/// Annualized standard deviation of period-over-period relative changes
/// of `overall`, in percent. Steps from a zero value are skipped.
pub fn volatility(history: &[HistoricalPoint]) -> f64 {
    let changes: Vec<f64> = history.windows(2)
        .filter(|pair| pair[0].overall != 0.0)
        .map(|pair| (pair[1].overall - pair[0].overall) / pair[0].overall)
        .collect();

    if changes.is_empty() {
        return 0.0;
    }

    std_dev(&changes) * 100.0 * ANNUALIZATION_DAYS.sqrt()
}

pub fn is_extreme(score: f64) -> bool {
    score > EXTREME_HIGH || score < EXTREME_LOW
}

/// Sources scoring strictly above 80 or strictly below 20
pub fn extreme_readings_count(sources: &[SourceReading]) -> usize {
    sources.iter().filter(|s| is_extreme(s.score)).count()
}

/// Share of sources at an extreme, as a rounded percentage
pub fn contrarian_signal(sources: &[SourceReading]) -> f64 {
    if sources.is_empty() {
        return 0.0;
    }
    let extreme = extreme_readings_count(sources) as f64;
    (extreme / sources.len() as f64 * 100.0).round()
}

/// Σ reliability × weight scaled to 0–100, rounded
pub fn confidence_score(sources: &[SourceReading]) -> f64 {
    let weighted: f64 = sources.iter()
        .map(|s| s.reliability * s.weight)
        .sum();
    (weighted * 100.0).round()
}

/// Cross-source dispersion: population standard deviation of scores, rounded
pub fn divergence(sources: &[SourceReading]) -> f64 {
    let scores: Vec<f64> = sources.iter().map(|s| s.score).collect();
    std_dev(&scores).round()
}
