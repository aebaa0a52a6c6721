// Normalization of heterogeneous API payloads into the canonical schema
//
// Canonical records and the field aliases accepted for each:
//
// SourceReading   source|name|provider, score|sentiment|value,
//                 previousScore|previous_score, change, weight, reliability
// HistoricalPoint date|timestamp, overall|score, analyst, social, volume
// NewsItem        publishedAt|published_at|created_at|timestamp,
//                 headline|title, source.name|source, sentiment,
//                 sentimentScore|sentiment_score|score, confidence
//
// Collections may arrive under a named key, either at the top level or
// nested in a `data` object. Only source readings and news items also
// accept a bare top-level array; history and auxiliary counts must be keyed
// so a bare array of readings is never read as a time series.
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use log::{debug, warn};
use serde_json::Value;

use crate::models::{HistoricalPoint, NewsItem, SentimentLabel, SourceReading};

pub const DEFAULT_SOURCE: &str = "Unknown";
pub const DEFAULT_HEADLINE: &str = "Untitled";
pub const NEUTRAL_SCORE: f64 = 50.0;

const SOURCE_KEYS: [&str; 2] = ["sources", "sourceBreakdown"];
const HISTORY_KEYS: [&str; 3] = ["historicalData", "historical", "history"];
const NEWS_KEYS: [&str; 4] = ["articles", "items", "news", "data"];
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Running tally of what normalization accepted and discarded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizationReport {
    pub accepted: usize,
    pub dropped: usize,
}

#[derive(Debug, Default)]
pub struct PayloadNormalizer {
    report: NormalizationReport,
}

impl PayloadNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self) -> &NormalizationReport {
        &self.report
    }

    /// Extract per-source readings. Scores are clamped to 0–100, weight
    /// and reliability to 0–1.
    pub fn source_readings(&mut self, payload: &Value) -> Vec<SourceReading> {
        let mut readings = Vec::new();

        for entry in collection(payload, &SOURCE_KEYS, true) {
            if !entry.is_object() {
                self.drop_entry("source reading", entry);
                continue;
            }

            let score = number(entry, &["score", "sentiment", "value"])
                .unwrap_or(NEUTRAL_SCORE)
                .clamp(0.0, 100.0);
            let previous_score = number(entry, &["previousScore", "previous_score"])
                .unwrap_or(score)
                .clamp(0.0, 100.0);
            let change = number(entry, &["change"]).unwrap_or(score - previous_score);

            readings.push(SourceReading {
                source: text(entry, &["source", "name", "provider"])
                    .unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
                score,
                previous_score,
                change,
                weight: number(entry, &["weight"]).unwrap_or(0.0).clamp(0.0, 1.0),
                reliability: number(entry, &["reliability"]).unwrap_or(0.0).clamp(0.0, 1.0),
            });
            self.report.accepted += 1;
        }

        readings
    }

    /// Extract the historical series, sorted ascending when every date parses
    pub fn historical(&mut self, payload: &Value) -> Vec<HistoricalPoint> {
        let mut points = Vec::new();

        for entry in collection(payload, &HISTORY_KEYS, false) {
            if !entry.is_object() {
                self.drop_entry("historical point", entry);
                continue;
            }

            points.push(HistoricalPoint {
                date: text(entry, &["date", "timestamp"]).unwrap_or_default(),
                overall: number(entry, &["overall", "score"]).unwrap_or(NEUTRAL_SCORE),
                analyst: number(entry, &["analyst"]).unwrap_or(NEUTRAL_SCORE),
                social: number(entry, &["social"]).unwrap_or(NEUTRAL_SCORE),
                volume: number(entry, &["volume"]).unwrap_or(0.0),
            });
            self.report.accepted += 1;
        }

        let keys: Option<Vec<DateTime<Utc>>> = points.iter().map(|p| parse_timestamp(&p.date)).collect();
        match keys {
            Some(keys) => {
                let mut keyed: Vec<(DateTime<Utc>, HistoricalPoint)> = keys.into_iter().zip(points).collect();
                keyed.sort_by_key(|(key, _)| *key);
                keyed.into_iter().map(|(_, point)| point).collect()
            }
            None => {
                debug!("Historical dates not all parseable, keeping payload order");
                points
            }
        }
    }

    pub fn news_items(&mut self, payload: &Value, is_real_time: bool) -> Vec<NewsItem> {
        let mut items = Vec::new();

        for entry in collection(payload, &NEWS_KEYS, true) {
            if !entry.is_object() {
                self.drop_entry("news item", entry);
                continue;
            }

            let sentiment_score = number(entry, &["sentimentScore", "sentiment_score", "score"])
                .unwrap_or(NEUTRAL_SCORE);
            let sentiment = text(entry, &["sentiment", "label"])
                .and_then(|label| SentimentLabel::parse(&label))
                .unwrap_or_else(|| SentimentLabel::from_score(sentiment_score));
            let timestamp = text(entry, &["publishedAt", "published_at", "created_at", "timestamp"])
                .and_then(|raw| parse_timestamp(&raw))
                .unwrap_or_else(Utc::now);

            items.push(NewsItem {
                timestamp,
                headline: text(entry, &["headline", "title"])
                    .unwrap_or_else(|| DEFAULT_HEADLINE.to_string()),
                source: news_source(entry),
                sentiment,
                sentiment_score,
                confidence: number(entry, &["confidence"]).unwrap_or(0.0),
                is_real_time,
            });
            self.report.accepted += 1;
        }

        items
    }

    /// Length of an auxiliary collection, e.g. `socialPlatforms`
    pub fn count_entries(&self, payload: &Value, key: &str) -> usize {
        collection(payload, &[key], false).len()
    }

    fn drop_entry(&mut self, kind: &str, entry: &Value) {
        warn!("Dropping malformed {}: {}", kind, entry);
        self.report.dropped += 1;
    }
}

/// Locate the array holding a collection inside `payload`
fn collection<'a>(payload: &'a Value, keys: &[&str], accept_bare: bool) -> &'a [Value] {
    if let Value::Array(entries) = payload {
        return if accept_bare { entries } else { &[] };
    }

    for key in keys {
        if let Some(Value::Array(entries)) = payload.get(*key) {
            return entries;
        }
    }

    if let Some(data) = payload.get("data").filter(|d| d.is_object()) {
        for key in keys {
            if let Some(Value::Array(entries)) = data.get(*key) {
                return entries;
            }
        }
    }

    &[]
}

fn field<'a>(entry: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| entry.get(*key))
        .find(|v| !v.is_null())
}

fn number(entry: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|key| entry.get(*key))
        .find_map(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        })
        .filter(|n| n.is_finite())
}

fn text(entry: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| entry.get(*key))
        .find_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

fn news_source(entry: &Value) -> String {
    match field(entry, &["source"]) {
        Some(Value::Object(source)) => source.get("name")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        _ => DEFAULT_SOURCE.to_string(),
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD` and unix epochs
/// in seconds or milliseconds, integral or fractional.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
    }
    if let Ok(epoch) = raw.parse::<i64>() {
        // Anything past 1e11 is treated as milliseconds
        return if epoch.abs() > EPOCH_MILLIS_THRESHOLD {
            Utc.timestamp_millis_opt(epoch).single()
        } else {
            Utc.timestamp_opt(epoch, 0).single()
        };
    }
    if let Some(epoch) = raw.parse::<f64>().ok().filter(|v| v.is_finite()) {
        let millis = if epoch.abs() > EPOCH_MILLIS_THRESHOLD as f64 { epoch } else { epoch * 1000.0 };
        return Utc.timestamp_millis_opt(millis.round() as i64).single();
    }

    None
}
