// Service health checks against the dashboard REST API
use log::{info, warn};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;

pub const HEALTH_ENDPOINTS: [&str; 3] = ["/health", "/health/database", "/health/update-status"];

/// Ordered from best to worst so the worst status is the maximum
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Down,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    pub endpoint: String,
    pub status: HealthStatus,
    pub latency_ms: u64,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub checks: Vec<HealthCheck>,
}

impl HealthReport {
    /// Worst status across all checks; an empty report counts as down
    pub fn overall(&self) -> HealthStatus {
        self.checks.iter()
            .map(|c| c.status)
            .max()
            .unwrap_or(HealthStatus::Down)
    }
}

/// Map a 2xx body to a status using its `status` field
pub fn classify_body(body: &Value) -> (HealthStatus, String) {
    match body.get("status").and_then(Value::as_str) {
        Some(status) => {
            let normalized = status.trim().to_lowercase();
            let health = match normalized.as_str() {
                "ok" | "healthy" | "up" => HealthStatus::Healthy,
                _ => HealthStatus::Degraded,
            };
            (health, status.to_string())
        }
        None => (HealthStatus::Degraded, "response has no status field".to_string()),
    }
}

pub struct HealthChecker {
    client: Client,
    base_url: String,
}

impl HealthChecker {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Check every endpoint one after another
    pub async fn run(&self) -> HealthReport {
        let mut checks = Vec::with_capacity(HEALTH_ENDPOINTS.len());
        for endpoint in HEALTH_ENDPOINTS {
            checks.push(self.check(endpoint).await);
        }

        let report = HealthReport { checks };
        info!("Health check complete: {:?}", report.overall());
        report
    }

    pub async fn check(&self, endpoint: &str) -> HealthCheck {
        let url = format!("{}{}", self.base_url, endpoint);
        let start = Instant::now();
        let result = self.client.get(&url).send().await;

        let (status, detail) = match result {
            Ok(response) if response.status().is_success() => {
                match response.json::<Value>().await {
                    Ok(body) => classify_body(&body),
                    Err(e) => (HealthStatus::Degraded, format!("unreadable body: {}", e)),
                }
            }
            Ok(response) => (HealthStatus::Down, format!("HTTP {}", response.status().as_u16())),
            Err(e) => {
                warn!("Health check {} failed: {}", url, e);
                (HealthStatus::Down, e.to_string())
            }
        };

        HealthCheck {
            endpoint: endpoint.to_string(),
            status,
            latency_ms: start.elapsed().as_millis() as u64,
            detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn check(status: HealthStatus) -> HealthCheck {
        HealthCheck {
            endpoint: "/health".to_string(),
            status,
            latency_ms: 1,
            detail: String::new(),
        }
    }

    #[test]
    fn test_classify_body() {
        assert_eq!(classify_body(&json!({ "status": "ok" })).0, HealthStatus::Healthy);
        assert_eq!(classify_body(&json!({ "status": "Healthy" })).0, HealthStatus::Healthy);
        assert_eq!(classify_body(&json!({ "status": "stale" })).0, HealthStatus::Degraded);
        assert_eq!(classify_body(&json!({})).0, HealthStatus::Degraded);
    }

    #[test]
    fn test_overall_is_worst_status() {
        let report = HealthReport {
            checks: vec![check(HealthStatus::Healthy), check(HealthStatus::Degraded)],
        };
        assert_eq!(report.overall(), HealthStatus::Degraded);

        let down = HealthReport {
            checks: vec![check(HealthStatus::Down), check(HealthStatus::Healthy)],
        };
        assert_eq!(down.overall(), HealthStatus::Down);

        assert_eq!(HealthReport { checks: Vec::new() }.overall(), HealthStatus::Down);
    }

    #[tokio::test]
    async fn test_unreachable_service_is_down() {
        let client = Client::builder().timeout(Duration::from_millis(500)).build().unwrap();
        let checker = HealthChecker::new(client, "http://127.0.0.1:9/");

        let report = checker.run().await;
        assert_eq!(report.checks.len(), 3);
        assert_eq!(report.checks[1].endpoint, "/health/database");
        assert_eq!(report.overall(), HealthStatus::Down);
    }
}
