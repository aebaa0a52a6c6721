use actix_web::{get, web, HttpResponse, Responder, ResponseError};
use log::info;

use crate::models::RecentNewsQuery;
use crate::services::DashboardService;

/// Get the latest sentiment metrics
#[get("/api/sentiment/metrics")]
pub async fn get_metrics(dashboard: web::Data<DashboardService>) -> impl Responder {
    info!("GET /api/sentiment/metrics");

    match dashboard.get_metrics() {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => e.error_response(),
    }
}

/// Get the insight generated from the latest metrics
#[get("/api/sentiment/insights")]
pub async fn get_insights(dashboard: web::Data<DashboardService>) -> impl Responder {
    info!("GET /api/sentiment/insights");

    match dashboard.get_insight() {
        Ok(insight) => HttpResponse::Ok().json(insight),
        Err(e) => e.error_response(),
    }
}

/// Get the normalized snapshot the metrics were computed from
#[get("/api/sentiment/snapshot")]
pub async fn get_snapshot(dashboard: web::Data<DashboardService>) -> impl Responder {
    info!("GET /api/sentiment/snapshot");

    match dashboard.get_snapshot() {
        Ok(snapshot) => HttpResponse::Ok().json(snapshot),
        Err(e) => e.error_response(),
    }
}

/// Get recent news, newest first
#[get("/api/news/recent")]
pub async fn get_recent_news(
    query: web::Query<RecentNewsQuery>,
    dashboard: web::Data<DashboardService>,
) -> impl Responder {
    info!("GET /api/news/recent - limit: {:?}", query.limit);

    match dashboard.get_recent_news(query.limit) {
        Ok(items) => HttpResponse::Ok().json(items),
        Err(e) => e.error_response(),
    }
}

#[get("/health")]
pub async fn health(dashboard: web::Data<DashboardService>) -> impl Responder {
    HttpResponse::Ok().json(dashboard.health())
}

/// Register all handlers with the app
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(get_metrics)
       .service(get_insights)
       .service(get_snapshot)
       .service(get_recent_news)
       .service(health);
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, App};
    use serde_json::Value;
    use std::sync::Arc;

    use sentiment_node::live_feed::{LiveFeed, DEFAULT_BUFFER_CAP};
    use sentiment_node::models::{HistoricalPoint, SentimentSnapshot, SourceReading};

    fn dashboard() -> DashboardService {
        DashboardService::new(Arc::new(LiveFeed::new(DEFAULT_BUFFER_CAP)))
    }

    fn snapshot() -> SentimentSnapshot {
        let mut snapshot = SentimentSnapshot::empty();
        snapshot.sources = vec![
            SourceReading::new("Analysts".to_string(), 70.0).with_weight(0.6).with_reliability(0.9),
            SourceReading::new("Social".to_string(), 55.0).with_weight(0.4).with_reliability(0.7),
        ];
        snapshot.historical = (0..10)
            .map(|i| HistoricalPoint::new(format!("2024-04-{:02}", i + 1), if i < 5 { 50.0 } else { 60.0 }))
            .collect();
        snapshot.social_platforms = 2;
        snapshot
    }

    #[actix_web::test]
    async fn test_metrics_unavailable_before_refresh() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(dashboard()))
                .configure(configure_routes),
        ).await;

        let req = test::TestRequest::get().uri("/api/sentiment/metrics").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "starting");
        assert_eq!(body["feed"], "disconnected");
    }

    #[actix_web::test]
    async fn test_metrics_and_insights_after_refresh() {
        let service = dashboard();
        service.apply_snapshot(snapshot());

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(service))
                .configure(configure_routes),
        ).await;

        let req = test::TestRequest::get().uri("/api/sentiment/metrics").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["metrics"]["overall"], 64.0);
        assert_eq!(body["metrics"]["momentum"], 20.0);
        assert_eq!(body["metrics"]["confidence"], 82.0);
        assert_eq!(body["metrics"]["extremeReadings"], 0);

        let req = test::TestRequest::get().uri("/api/sentiment/insights").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert!(body["marketSummary"].as_str().unwrap().contains("bullish"));
        assert_eq!(body["risks"].as_array().unwrap().len(), 2);
        assert_eq!(body["modelStats"]["dataSources"], 4);
    }

    #[actix_web::test]
    async fn test_recent_news_rejects_zero_limit() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(dashboard()))
                .configure(configure_routes),
        ).await;

        let req = test::TestRequest::get().uri("/api/news/recent?limit=0").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get().uri("/api/news/recent").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.as_array().unwrap().len(), 0);
    }
}
