use std::env;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use log::info;

use sentiment_node::data_sources::{build_client, DataSource, RestEndpoint, NEWS_PATH};
use sentiment_node::live_feed::{HttpPollTransport, LiveFeed};
use sentiment_node::{NodeConfig, SentimentFetcher};

mod handlers;
mod models;
mod services;

use services::{spawn_refresh_loop, DashboardService};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize environment
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = NodeConfig::from_env();
    info!("Using sentiment API at: {}", config.api_base_url);

    let client = build_client(config.request_timeout())?;

    // Live feed polls the news endpoint; its lifecycle is owned here
    let feed = Arc::new(LiveFeed::new(config.feed_buffer_cap));
    let news_url = format!("{}{}", config.api_base_url.trim_end_matches('/'), NEWS_PATH);
    feed.initialize(Arc::new(HttpPollTransport::new(client.clone(), &news_url, config.poll_interval())));

    // Create services
    let dashboard_service = DashboardService::new(Arc::clone(&feed));
    let sources: Vec<Box<dyn DataSource>> = vec![
        Box::new(RestEndpoint::sentiment(client.clone(), &config.api_base_url)),
        Box::new(RestEndpoint::news(client, &config.api_base_url)),
    ];
    spawn_refresh_loop(dashboard_service.clone(), SentimentFetcher::new(sources), config.poll_interval());

    // Start HTTP server
    let bind_address = env::var("BIND_ADDRESS").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    info!("Starting server at {}", bind_address);

    HttpServer::new(move || {
        // Configure CORS
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(web::Data::new(dashboard_service.clone()))
            .configure(handlers::configure_routes)
    })
    .bind(bind_address)?
    .run()
    .await?;

    feed.dispose();
    Ok(())
}
