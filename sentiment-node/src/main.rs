// Sentiment Dashboard Node - fetches sentiment data and derives dashboard metrics
use clap::{Parser, Subcommand};
use log::{error, info};
use std::sync::Arc;
use tokio::time::sleep;

use sentiment_node::data_sources::{build_client, DataSource, RestEndpoint, SimulatedSource, SourceKind, NEWS_PATH};
use sentiment_node::health::HealthChecker;
use sentiment_node::live_feed::{ConnectionState, FeedEvent, HttpPollTransport, LiveFeed};
use sentiment_node::models::{Insight, SentimentMetrics};
use sentiment_node::{InsightGenerator, MetricsAggregator, NodeConfig, SentimentFetcher};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Base URL of the dashboard REST API (overrides SENTIMENT_API_BASE_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Per-request timeout in seconds (overrides REQUEST_TIMEOUT_SECS)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Use randomly generated payloads instead of the API (development only)
    #[arg(long, global = true, default_value_t = false)]
    simulate: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh metrics continuously
    Start {
        /// Refresh interval in seconds
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,
    },

    /// Run a single refresh and print metrics and insights
    Update,

    /// Test each data source individually
    TestSources,

    /// Check the API's health endpoints
    Health,

    /// Follow the live news feed
    Watch {
        /// Poll interval in seconds
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let cli = Cli::parse();

    let mut config = NodeConfig::from_env();
    if let Some(url) = cli.api_url.clone() {
        config.api_base_url = url;
    }
    if let Some(timeout) = cli.timeout {
        config.request_timeout_secs = timeout;
    }

    match cli.command {
        Commands::Start { interval } => {
            if let Some(interval) = interval {
                config.poll_interval_secs = interval;
            }
            start_node(&config, cli.simulate).await?;
        },
        Commands::Update => {
            run_single_update(&config, cli.simulate).await?;
        },
        Commands::TestSources => {
            test_data_sources(&config, cli.simulate).await?;
        },
        Commands::Health => {
            check_health(&config).await?;
        },
        Commands::Watch { interval } => {
            if let Some(interval) = interval {
                config.poll_interval_secs = interval;
            }
            watch_feed(&config).await?;
        },
    }

    Ok(())
}

fn build_sources(config: &NodeConfig, simulate: bool) -> anyhow::Result<Vec<Box<dyn DataSource>>> {
    if simulate {
        log::warn!("--simulate set: all data below is randomly generated");
        let simulated: Vec<Box<dyn DataSource>> = vec![
            Box::new(SimulatedSource::new(SourceKind::Sentiment)),
            Box::new(SimulatedSource::new(SourceKind::News)),
        ];
        return Ok(simulated);
    }

    let client = build_client(config.request_timeout())?;
    let sources: Vec<Box<dyn DataSource>> = vec![
        Box::new(RestEndpoint::sentiment(client.clone(), &config.api_base_url)),
        Box::new(RestEndpoint::news(client, &config.api_base_url)),
    ];
    Ok(sources)
}

async fn start_node(config: &NodeConfig, simulate: bool) -> anyhow::Result<()> {
    info!("Starting sentiment node against {}", config.api_base_url);

    let fetcher = SentimentFetcher::new(build_sources(config, simulate)?);
    let aggregator = MetricsAggregator::new();
    let insights = InsightGenerator::new();

    info!("Refresh interval: {} seconds", config.poll_interval_secs);

    loop {
        match run_refresh(&fetcher, &aggregator, &insights).await {
            Ok((metrics, _)) => {
                info!("Refresh successful: overall={:.1} momentum={:+.2}% confidence={:.0}",
                      metrics.overall, metrics.momentum, metrics.confidence);
            },
            Err(e) => {
                error!("Refresh failed: {}", e);
            }
        }

        sleep(config.poll_interval()).await;
    }
}

async fn run_single_update(config: &NodeConfig, simulate: bool) -> anyhow::Result<()> {
    let fetcher = SentimentFetcher::new(build_sources(config, simulate)?);
    let aggregator = MetricsAggregator::new();
    let insights = InsightGenerator::new();

    let (metrics, insight) = run_refresh(&fetcher, &aggregator, &insights).await?;

    println!("Sentiment Metrics:");
    println!("Overall: {:.1}", metrics.overall);
    println!("Momentum: {:+.2}%", metrics.momentum);
    println!("Volatility: {:.2}%", metrics.volatility);
    println!("Extreme readings: {}", metrics.extreme_readings);
    println!("Contrarian signal: {:.0}%", metrics.contrarian);
    println!("Confidence: {:.0}%", metrics.confidence);
    println!("Divergence: {:.0}", metrics.divergence);
    println!();
    println!("Summary: {}", insight.market_summary);
    println!("Forecast: {}", insight.forecast);
    for opportunity in &insight.opportunities {
        println!("  + {}", opportunity);
    }
    for risk in &insight.risks {
        println!("  - {}", risk);
    }
    println!("Model stats (synthetic): {:?}", insight.model_stats);

    Ok(())
}

async fn test_data_sources(config: &NodeConfig, simulate: bool) -> anyhow::Result<()> {
    let fetcher = SentimentFetcher::new(build_sources(config, simulate)?);

    for outcome in fetcher.fetch_all().await {
        match outcome.result {
            Ok(_) => println!("{}: OK", outcome.source),
            Err(e) => println!("{}: Error - {}", outcome.source, e),
        }
    }

    Ok(())
}

async fn check_health(config: &NodeConfig) -> anyhow::Result<()> {
    let checker = HealthChecker::new(build_client(config.request_timeout())?, &config.api_base_url);
    let report = checker.run().await;

    for check in &report.checks {
        println!("{:<24} {:<9} {:>5}ms  {}",
                 check.endpoint, format!("{:?}", check.status), check.latency_ms, check.detail);
    }
    println!("Overall: {:?}", report.overall());

    Ok(())
}

async fn watch_feed(config: &NodeConfig) -> anyhow::Result<()> {
    let client = build_client(config.request_timeout())?;
    let url = format!("{}{}", config.api_base_url.trim_end_matches('/'), NEWS_PATH);
    let transport = HttpPollTransport::new(client, &url, config.poll_interval());

    let feed = LiveFeed::new(config.feed_buffer_cap);
    let (done_tx, mut done_rx) = tokio::sync::mpsc::unbounded_channel();

    feed.subscribe(move |event| match event {
        FeedEvent::Batch(items) => {
            for item in items {
                println!("[{}] {:?} {:>5.1} {} ({})",
                         item.timestamp.format("%H:%M:%S"), item.sentiment,
                         item.sentiment_score, item.headline, item.source);
            }
        },
        FeedEvent::StateChanged(state) => {
            info!("Feed {:?}", state);
            let _ = done_tx.send(*state);
        },
    });

    feed.initialize(Arc::new(transport));

    // Runs until the feed disconnects; no automatic reconnect
    while let Some(state) = done_rx.recv().await {
        if state == ConnectionState::Disconnected {
            break;
        }
    }

    feed.dispose();
    error!("Live feed disconnected");
    Ok(())
}

async fn run_refresh(
    fetcher: &SentimentFetcher,
    aggregator: &MetricsAggregator,
    insights: &InsightGenerator,
) -> anyhow::Result<(SentimentMetrics, Insight)> {
    info!("Fetching from {} sources", fetcher.source_count());

    let snapshot = fetcher.refresh().await?;
    for degraded in &snapshot.degraded {
        error!("Source degraded: {} ({})", degraded.source, degraded.reason);
    }

    let metrics = aggregator.aggregate_snapshot(&snapshot);
    let insight = insights.generate(&metrics, &snapshot.counts());

    Ok((metrics, insight))
}
