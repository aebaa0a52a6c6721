// Live news feed: push transport, bounded recent buffer and typed pub/sub
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::FetchError;
use crate::models::NewsItem;
use crate::normalizer::PayloadNormalizer;

pub const DEFAULT_BUFFER_CAP: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Event delivered to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Batch(Vec<NewsItem>),
    StateChanged(ConnectionState),
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Raw message coming off a push channel
#[derive(Debug, Clone)]
pub enum TransportMessage {
    Payload(Value),
    Error(String),
}

#[async_trait]
pub trait FeedTransport: Send + Sync {
    /// Open the channel. Messages arrive on the returned receiver until the
    /// sender side is dropped.
    async fn connect(&self) -> Result<mpsc::Receiver<TransportMessage>, FetchError>;
    fn name(&self) -> &str;
}

/// Newest-first buffer that drops the oldest items past its capacity
#[derive(Debug, Clone)]
pub struct RecentBuffer {
    items: VecDeque<NewsItem>,
    cap: usize,
}

impl RecentBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(cap),
            cap,
        }
    }

    /// Prepend a batch, keeping the batch's own order at the front
    pub fn push_batch(&mut self, batch: &[NewsItem]) {
        for item in batch.iter().rev() {
            self.items.push_front(item.clone());
        }
        self.items.truncate(self.cap);
    }

    pub fn items(&self) -> Vec<NewsItem> {
        self.items.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }
}

type Callback = Arc<dyn Fn(&FeedEvent) + Send + Sync>;

struct Shared {
    subscribers: Mutex<HashMap<SubscriptionId, Callback>>,
    state: Mutex<ConnectionState>,
    recent: Mutex<RecentBuffer>,
    next_id: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Shared {
    fn publish(&self, event: &FeedEvent) {
        // Snapshot the callbacks so one may unsubscribe while being called
        let callbacks: Vec<Callback> = lock(&self.subscribers).values().cloned().collect();
        for callback in callbacks {
            callback(event);
        }
    }

    fn set_state(&self, next: ConnectionState) {
        {
            let mut state = lock(&self.state);
            if *state == next {
                return;
            }
            *state = next;
        }
        debug!("Live feed state -> {:?}", next);
        self.publish(&FeedEvent::StateChanged(next));
    }
}

/// Live-update listener. Owned by the application: call `initialize` with a
/// transport to start it and `dispose` to stop it.
pub struct LiveFeed {
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl LiveFeed {
    pub fn new(buffer_cap: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                subscribers: Mutex::new(HashMap::new()),
                state: Mutex::new(ConnectionState::Disconnected),
                recent: Mutex::new(RecentBuffer::new(buffer_cap)),
                next_id: AtomicU64::new(1),
            }),
            task: Mutex::new(None),
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&FeedEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.shared.subscribers).insert(id, Arc::new(callback));
        id
    }

    /// Remove one subscriber. The channel stays open for the others.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        lock(&self.shared.subscribers).remove(&id).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.shared.subscribers).len()
    }

    pub fn state(&self) -> ConnectionState {
        *lock(&self.shared.state)
    }

    pub fn recent(&self) -> Vec<NewsItem> {
        lock(&self.shared.recent).items()
    }

    /// Start listening on `transport`, replacing any running connection.
    /// Must be called from within a tokio runtime.
    pub fn initialize(&self, transport: Arc<dyn FeedTransport>) {
        let mut task = lock(&self.task);
        if let Some(previous) = task.take() {
            previous.abort();
        }

        info!("Starting live feed on {}", transport.name());
        let shared = Arc::clone(&self.shared);
        *task = Some(tokio::spawn(run_feed(shared, transport)));
    }

    pub fn dispose(&self) {
        if let Some(handle) = lock(&self.task).take() {
            handle.abort();
        }
        self.shared.set_state(ConnectionState::Disconnected);
    }
}

impl Drop for LiveFeed {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.task).take() {
            handle.abort();
        }
    }
}

async fn run_feed(shared: Arc<Shared>, transport: Arc<dyn FeedTransport>) {
    shared.set_state(ConnectionState::Connecting);

    let mut rx = match transport.connect().await {
        Ok(rx) => rx,
        Err(e) => {
            warn!("Live feed connection to {} failed: {}", transport.name(), e);
            shared.set_state(ConnectionState::Disconnected);
            return;
        }
    };

    shared.set_state(ConnectionState::Connected);
    let mut normalizer = PayloadNormalizer::new();

    while let Some(message) = rx.recv().await {
        match message {
            TransportMessage::Payload(payload) => {
                let items = normalizer.news_items(&payload, true);
                if items.is_empty() {
                    continue;
                }
                debug!("Live feed received {} items", items.len());
                lock(&shared.recent).push_batch(&items);
                shared.publish(&FeedEvent::Batch(items));
            }
            TransportMessage::Error(reason) => {
                warn!("Live feed error from {}: {}", transport.name(), reason);
                break;
            }
        }
    }

    shared.set_state(ConnectionState::Disconnected);
}

/// Transport fed by an in-process sender, for bridging any push source
pub struct ChannelTransport {
    receiver: Mutex<Option<mpsc::Receiver<TransportMessage>>>,
}

impl ChannelTransport {
    pub fn new(buffer: usize) -> (Self, mpsc::Sender<TransportMessage>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { receiver: Mutex::new(Some(rx)) }, tx)
    }
}

#[async_trait]
impl FeedTransport for ChannelTransport {
    async fn connect(&self) -> Result<mpsc::Receiver<TransportMessage>, FetchError> {
        lock(&self.receiver).take().ok_or_else(|| {
            FetchError::ChannelUnavailable("receiver already taken by an earlier connect".to_string())
        })
    }

    fn name(&self) -> &str {
        "in-process channel"
    }
}

/// Polls a JSON news endpoint and forwards each body as one batch
pub struct HttpPollTransport {
    client: Client,
    url: String,
    interval: Duration,
}

impl HttpPollTransport {
    pub fn new(client: Client, url: &str, interval: Duration) -> Self {
        Self {
            client,
            url: url.to_string(),
            interval,
        }
    }
}

async fn poll_once(client: &Client, url: &str) -> Result<Value, FetchError> {
    let response = client.get(url).send().await
        .map_err(|e| FetchError::from_reqwest(url, e))?;

    if !response.status().is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }

    response.json::<Value>().await
        .map_err(|e| FetchError::from_reqwest(url, e))
}

#[async_trait]
impl FeedTransport for HttpPollTransport {
    async fn connect(&self) -> Result<mpsc::Receiver<TransportMessage>, FetchError> {
        // The first poll doubles as the connection check
        let first = poll_once(&self.client, &self.url).await?;

        let (tx, rx) = mpsc::channel(16);
        let client = self.client.clone();
        let url = self.url.clone();
        let interval = self.interval;

        tokio::spawn(async move {
            let mut last = first.clone();
            if tx.send(TransportMessage::Payload(first)).await.is_err() {
                return;
            }
            loop {
                // Stop as soon as the feed drops its receiver, even while
                // the body is unchanged and nothing is being sent
                tokio::select! {
                    _ = tx.closed() => return,
                    _ = tokio::time::sleep(interval) => {}
                }
                let message = match poll_once(&client, &url).await {
                    // Unchanged body, nothing new to publish
                    Ok(payload) if payload == last => continue,
                    Ok(payload) => {
                        last = payload.clone();
                        TransportMessage::Payload(payload)
                    }
                    Err(e) => TransportMessage::Error(e.to_string()),
                };
                let is_error = matches!(message, TransportMessage::Error(_));
                if tx.send(message).await.is_err() || is_error {
                    return;
                }
            }
        });

        Ok(rx)
    }

    fn name(&self) -> &str {
        &self.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SentimentLabel;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::{sleep, timeout};

    fn item(headline: &str) -> NewsItem {
        NewsItem {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            headline: headline.to_string(),
            source: "Test".to_string(),
            sentiment: SentimentLabel::Neutral,
            sentiment_score: 50.0,
            confidence: 0.5,
            is_real_time: true,
        }
    }

    fn collector(feed: &LiveFeed) -> (SubscriptionId, UnboundedReceiver<FeedEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = feed.subscribe(move |event| {
            let _ = tx.send(event.clone());
        });
        (id, rx)
    }

    async fn next_event(rx: &mut UnboundedReceiver<FeedEvent>) -> FeedEvent {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for feed event")
            .expect("feed closed")
    }

    async fn next_batch(rx: &mut UnboundedReceiver<FeedEvent>) -> Vec<NewsItem> {
        loop {
            if let FeedEvent::Batch(items) = next_event(rx).await {
                return items;
            }
        }
    }

    fn headlines_payload(headlines: &[&str]) -> TransportMessage {
        let articles: Vec<Value> = headlines.iter().map(|h| json!({ "title": h, "score": 50 })).collect();
        TransportMessage::Payload(json!({ "articles": articles }))
    }

    #[test]
    fn test_recent_buffer_newest_first_and_capped() {
        let mut buffer = RecentBuffer::new(3);
        buffer.push_batch(&[item("a"), item("b")]);
        buffer.push_batch(&[item("c"), item("d")]);

        let headlines: Vec<String> = buffer.items().into_iter().map(|i| i.headline).collect();
        assert_eq!(headlines, vec!["c", "d", "a"]);
        assert_eq!(buffer.len(), buffer.cap());
    }

    #[tokio::test]
    async fn test_state_transitions_and_batches() {
        let feed = LiveFeed::new(DEFAULT_BUFFER_CAP);
        let (_, mut events) = collector(&feed);
        let (transport, tx) = ChannelTransport::new(8);

        feed.initialize(Arc::new(transport));
        assert_eq!(next_event(&mut events).await, FeedEvent::StateChanged(ConnectionState::Connecting));
        assert_eq!(next_event(&mut events).await, FeedEvent::StateChanged(ConnectionState::Connected));

        tx.send(headlines_payload(&["first", "second"])).await.unwrap();
        let batch = next_batch(&mut events).await;
        assert_eq!(batch.len(), 2);
        assert!(batch.iter().all(|i| i.is_real_time));
        assert_eq!(feed.recent().len(), 2);

        drop(tx);
        assert_eq!(next_event(&mut events).await, FeedEvent::StateChanged(ConnectionState::Disconnected));
        assert_eq!(feed.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_unsubscribed_callback_stops_receiving() {
        let feed = LiveFeed::new(DEFAULT_BUFFER_CAP);
        let (first_id, mut first) = collector(&feed);
        let (_, mut second) = collector(&feed);
        let (transport, tx) = ChannelTransport::new(8);
        feed.initialize(Arc::new(transport));

        tx.send(headlines_payload(&["one"])).await.unwrap();
        assert_eq!(next_batch(&mut first).await.len(), 1);
        assert_eq!(next_batch(&mut second).await.len(), 1);

        assert!(feed.unsubscribe(first_id));
        assert!(!feed.unsubscribe(first_id));
        assert_eq!(feed.subscriber_count(), 1);

        tx.send(headlines_payload(&["two"])).await.unwrap();
        assert_eq!(next_batch(&mut second).await[0].headline, "two");

        // Publishing is sequential, so anything for `first` would already be queued
        while let Ok(event) = first.try_recv() {
            assert!(!matches!(event, FeedEvent::Batch(_)), "unsubscribed callback received a batch");
        }
        assert_eq!(feed.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_transport_error_reports_disconnect() {
        let feed = LiveFeed::new(DEFAULT_BUFFER_CAP);
        let (_, mut events) = collector(&feed);
        let (transport, tx) = ChannelTransport::new(8);
        feed.initialize(Arc::new(transport));

        tx.send(TransportMessage::Error("socket reset".to_string())).await.unwrap();
        loop {
            if next_event(&mut events).await == FeedEvent::StateChanged(ConnectionState::Disconnected) {
                break;
            }
        }
        assert_eq!(feed.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_failed_connect_goes_back_to_disconnected() {
        let feed = LiveFeed::new(DEFAULT_BUFFER_CAP);
        let (_, mut events) = collector(&feed);
        let (transport, _tx) = ChannelTransport::new(8);
        let transport = Arc::new(transport);

        // First connect consumes the receiver; the second must fail
        transport.connect().await.unwrap();
        feed.initialize(transport);

        assert_eq!(next_event(&mut events).await, FeedEvent::StateChanged(ConnectionState::Connecting));
        assert_eq!(next_event(&mut events).await, FeedEvent::StateChanged(ConnectionState::Disconnected));
    }

    #[tokio::test]
    async fn test_recent_buffer_respects_feed_cap() {
        let feed = LiveFeed::new(3);
        let (_, mut events) = collector(&feed);
        let (transport, tx) = ChannelTransport::new(8);
        feed.initialize(Arc::new(transport));

        tx.send(headlines_payload(&["a", "b"])).await.unwrap();
        next_batch(&mut events).await;
        tx.send(headlines_payload(&["c", "d"])).await.unwrap();
        next_batch(&mut events).await;

        let headlines: Vec<String> = feed.recent().into_iter().map(|i| i.headline).collect();
        assert_eq!(headlines, vec!["c", "d", "a"]);
    }

    #[tokio::test]
    async fn test_dispose_disconnects() {
        let feed = LiveFeed::new(DEFAULT_BUFFER_CAP);
        let (_, mut events) = collector(&feed);
        let (transport, _tx) = ChannelTransport::new(8);
        feed.initialize(Arc::new(transport));

        assert_eq!(next_event(&mut events).await, FeedEvent::StateChanged(ConnectionState::Connecting));
        assert_eq!(next_event(&mut events).await, FeedEvent::StateChanged(ConnectionState::Connected));

        feed.dispose();
        assert_eq!(feed.state(), ConnectionState::Disconnected);
        assert_eq!(next_event(&mut events).await, FeedEvent::StateChanged(ConnectionState::Disconnected));
    }

    const STEADY_BODY: &str = r#"{"articles":[{"title":"Steady","publishedAt":"2024-05-01T12:00:00Z","score":60}]}"#;
    const POLL_INTERVAL: Duration = Duration::from_millis(20);

    /// Minimal HTTP server answering request `n` with `script[n]`, repeating
    /// the last entry. Returns the endpoint URL and a request counter.
    async fn scripted_server(script: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let (status, body) = script[n.min(script.len() - 1)];

                let mut request = [0u8; 4096];
                let _ = socket.read(&mut request).await;
                let response = format!(
                    "HTTP/1.1 {} Scripted\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status, body.len(), body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}/api/news/sentiment", addr), hits)
    }

    fn poll_transport(url: &str) -> Arc<HttpPollTransport> {
        let client = Client::builder().timeout(Duration::from_secs(2)).build().unwrap();
        Arc::new(HttpPollTransport::new(client, url, POLL_INTERVAL))
    }

    #[tokio::test]
    async fn test_http_poll_failed_first_poll_disconnects() {
        let (url, hits) = scripted_server(vec![(503, "{}")]).await;
        let feed = LiveFeed::new(DEFAULT_BUFFER_CAP);
        let (_, mut events) = collector(&feed);

        feed.initialize(poll_transport(&url));
        assert_eq!(next_event(&mut events).await, FeedEvent::StateChanged(ConnectionState::Connecting));
        assert_eq!(next_event(&mut events).await, FeedEvent::StateChanged(ConnectionState::Disconnected));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_http_poll_skips_unchanged_body() {
        let (url, hits) = scripted_server(vec![(200, STEADY_BODY)]).await;
        let feed = LiveFeed::new(DEFAULT_BUFFER_CAP);
        let (_, mut events) = collector(&feed);

        feed.initialize(poll_transport(&url));
        assert_eq!(next_batch(&mut events).await[0].headline, "Steady");

        sleep(POLL_INTERVAL * 10).await;
        assert!(hits.load(Ordering::SeqCst) >= 3);
        while let Ok(event) = events.try_recv() {
            assert!(!matches!(event, FeedEvent::Batch(_)), "unchanged body was published again");
        }
        assert_eq!(feed.recent().len(), 1);
        assert_eq!(feed.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_http_poll_error_disconnects() {
        let (url, _) = scripted_server(vec![(200, STEADY_BODY), (500, "{}")]).await;
        let feed = LiveFeed::new(DEFAULT_BUFFER_CAP);
        let (_, mut events) = collector(&feed);

        feed.initialize(poll_transport(&url));
        assert_eq!(next_batch(&mut events).await.len(), 1);
        assert_eq!(next_event(&mut events).await, FeedEvent::StateChanged(ConnectionState::Disconnected));
        assert_eq!(feed.recent().len(), 1);
    }

    #[tokio::test]
    async fn test_http_poll_stops_after_dispose() {
        let (url, hits) = scripted_server(vec![(200, STEADY_BODY)]).await;
        let feed = LiveFeed::new(DEFAULT_BUFFER_CAP);
        let (_, mut events) = collector(&feed);

        feed.initialize(poll_transport(&url));
        next_batch(&mut events).await;
        sleep(POLL_INTERVAL * 5).await;

        feed.dispose();
        drop(feed);
        // Let an in-flight request finish
        sleep(POLL_INTERVAL * 3).await;
        let at_dispose = hits.load(Ordering::SeqCst);

        sleep(POLL_INTERVAL * 15).await;
        assert_eq!(hits.load(Ordering::SeqCst), at_dispose);
    }
}
