//! Redis pub/sub bus for multi-node deployments.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::{ConnectionManager, PubSubSink, PubSubStream};
use tokio::sync::{Mutex, RwLock, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use flym_cache::redis::client::mask_redis_url;
use flym_core::error::{AppError, ErrorKind};
use flym_core::result::AppResult;

use super::bus::{BusSubscription, MessageBus};

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Doubling reconnect delay, capped at [`MAX_BACKOFF`].
#[derive(Debug)]
struct Backoff {
    next: Duration,
}

impl Backoff {
    fn new() -> Self {
        Self {
            next: INITIAL_BACKOFF,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(MAX_BACKOFF);
        delay
    }

    fn reset(&mut self) {
        self.next = INITIAL_BACKOFF;
    }
}

/// State shared between the bus handle and its reader task.
///
/// Lock order is `senders` before `sink`.
struct Shared {
    sink: Mutex<PubSubSink>,
    senders: RwLock<HashMap<String, broadcast::Sender<String>>>,
    connected: AtomicBool,
    reconnects: AtomicU64,
}

/// Redis-backed bus.
///
/// Publishes go through a [`ConnectionManager`]; one dedicated pub/sub
/// connection receives every subscribed channel and a reader task fans
/// payloads out to local receivers. When that connection drops, the reader
/// reconnects with backoff and re-subscribes every channel that still has
/// local receivers. Payloads published while it is down are lost.
pub struct RedisBus {
    publisher: ConnectionManager,
    shared: Arc<Shared>,
    buffer_size: usize,
    url: String,
    reader: CancellationToken,
}

impl std::fmt::Debug for RedisBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBus")
            .field("url", &self.url)
            .field("buffer_size", &self.buffer_size)
            .field("connected", &self.shared.connected.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Drop for RedisBus {
    fn drop(&mut self) {
        self.reader.cancel();
    }
}

fn bus_error(context: &str, err: redis::RedisError) -> AppError {
    AppError::with_source(ErrorKind::Bus, format!("{context}: {err}"), err)
}

impl RedisBus {
    /// Connect the publisher and the pub/sub connection and start the
    /// reader task.
    pub async fn connect(url: &str, buffer_size: usize) -> AppResult<Self> {
        let masked = mask_redis_url(url);
        info!(url = %masked, "Connecting Redis pub/sub bus");

        let client = redis::Client::open(url)
            .map_err(|e| bus_error("Invalid Redis bus URL", e))?;
        let publisher = ConnectionManager::new(client.clone())
            .await
            .map_err(|e| bus_error("Redis bus connection failed", e))?;
        let pubsub = client
            .get_async_pubsub()
            .await
            .map_err(|e| bus_error("Redis pub/sub connection failed", e))?;
        let (sink, stream) = pubsub.split();

        let shared = Arc::new(Shared {
            sink: Mutex::new(sink),
            senders: RwLock::new(HashMap::new()),
            connected: AtomicBool::new(true),
            reconnects: AtomicU64::new(0),
        });
        let reader = CancellationToken::new();
        tokio::spawn(run_reader(
            client,
            shared.clone(),
            stream,
            reader.clone(),
            masked.clone(),
        ));

        Ok(Self {
            publisher,
            shared,
            buffer_size: buffer_size.max(1),
            url: masked,
            reader,
        })
    }

    /// Times the pub/sub connection has been re-established.
    pub fn reconnect_count(&self) -> u64 {
        self.shared.reconnects.load(Ordering::Relaxed)
    }
}

async fn run_reader(
    client: redis::Client,
    shared: Arc<Shared>,
    mut stream: PubSubStream,
    token: CancellationToken,
    url: String,
) {
    let mut backoff = Backoff::new();
    loop {
        loop {
            let msg = tokio::select! {
                _ = token.cancelled() => return,
                next = stream.next() => match next {
                    Some(msg) => msg,
                    None => break,
                },
            };
            let channel = msg.get_channel_name().to_string();
            let payload: String = match msg.get_payload() {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(%channel, error = %e, "Dropping non-text bus payload");
                    continue;
                }
            };
            if let Some(tx) = shared.senders.read().await.get(&channel) {
                let _ = tx.send(payload);
            }
        }

        shared.connected.store(false, Ordering::SeqCst);
        warn!(url = %url, "Redis pub/sub stream ended, reconnecting");

        stream = loop {
            let delay = backoff.next_delay();
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            match resubscribe(&client, &shared).await {
                Ok((next, channels)) => {
                    backoff.reset();
                    shared.connected.store(true, Ordering::SeqCst);
                    shared.reconnects.fetch_add(1, Ordering::Relaxed);
                    info!(url = %url, channels, "Redis pub/sub reconnected");
                    break next;
                }
                Err(e) => {
                    warn!(url = %url, error = %e, retry_in_ms = delay.as_millis() as u64, "Redis pub/sub reconnect failed");
                }
            }
        };
    }
}

/// Open a fresh pub/sub connection, subscribe every channel with local
/// receivers and swap it in. Returns the new stream and the channel count.
async fn resubscribe(
    client: &redis::Client,
    shared: &Shared,
) -> redis::RedisResult<(PubSubStream, usize)> {
    let (mut sink, stream) = client.get_async_pubsub().await?.split();
    let senders = shared.senders.read().await;
    let mut current = shared.sink.lock().await;
    for channel in senders.keys() {
        sink.subscribe(channel).await?;
    }
    *current = sink;
    Ok((stream, senders.len()))
}

#[async_trait]
impl MessageBus for RedisBus {
    async fn publish(&self, channel: &str, payload: String) -> AppResult<()> {
        let mut conn = self.publisher.clone();
        redis::cmd("PUBLISH")
            .arg(channel)
            .arg(payload)
            .query_async::<i64>(&mut conn)
            .await
            .map_err(|e| bus_error("Redis PUBLISH failed", e))?;
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> AppResult<BusSubscription> {
        if let Some(tx) = self.shared.senders.read().await.get(channel) {
            return Ok(BusSubscription::new(channel, tx.subscribe()));
        }

        let mut senders = self.shared.senders.write().await;
        if let Some(tx) = senders.get(channel) {
            return Ok(BusSubscription::new(channel, tx.subscribe()));
        }
        self.shared
            .sink
            .lock()
            .await
            .subscribe(channel)
            .await
            .map_err(|e| bus_error("Redis SUBSCRIBE failed", e))?;
        let (tx, rx) = broadcast::channel(self.buffer_size);
        senders.insert(channel.to_string(), tx);
        debug!(%channel, "Subscribed bus channel");
        Ok(BusSubscription::new(channel, rx))
    }

    async fn unsubscribe(&self, channel: &str) -> AppResult<()> {
        let mut senders = self.shared.senders.write().await;
        if !senders
            .get(channel)
            .is_some_and(|tx| tx.receiver_count() == 0)
        {
            return Ok(());
        }
        senders.remove(channel);
        self.shared
            .sink
            .lock()
            .await
            .unsubscribe(channel)
            .await
            .map_err(|e| bus_error("Redis UNSUBSCRIBE failed", e))?;
        debug!(%channel, "Unsubscribed bus channel");
        Ok(())
    }

    /// Healthy only while the publisher answers PING and the pub/sub
    /// reader is connected.
    async fn health_check(&self) -> AppResult<bool> {
        if !self.shared.connected.load(Ordering::SeqCst) {
            return Err(AppError::bus("Redis pub/sub reader is disconnected"));
        }
        let mut conn = self.publisher.clone();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| bus_error("Redis PING failed", e))?;
        Ok(pong == "PONG")
    }

    fn provider_name(&self) -> &'static str {
        "redis"
    }
}
