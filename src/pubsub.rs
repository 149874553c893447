//! Pub/sub facade
//!
//! Channel messaging split into a [`Publisher`] and a [`Subscriber`].
//! Publishing rides the hub's multiplexed connection. Each subscription owns
//! a background task with a dedicated Pub/Sub connection, because a RESP2
//! connection in subscriber mode cannot carry regular commands. Channels are
//! server-global in Redis, so the keyspace prefix is never applied to them.

use crate::codec::{JsonCodec, ValueCodec};
use crate::connection::Database;
use crate::settings::ConnectionSettings;
use anyhow::{Context, Result, anyhow};
use futures_util::StreamExt;
use futures_util::future::Either;
use parking_lot::Mutex;
use redis::{AsyncCommands, Client};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Delay before a lost subscription connection is retried.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// One message delivered to a subscription handler.
#[derive(Debug, Clone)]
pub struct ChannelMessage {
    /// Channel the message arrived on.
    pub channel: String,
    /// Raw payload bytes as published.
    pub payload: Vec<u8>,
}

impl ChannelMessage {
    /// Payload as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not valid UTF-8.
    pub fn payload_str(&self) -> Result<&str> {
        std::str::from_utf8(&self.payload).context("Message payload is not valid UTF-8")
    }
}

/// Sends messages into channels.
///
/// # Example
///
/// ```rust,no_run
/// use typed_redis_cache::{CacheClient, ConnectionSettings};
///
/// # async fn example() -> anyhow::Result<()> {
/// let client = CacheClient::connect(ConnectionSettings::default()).await?;
/// let publisher = client.publisher();
///
/// let receivers = publisher.publish("events:orders", &"order 42 shipped").await?;
/// println!("delivered to {receivers} subscribers");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Publisher<C: ValueCodec = JsonCodec> {
    db: Database,
    codec: C,
}

impl Publisher<JsonCodec> {
    /// Publisher over `db`'s connection.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self::with_codec(db, JsonCodec)
    }
}

impl<C: ValueCodec> Publisher<C> {
    /// Publisher over `db`'s connection with a custom codec.
    pub fn with_codec(db: Database, codec: C) -> Self {
        Self { db, codec }
    }

    /// Encode a value and publish it. Returns how many subscribers received
    /// the message.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the publish fails.
    pub async fn publish<T: Serialize + ?Sized>(&self, channel: &str, message: &T) -> Result<u64> {
        let payload = self
            .codec
            .serialize(message)
            .with_context(|| format!("Failed to encode message for channel '{channel}'"))?;
        self.publish_raw(channel, &payload).await
    }

    /// Publish raw bytes. Returns how many subscribers received the message.
    ///
    /// # Errors
    ///
    /// Returns an error if the publish fails.
    pub async fn publish_raw(&self, channel: &str, payload: &[u8]) -> Result<u64> {
        let mut conn = self.db.connection_manager();
        let receivers: u64 = conn
            .publish(channel, payload)
            .await
            .with_context(|| format!("Failed to publish to channel '{channel}'"))?;
        debug!(channel = %channel, receivers = receivers, "Published message");
        Ok(receivers)
    }
}

/// Snapshot of subscriber counters.
#[derive(Debug, Default, Clone)]
pub struct SubscriberStats {
    /// Messages delivered to handlers (or dropped for decode failures).
    pub messages_received: u64,
    /// Payloads that could not be read or decoded.
    pub decode_errors: u64,
    /// Handler invocations that returned an error.
    pub handler_errors: u64,
}

#[derive(Debug, Default)]
struct AtomicSubscriberStats {
    messages_received: AtomicU64,
    decode_errors: AtomicU64,
    handler_errors: AtomicU64,
}

impl AtomicSubscriberStats {
    fn snapshot(&self) -> SubscriberStats {
        SubscriberStats {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            handler_errors: self.handler_errors.load(Ordering::Relaxed),
        }
    }
}

/// One running channel subscription.
struct Subscription {
    shutdown_tx: broadcast::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl Subscription {
    fn stop(self) {
        // The task exits through the select on its shutdown receiver; when it
        // already finished the send simply has no receivers.
        let _ = self.shutdown_tx.send(());
    }
}

struct SubscriberInner {
    clients: Vec<Client>,
    subscriptions: Mutex<HashMap<String, Subscription>>,
    stats: Arc<AtomicSubscriberStats>,
}

impl Drop for SubscriberInner {
    fn drop(&mut self) {
        // Background tasks must not outlive the registry
        for (_, subscription) in self.subscriptions.get_mut().drain() {
            let _ = subscription.shutdown_tx.send(());
        }
    }
}

/// Receives channel messages through per-channel background tasks.
///
/// Every subscription names its handler up front; there is no registration
/// window where messages arrive with nobody to take them. A lost connection
/// is retried every five seconds until [`Subscriber::unsubscribe`] or drop.
/// Clones share one subscription registry.
#[derive(Clone)]
pub struct Subscriber {
    inner: Arc<SubscriberInner>,
}

impl Subscriber {
    /// Build a subscriber for the deployment described by `settings`.
    ///
    /// Connections are opened lazily per subscription; this only validates
    /// the endpoint list.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint list is malformed.
    pub fn new(settings: &ConnectionSettings) -> Result<Self> {
        let endpoints = settings.endpoints()?;
        let mut clients = Vec::with_capacity(endpoints.len());
        for endpoint in &endpoints {
            let url = settings.connection_url(endpoint, settings.database);
            let client = Client::open(url.as_str()).with_context(|| {
                format!(
                    "Failed to create Redis client for {}",
                    settings.display_target(endpoint, settings.database)
                )
            })?;
            clients.push(client);
        }

        Ok(Self {
            inner: Arc::new(SubscriberInner {
                clients,
                subscriptions: Mutex::new(HashMap::new()),
                stats: Arc::new(AtomicSubscriberStats::default()),
            }),
        })
    }

    /// Subscribe to a channel, delivering every message to `handler`.
    ///
    /// Spawns a background task that connects, subscribes and pumps the
    /// message stream; delivery starts once the subscription lands on the
    /// server. Subscribing again to the same channel replaces the previous
    /// handler.
    pub fn subscribe<F, Fut>(&self, channel: &str, handler: F)
    where
        F: Fn(ChannelMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let mut subscriptions = self.inner.subscriptions.lock();
        if let Some(previous) = subscriptions.remove(channel) {
            warn!(channel = %channel, "Replacing existing subscription");
            previous.stop();
        }

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = Self::spawn_listener(
            self.inner.clients.clone(),
            channel.to_string(),
            handler,
            Arc::clone(&self.inner.stats),
            shutdown_rx,
        );
        subscriptions.insert(channel.to_string(), Subscription { shutdown_tx, task });
    }

    /// Subscribe with JSON decoding in front of the handler.
    ///
    /// Payloads that fail to decode as `T` are logged and dropped without
    /// reaching the handler. For a non-JSON codec, use [`Subscriber::subscribe`]
    /// and decode inside the handler.
    pub fn subscribe_json<T, F, Fut>(&self, channel: &str, handler: F)
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let stats = Arc::clone(&self.inner.stats);
        self.subscribe(channel, move |message: ChannelMessage| {
            match serde_json::from_slice::<T>(&message.payload) {
                Ok(value) => Either::Left(handler(value)),
                Err(e) => {
                    warn!(channel = %message.channel, error = %e, "Failed to decode message");
                    stats.decode_errors.fetch_add(1, Ordering::Relaxed);
                    Either::Right(std::future::ready(Ok(())))
                }
            }
        });
    }

    /// Stop the subscription for one channel. A channel with no subscription
    /// is a no-op.
    pub fn unsubscribe(&self, channel: &str) {
        let removed = self.inner.subscriptions.lock().remove(channel);
        if let Some(subscription) = removed {
            subscription.stop();
            info!(channel = %channel, "Unsubscribed from channel");
        }
    }

    /// Stop every subscription.
    pub fn unsubscribe_all(&self) {
        let drained: Vec<(String, Subscription)> =
            self.inner.subscriptions.lock().drain().collect();
        for (channel, subscription) in drained {
            subscription.stop();
            debug!(channel = %channel, "Unsubscribed from channel");
        }
    }

    /// Channels with a registered subscription.
    #[must_use]
    pub fn active_channels(&self) -> Vec<String> {
        self.inner.subscriptions.lock().keys().cloned().collect()
    }

    /// Whether a live background task currently serves `channel`.
    #[must_use]
    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.inner
            .subscriptions
            .lock()
            .get(channel)
            .is_some_and(|subscription| !subscription.task.is_finished())
    }

    /// Snapshot of delivery counters across all channels.
    #[must_use]
    pub fn stats(&self) -> SubscriberStats {
        self.inner.stats.snapshot()
    }

    fn spawn_listener<F, Fut>(
        clients: Vec<Client>,
        channel: String,
        handler: F,
        stats: Arc<AtomicSubscriberStats>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> tokio::task::JoinHandle<()>
    where
        F: Fn(ChannelMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        tokio::spawn(async move {
            let handler = Arc::new(handler);

            loop {
                if shutdown_rx.try_recv().is_ok() {
                    info!(channel = %channel, "Subscription shutting down");
                    break;
                }

                match Self::listen(
                    &clients,
                    &channel,
                    Arc::clone(&handler),
                    Arc::clone(&stats),
                    &mut shutdown_rx,
                )
                .await
                {
                    Ok(()) => {
                        debug!(channel = %channel, "Subscription stopped");
                        break;
                    }
                    Err(e) => {
                        error!(
                            channel = %channel,
                            error = %e,
                            "Subscription connection lost, reconnecting in 5s"
                        );
                        tokio::select! {
                            () = tokio::time::sleep(RECONNECT_DELAY) => {}
                            _ = shutdown_rx.recv() => {
                                info!(channel = %channel, "Subscription shutting down");
                                break;
                            }
                        }
                    }
                }
            }
        })
    }

    async fn listen<F, Fut>(
        clients: &[Client],
        channel: &str,
        handler: Arc<F>,
        stats: Arc<AtomicSubscriberStats>,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> Result<()>
    where
        F: Fn(ChannelMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let mut pubsub = Self::open_pubsub(clients).await?;
        pubsub
            .subscribe(channel)
            .await
            .with_context(|| format!("Failed to subscribe to channel '{channel}'"))?;
        info!(channel = %channel, "Subscribed to channel");

        let mut stream = pubsub.on_message();

        loop {
            tokio::select! {
                message = stream.next() => {
                    let Some(message) = message else {
                        return Err(anyhow!("Pub/Sub message stream ended"));
                    };

                    let payload: Vec<u8> = match message.get_payload() {
                        Ok(payload) => payload,
                        Err(e) => {
                            warn!(channel = %channel, error = %e, "Failed to read message payload");
                            stats.decode_errors.fetch_add(1, Ordering::Relaxed);
                            continue;
                        }
                    };

                    stats.messages_received.fetch_add(1, Ordering::Relaxed);
                    let delivered = ChannelMessage {
                        channel: message.get_channel_name().to_string(),
                        payload,
                    };
                    if let Err(e) = handler(delivered).await {
                        error!(channel = %channel, error = %e, "Message handler failed");
                        stats.handler_errors.fetch_add(1, Ordering::Relaxed);
                    }
                }
                _ = shutdown_rx.recv() => {
                    return Ok(());
                }
            }
        }
    }

    /// Try each endpoint in declared order, first successful connection wins.
    async fn open_pubsub(clients: &[Client]) -> Result<redis::aio::PubSub> {
        let mut last_error: Option<anyhow::Error> = None;

        for client in clients {
            match client.get_async_pubsub().await {
                Ok(pubsub) => return Ok(pubsub),
                Err(e) => {
                    last_error =
                        Some(anyhow::Error::new(e).context("Failed to open Pub/Sub connection"));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("no endpoints configured")))
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("endpoints", &self.inner.clients.len())
            .field("active_channels", &self.inner.subscriptions.lock().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_str_reads_utf8() {
        let message = ChannelMessage {
            channel: "events".to_string(),
            payload: b"hello".to_vec(),
        };
        assert_eq!(message.payload_str().unwrap(), "hello");
    }

    #[test]
    fn payload_str_rejects_invalid_utf8() {
        let message = ChannelMessage {
            channel: "events".to_string(),
            payload: vec![0xff, 0xfe],
        };
        assert!(message.payload_str().is_err());
    }

    #[test]
    fn subscriber_builds_one_client_per_endpoint() {
        let settings =
            ConnectionSettings::default().with_hosts("10.0.0.1:6379,10.0.0.2:6380");
        let subscriber = Subscriber::new(&settings).unwrap();
        assert_eq!(subscriber.inner.clients.len(), 2);
        assert!(subscriber.active_channels().is_empty());
    }

    #[test]
    fn unsubscribe_without_subscription_is_a_no_op() {
        let settings = ConnectionSettings::default();
        let subscriber = Subscriber::new(&settings).unwrap();
        subscriber.unsubscribe("nobody-home");
        subscriber.unsubscribe_all();
        assert!(!subscriber.is_subscribed("nobody-home"));
    }
}
