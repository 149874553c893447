//! Typed Redis Cache
//!
//! A typed facade over Redis built on the `redis` crate's multiplexed
//! `ConnectionManager`, featuring:
//! - **Keyspace prefixing**: logical keys are rewritten to `prefix:key` before dispatch
//! - **Typed facades**: strings, hashes, lists, sets and sorted sets carrying serde values
//! - **Pluggable codecs**: JSON by default, any [`ValueCodec`] implementation otherwise
//! - **Shared connection hub**: one connection manager per database index, cloned handles everywhere
//! - **Pub/Sub**: publisher plus per-channel subscriber tasks with automatic reconnect
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use serde::{Deserialize, Serialize};
//! use typed_redis_cache::{CacheClient, ConnectionSettings, Expiry};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Session {
//!     user: String,
//!     score: u64,
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = ConnectionSettings::default().with_client_name("myapp");
//!     let client = CacheClient::connect(settings).await?;
//!
//!     // Stored under "myapp:session:1"
//!     let strings = client.strings();
//!     let session = Session { user: "alice".into(), score: 100 };
//!     strings.set("session:1", &session, Expiry::Never).await?;
//!
//!     if let Some(found) = strings.get::<Session>("session:1").await? {
//!         tracing::info!(user = %found.user, score = found.score, "cache hit");
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! CacheClient ── ConnectionHub ── ConnectionManager (db 0)
//!      │                   └───── ConnectionManager (db N, on demand)
//!      ├── StringCommands / HashCommands / ListCommands /
//!      │   SetCommands / SortedSetCommands   (borrow Database handles)
//!      └── Publisher / Subscriber            (Pub/Sub channels, unprefixed)
//! ```
//!
//! Facades never open connections of their own; they clone the hub's
//! multiplexed manager per call, which shares the underlying socket.

use anyhow::Result;
use std::time::Duration;
use tracing::info;

pub mod codec;
pub mod commands;
pub mod connection;
pub mod keyspace;
pub mod pubsub;
pub mod settings;

pub use codec::{JsonCodec, ValueCodec};
pub use commands::{
    Aggregate, Exclude, Expiry, HashCommands, KeyCommands, ListCommands, Order, SetCommands,
    SetOperation, SetWhen, SortedSetCommands, StringCommands,
};
pub use connection::{ConnectionHub, Database};
pub use keyspace::Keyspace;
pub use pubsub::{ChannelMessage, Publisher, Subscriber, SubscriberStats};
pub use settings::{ConnectionSettings, Endpoint, ProxyMode, SettingsError};

// Re-export async_trait for user convenience
pub use async_trait::async_trait;

/// Main entry point: a connection hub plus constructors for every facade.
///
/// Cloning is cheap and clones share the hub's connection managers and the
/// subscriber's channel registry. Facade accessors target the default
/// database; for another index take a handle from [`CacheClient::database`]
/// and construct the facade directly.
///
/// # Example
///
/// ```rust,no_run
/// use typed_redis_cache::{CacheClient, ConnectionSettings};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = CacheClient::connect_from_env().await?;
///
///     let latency = client.ping().await?;
///     tracing::info!(?latency, "connected");
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CacheClient {
    hub: ConnectionHub,
    subscriber: Subscriber,
}

impl CacheClient {
    /// Connect to the deployment described by `settings`.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint list is malformed or no endpoint
    /// accepts the connection.
    pub async fn connect(settings: ConnectionSettings) -> Result<Self> {
        let subscriber = Subscriber::new(&settings)?;
        let hub = ConnectionHub::connect(settings).await?;
        info!("Cache client initialized");
        Ok(Self { hub, subscriber })
    }

    /// Connect using settings read from the environment.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`CacheClient::connect`].
    pub async fn connect_from_env() -> Result<Self> {
        Self::connect(ConnectionSettings::from_env()).await
    }

    /// Wrap an existing hub, sharing its connections.
    ///
    /// # Errors
    ///
    /// Returns an error if the hub's endpoint list cannot be turned into
    /// Pub/Sub clients.
    pub fn from_hub(hub: ConnectionHub) -> Result<Self> {
        let subscriber = Subscriber::new(hub.settings())?;
        Ok(Self { hub, subscriber })
    }

    /// The underlying connection hub.
    #[must_use]
    pub fn hub(&self) -> &ConnectionHub {
        &self.hub
    }

    /// The keyspace applied to every facade key.
    #[must_use]
    pub fn keyspace(&self) -> &Keyspace {
        self.hub.keyspace()
    }

    /// Handle for an arbitrary database index, connecting it on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if a new connection is needed and no endpoint
    /// accepts it.
    pub async fn database(&self, index: i64) -> Result<Database> {
        self.hub.database(index).await
    }

    /// String facade over the default database.
    #[must_use]
    pub fn strings(&self) -> StringCommands {
        StringCommands::new(self.hub.default_database())
    }

    /// String facade with a custom codec.
    pub fn strings_with_codec<C: ValueCodec>(&self, codec: C) -> StringCommands<C> {
        StringCommands::with_codec(self.hub.default_database(), codec)
    }

    /// Hash facade over the default database.
    #[must_use]
    pub fn hashes(&self) -> HashCommands {
        HashCommands::new(self.hub.default_database())
    }

    /// Hash facade with a custom codec.
    pub fn hashes_with_codec<C: ValueCodec>(&self, codec: C) -> HashCommands<C> {
        HashCommands::with_codec(self.hub.default_database(), codec)
    }

    /// List facade over the default database.
    #[must_use]
    pub fn lists(&self) -> ListCommands {
        ListCommands::new(self.hub.default_database())
    }

    /// List facade with a custom codec.
    pub fn lists_with_codec<C: ValueCodec>(&self, codec: C) -> ListCommands<C> {
        ListCommands::with_codec(self.hub.default_database(), codec)
    }

    /// Set facade over the default database.
    #[must_use]
    pub fn sets(&self) -> SetCommands {
        SetCommands::new(self.hub.default_database())
    }

    /// Set facade with a custom codec.
    pub fn sets_with_codec<C: ValueCodec>(&self, codec: C) -> SetCommands<C> {
        SetCommands::with_codec(self.hub.default_database(), codec)
    }

    /// Sorted set facade over the default database.
    #[must_use]
    pub fn sorted_sets(&self) -> SortedSetCommands {
        SortedSetCommands::new(self.hub.default_database())
    }

    /// Sorted set facade with a custom codec.
    pub fn sorted_sets_with_codec<C: ValueCodec>(&self, codec: C) -> SortedSetCommands<C> {
        SortedSetCommands::with_codec(self.hub.default_database(), codec)
    }

    /// Publisher over the default database's connection.
    #[must_use]
    pub fn publisher(&self) -> Publisher {
        Publisher::new(self.hub.default_database())
    }

    /// Publisher with a custom codec.
    pub fn publisher_with_codec<C: ValueCodec>(&self, codec: C) -> Publisher<C> {
        Publisher::with_codec(self.hub.default_database(), codec)
    }

    /// The shared subscriber. Clones returned here manage one registry, so a
    /// channel subscribed anywhere can be unsubscribed anywhere.
    #[must_use]
    pub fn subscriber(&self) -> Subscriber {
        self.subscriber.clone()
    }

    /// PING round-trip against the default database.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not answer the PING.
    pub async fn ping(&self) -> Result<Duration> {
        self.hub.ping().await
    }

    /// Delete every key in one database. Requires `allow_admin` and no proxy.
    ///
    /// # Errors
    ///
    /// Returns an error if admin commands are disabled, a proxy is
    /// configured, or the command fails.
    pub async fn flush_database(&self, index: i64) -> Result<()> {
        self.hub.flush_database(index).await
    }
}
