//! String facade
//!
//! Plain key/value entries. Typed values go through the codec; expiry rides
//! on the SET command itself so value and TTL land atomically.

use crate::codec::{JsonCodec, ValueCodec};
use crate::commands::{Expiry, KeyCommands};
use crate::connection::Database;
use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::debug;

/// Typed facade over Redis string commands.
///
/// # Example
///
/// ```rust,no_run
/// use typed_redis_cache::{CacheClient, ConnectionSettings, Expiry};
/// use serde::{Serialize, Deserialize};
/// use std::time::Duration;
///
/// #[derive(Serialize, Deserialize)]
/// struct Order { id: u64, name: String }
///
/// # async fn example() -> anyhow::Result<()> {
/// let client = CacheClient::connect(ConnectionSettings::default()).await?;
/// let strings = client.strings();
///
/// let order = Order { id: 1, name: "x".into() };
/// strings.set("orderA", &order, Expiry::In(Duration::from_secs(86_400))).await?;
///
/// let back: Option<Order> = strings.get("orderA").await?;
/// assert_eq!(back.map(|o| o.id), Some(1));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct StringCommands<C: ValueCodec = JsonCodec> {
    db: Database,
    codec: C,
}

impl StringCommands<JsonCodec> {
    /// Facade over `db` with the default JSON codec.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self::with_codec(db, JsonCodec)
    }
}

impl<C: ValueCodec> StringCommands<C> {
    /// Facade over `db` with a custom codec.
    pub fn with_codec(db: Database, codec: C) -> Self {
        Self { db, codec }
    }

    /// Store a typed value, optionally expiring.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the command fails.
    pub async fn set<T: serde::Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        expiry: Expiry,
    ) -> Result<()> {
        let payload = self.codec.serialize(value)?;
        self.dispatch_set(key, payload, expiry).await
    }

    /// Store a raw string value, optionally expiring.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn set_raw(&self, key: &str, value: &str, expiry: Expiry) -> Result<()> {
        self.dispatch_set(key, value.as_bytes().to_vec(), expiry)
            .await
    }

    async fn dispatch_set(&self, key: &str, payload: Vec<u8>, expiry: Expiry) -> Result<()> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();

        let mut cmd = redis::cmd("SET");
        cmd.arg(&key).arg(payload);
        if let Some((unit, amount)) = expiry.set_args() {
            cmd.arg(unit).arg(amount);
        }

        let _: String = cmd.query_async(&mut conn).await?;
        debug!(key = %key, expiry = ?expiry, "Set string value");
        Ok(())
    }

    /// Fetch a typed value. `None` when the key is missing or expired.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or the stored payload does not
    /// decode as `T`.
    pub async fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();

        let payload: Option<Vec<u8>> = conn.get(&key).await?;
        match payload {
            Some(bytes) => {
                let value = self
                    .codec
                    .deserialize(&bytes)
                    .with_context(|| format!("Failed to decode value at key '{key}'"))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Fetch the raw string value. `None` when the key is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let value: Option<String> = conn.get(&key).await?;
        Ok(value)
    }

    /// Append to the value, creating it when absent. Returns the new length.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn append(&self, key: &str, value: &str) -> Result<u64> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let length: u64 = redis::cmd("APPEND")
            .arg(&key)
            .arg(value)
            .query_async(&mut conn)
            .await?;
        Ok(length)
    }

    /// Atomically add `delta` to an integer value. Returns the new value.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails, including when the current
    /// value is not an integer.
    pub async fn increment(&self, key: &str, delta: i64) -> Result<i64> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let value: i64 = conn.incr(&key, delta).await?;
        Ok(value)
    }

    /// Atomically subtract `delta` from an integer value.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn decrement(&self, key: &str, delta: i64) -> Result<i64> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let value: i64 = redis::cmd("DECRBY")
            .arg(&key)
            .arg(delta)
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    /// Atomically add a float `delta`. Returns the new value.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn increment_by_float(&self, key: &str, delta: f64) -> Result<f64> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let value: f64 = redis::cmd("INCRBYFLOAT")
            .arg(&key)
            .arg(delta)
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    /// Atomically subtract a float `delta`. Returns the new value.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn decrement_by_float(&self, key: &str, delta: f64) -> Result<f64> {
        self.increment_by_float(key, -delta).await
    }
}

#[async_trait]
impl<C: ValueCodec> KeyCommands for StringCommands<C> {
    fn database(&self) -> &Database {
        &self.db
    }
}
