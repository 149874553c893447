//! List facade
//!
//! Push/pop from either end gives queue (push left, pop right) or stack
//! (push left, pop left) semantics; index and range reads accept negative
//! offsets counted from the tail.

use crate::codec::{JsonCodec, ValueCodec};
use crate::commands::KeyCommands;
use crate::connection::Database;
use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::AsyncCommands;

/// Typed facade over Redis list commands.
#[derive(Debug, Clone)]
pub struct ListCommands<C: ValueCodec = JsonCodec> {
    db: Database,
    codec: C,
}

impl ListCommands<JsonCodec> {
    /// Facade over `db` with the default JSON codec.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self::with_codec(db, JsonCodec)
    }
}

impl<C: ValueCodec> ListCommands<C> {
    /// Facade over `db` with a custom codec.
    pub fn with_codec(db: Database, codec: C) -> Self {
        Self { db, codec }
    }

    /// Typed element at `index` (negative counts from the tail). `None` when
    /// out of range or the key is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or the payload does not decode
    /// as `T`.
    pub async fn get<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
        index: i64,
    ) -> Result<Option<T>> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();

        let payload: Option<Vec<u8>> = redis::cmd("LINDEX")
            .arg(&key)
            .arg(index)
            .query_async(&mut conn)
            .await?;
        match payload {
            Some(bytes) => {
                let value = self.codec.deserialize(&bytes).with_context(|| {
                    format!("Failed to decode list element {index} at key '{key}'")
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Raw element at `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn get_raw(&self, key: &str, index: i64) -> Result<Option<String>> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let value: Option<String> = redis::cmd("LINDEX")
            .arg(&key)
            .arg(index)
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    /// Typed elements between `start` and `stop` inclusive (`0, -1` is the
    /// whole list).
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or any element does not decode
    /// as `T`.
    pub async fn range<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<T>> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();

        let payloads: Vec<Vec<u8>> = redis::cmd("LRANGE")
            .arg(&key)
            .arg(start)
            .arg(stop)
            .query_async(&mut conn)
            .await?;
        let mut values = Vec::with_capacity(payloads.len());
        for bytes in &payloads {
            values.push(
                self.codec
                    .deserialize(bytes)
                    .with_context(|| format!("Failed to decode list element at key '{key}'"))?,
            );
        }
        Ok(values)
    }

    /// Raw elements between `start` and `stop` inclusive.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn range_raw(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let values: Vec<String> = redis::cmd("LRANGE")
            .arg(&key)
            .arg(start)
            .arg(stop)
            .query_async(&mut conn)
            .await?;
        Ok(values)
    }

    /// Prepend a typed value. Returns the new list length.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the command fails.
    pub async fn push_left<T: serde::Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<u64> {
        let payload = self.codec.serialize(value)?;
        self.dispatch_push("LPUSH", key, payload).await
    }

    /// Append a typed value. Returns the new list length.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the command fails.
    pub async fn push_right<T: serde::Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<u64> {
        let payload = self.codec.serialize(value)?;
        self.dispatch_push("RPUSH", key, payload).await
    }

    /// Prepend a raw string value.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn push_left_raw(&self, key: &str, value: &str) -> Result<u64> {
        self.dispatch_push("LPUSH", key, value.as_bytes().to_vec())
            .await
    }

    /// Append a raw string value.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn push_right_raw(&self, key: &str, value: &str) -> Result<u64> {
        self.dispatch_push("RPUSH", key, value.as_bytes().to_vec())
            .await
    }

    async fn dispatch_push(&self, command: &str, key: &str, payload: Vec<u8>) -> Result<u64> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let length: u64 = redis::cmd(command)
            .arg(&key)
            .arg(payload)
            .query_async(&mut conn)
            .await?;
        Ok(length)
    }

    /// Pop the head as a typed value. `None` when the list is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or the payload does not decode
    /// as `T`.
    pub async fn pop_left<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.dispatch_pop("LPOP", key).await
    }

    /// Pop the tail as a typed value.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or the payload does not decode
    /// as `T`.
    pub async fn pop_right<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.dispatch_pop("RPOP", key).await
    }

    /// Pop the head as a raw string.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn pop_left_raw(&self, key: &str) -> Result<Option<String>> {
        self.dispatch_pop_raw("LPOP", key).await
    }

    /// Pop the tail as a raw string.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn pop_right_raw(&self, key: &str) -> Result<Option<String>> {
        self.dispatch_pop_raw("RPOP", key).await
    }

    async fn dispatch_pop<T: serde::de::DeserializeOwned>(
        &self,
        command: &str,
        key: &str,
    ) -> Result<Option<T>> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();

        let payload: Option<Vec<u8>> = redis::cmd(command)
            .arg(&key)
            .query_async(&mut conn)
            .await?;
        match payload {
            Some(bytes) => {
                let value = self
                    .codec
                    .deserialize(&bytes)
                    .with_context(|| format!("Failed to decode popped element at key '{key}'"))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn dispatch_pop_raw(&self, command: &str, key: &str) -> Result<Option<String>> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let value: Option<String> = redis::cmd(command)
            .arg(&key)
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    /// List length; zero when the key is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn len(&self, key: &str) -> Result<u64> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let length: u64 = conn.llen(&key).await?;
        Ok(length)
    }

    /// Remove occurrences of a typed value. Positive `count` removes from the
    /// head, negative from the tail, zero removes all. Returns how many were
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the command fails.
    pub async fn remove_value<T: serde::Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        count: i64,
    ) -> Result<u64> {
        let payload = self.codec.serialize(value)?;
        self.dispatch_remove(key, payload, count).await
    }

    /// Remove occurrences of a raw string value.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn remove_value_raw(&self, key: &str, value: &str, count: i64) -> Result<u64> {
        self.dispatch_remove(key, value.as_bytes().to_vec(), count)
            .await
    }

    async fn dispatch_remove(&self, key: &str, payload: Vec<u8>, count: i64) -> Result<u64> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let removed: u64 = redis::cmd("LREM")
            .arg(&key)
            .arg(count)
            .arg(payload)
            .query_async(&mut conn)
            .await?;
        Ok(removed)
    }
}

#[async_trait]
impl<C: ValueCodec> KeyCommands for ListCommands<C> {
    fn database(&self) -> &Database {
        &self.db
    }
}
