//! Hash facade
//!
//! Field/value maps under a single key. The logical key is namespaced; field
//! names pass through untouched.

use crate::codec::{JsonCodec, ValueCodec};
use crate::commands::{KeyCommands, SetWhen};
use crate::connection::Database;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::HashMap;
use tracing::debug;

/// Typed facade over Redis hash commands.
///
/// # Example
///
/// ```rust,no_run
/// use typed_redis_cache::{CacheClient, ConnectionSettings, SetWhen};
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Student { id: u64, name: String }
///
/// # async fn example() -> anyhow::Result<()> {
/// let client = CacheClient::connect(ConnectionSettings::default()).await?;
/// let hashes = client.hashes();
///
/// let student = Student { id: 7, name: "An".into() };
/// hashes.set("students", "7", &student, SetWhen::Always).await?;
///
/// let back: Option<Student> = hashes.get("students", "7").await?;
/// assert!(back.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HashCommands<C: ValueCodec = JsonCodec> {
    db: Database,
    codec: C,
}

impl HashCommands<JsonCodec> {
    /// Facade over `db` with the default JSON codec.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self::with_codec(db, JsonCodec)
    }
}

impl<C: ValueCodec> HashCommands<C> {
    /// Facade over `db` with a custom codec.
    pub fn with_codec(db: Database, codec: C) -> Self {
        Self { db, codec }
    }

    /// Store a typed value under a field.
    ///
    /// Returns true when the field was written: for [`SetWhen::Always`] that
    /// means the field is new (an overwrite returns false but still writes),
    /// for [`SetWhen::IfAbsent`] that the conditional write happened.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the command fails, or for
    /// [`SetWhen::IfPresent`], since Redis has no single-command
    /// only-if-present write for hash fields.
    pub async fn set<T: serde::Serialize + ?Sized>(
        &self,
        key: &str,
        field: &str,
        value: &T,
        when: SetWhen,
    ) -> Result<bool> {
        let payload = self.codec.serialize(value)?;
        self.dispatch_set(key, field, payload, when).await
    }

    /// Store a raw string value under a field. Same conditions as
    /// [`HashCommands::set`].
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or the condition is
    /// [`SetWhen::IfPresent`].
    pub async fn set_raw(
        &self,
        key: &str,
        field: &str,
        value: &str,
        when: SetWhen,
    ) -> Result<bool> {
        self.dispatch_set(key, field, value.as_bytes().to_vec(), when)
            .await
    }

    async fn dispatch_set(
        &self,
        key: &str,
        field: &str,
        payload: Vec<u8>,
        when: SetWhen,
    ) -> Result<bool> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();

        let written = match when {
            SetWhen::Always => {
                let created: i64 = conn.hset(&key, field, payload).await?;
                created > 0
            }
            SetWhen::IfAbsent => conn.hset_nx(&key, field, payload).await?,
            SetWhen::IfPresent => {
                return Err(anyhow!(
                    "only-if-present writes are not supported for hash fields"
                ));
            }
        };
        debug!(key = %key, field = %field, "Set hash field");
        Ok(written)
    }

    /// Fetch a typed value from a field. `None` when key or field is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or the payload does not decode
    /// as `T`.
    pub async fn get<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
        field: &str,
    ) -> Result<Option<T>> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();

        let payload: Option<Vec<u8>> = conn.hget(&key, field).await?;
        match payload {
            Some(bytes) => {
                let value = self.codec.deserialize(&bytes).with_context(|| {
                    format!("Failed to decode hash field '{field}' at key '{key}'")
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Fetch the raw string value of a field.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn get_raw(&self, key: &str, field: &str) -> Result<Option<String>> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let value: Option<String> = conn.hget(&key, field).await?;
        Ok(value)
    }

    /// Delete one field. Returns whether it existed.
    ///
    /// Deleting the whole hash goes through [`KeyCommands::remove`].
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn remove_field(&self, key: &str, field: &str) -> Result<bool> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let removed: i64 = conn.hdel(&key, field).await?;
        Ok(removed > 0)
    }

    /// Whether a field exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn field_exists(&self, key: &str, field: &str) -> Result<bool> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let exists: bool = conn.hexists(&key, field).await?;
        Ok(exists)
    }

    /// Atomically add `delta` to an integer field. Returns the new value.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn increment(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let value: i64 = redis::cmd("HINCRBY")
            .arg(&key)
            .arg(field)
            .arg(delta)
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    /// Atomically subtract `delta` from an integer field.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn decrement(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        self.increment(key, field, -delta).await
    }

    /// Atomically add a float `delta` to a field. Returns the new value.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn increment_by_float(&self, key: &str, field: &str, delta: f64) -> Result<f64> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let value: f64 = redis::cmd("HINCRBYFLOAT")
            .arg(&key)
            .arg(field)
            .arg(delta)
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    /// Atomically subtract a float `delta` from a field.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn decrement_by_float(&self, key: &str, field: &str, delta: f64) -> Result<f64> {
        self.increment_by_float(key, field, -delta).await
    }

    /// Number of fields in the hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn len(&self, key: &str) -> Result<u64> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let length: u64 = conn.hlen(&key).await?;
        Ok(length)
    }

    /// All fields with typed values. Empty map when the key is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or any payload does not decode
    /// as `T`.
    pub async fn get_all<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<HashMap<String, T>> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();

        let entries: HashMap<String, Vec<u8>> = conn.hgetall(&key).await?;
        let mut values = HashMap::with_capacity(entries.len());
        for (field, bytes) in entries {
            let value = self
                .codec
                .deserialize(&bytes)
                .with_context(|| format!("Failed to decode hash field '{field}' at key '{key}'"))?;
            values.insert(field, value);
        }
        Ok(values)
    }

    /// All fields with raw string values.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn get_all_raw(&self, key: &str) -> Result<HashMap<String, String>> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let entries: HashMap<String, String> = conn.hgetall(&key).await?;
        Ok(entries)
    }
}

#[async_trait]
impl<C: ValueCodec> KeyCommands for HashCommands<C> {
    fn database(&self) -> &Database {
        &self.db
    }
}
