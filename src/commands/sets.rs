//! Set facade
//!
//! Unordered membership with set algebra. Combine operations namespace every
//! involved key, destination included; scans use cursor-based SSCAN so large
//! sets never block the server.

use crate::codec::{JsonCodec, ValueCodec};
use crate::commands::{KeyCommands, SetOperation};
use crate::connection::Database;
use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::debug;

fn combine_command(op: SetOperation, store: bool) -> &'static str {
    match (op, store) {
        (SetOperation::Union, false) => "SUNION",
        (SetOperation::Union, true) => "SUNIONSTORE",
        (SetOperation::Intersect, false) => "SINTER",
        (SetOperation::Intersect, true) => "SINTERSTORE",
        (SetOperation::Difference, false) => "SDIFF",
        (SetOperation::Difference, true) => "SDIFFSTORE",
    }
}

/// Typed facade over Redis set commands.
#[derive(Debug, Clone)]
pub struct SetCommands<C: ValueCodec = JsonCodec> {
    db: Database,
    codec: C,
}

impl SetCommands<JsonCodec> {
    /// Facade over `db` with the default JSON codec.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self::with_codec(db, JsonCodec)
    }
}

impl<C: ValueCodec> SetCommands<C> {
    /// Facade over `db` with a custom codec.
    pub fn with_codec(db: Database, codec: C) -> Self {
        Self { db, codec }
    }

    /// Add a typed member. Returns true when it was not already present.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the command fails.
    pub async fn add<T: serde::Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<bool> {
        let payload = self.codec.serialize(value)?;
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let added: i64 = conn.sadd(&key, payload).await?;
        Ok(added > 0)
    }

    /// Add several typed members at once. Returns how many were new.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the command fails.
    pub async fn add_many<T: serde::Serialize>(&self, key: &str, values: &[T]) -> Result<u64> {
        if values.is_empty() {
            return Ok(0);
        }
        let payloads = values
            .iter()
            .map(|value| self.codec.serialize(value))
            .collect::<Result<Vec<_>>>()?;
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let added: u64 = conn.sadd(&key, payloads).await?;
        Ok(added)
    }

    /// Add a raw string member.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn add_raw(&self, key: &str, value: &str) -> Result<bool> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let added: i64 = conn.sadd(&key, value).await?;
        Ok(added > 0)
    }

    /// Remove a typed member. Returns true when it was present.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the command fails.
    pub async fn remove_member<T: serde::Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<bool> {
        let payload = self.codec.serialize(value)?;
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let removed: i64 = conn.srem(&key, payload).await?;
        Ok(removed > 0)
    }

    /// Remove several typed members at once. Returns how many were present.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the command fails.
    pub async fn remove_members<T: serde::Serialize>(
        &self,
        key: &str,
        values: &[T],
    ) -> Result<u64> {
        if values.is_empty() {
            return Ok(0);
        }
        let payloads = values
            .iter()
            .map(|value| self.codec.serialize(value))
            .collect::<Result<Vec<_>>>()?;
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let removed: u64 = conn.srem(&key, payloads).await?;
        Ok(removed)
    }

    /// Remove a raw string member.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn remove_member_raw(&self, key: &str, value: &str) -> Result<bool> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let removed: i64 = conn.srem(&key, value).await?;
        Ok(removed > 0)
    }

    /// Whether a typed member is in the set.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the command fails.
    pub async fn contains<T: serde::Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<bool> {
        let payload = self.codec.serialize(value)?;
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let present: bool = conn.sismember(&key, payload).await?;
        Ok(present)
    }

    /// Whether a raw string member is in the set.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn contains_raw(&self, key: &str, value: &str) -> Result<bool> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let present: bool = conn.sismember(&key, value).await?;
        Ok(present)
    }

    /// All members, decoded as `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or any member does not decode
    /// as `T`.
    pub async fn members<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Vec<T>> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let payloads: Vec<Vec<u8>> = conn.smembers(&key).await?;
        self.decode_members(&key, payloads)
    }

    /// All members as raw strings.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn members_raw(&self, key: &str) -> Result<Vec<String>> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let members: Vec<String> = conn.smembers(&key).await?;
        Ok(members)
    }

    /// Set cardinality; zero when the key is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn len(&self, key: &str) -> Result<u64> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let length: u64 = conn.scard(&key).await?;
        Ok(length)
    }

    /// Remove and return one random member.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or the payload does not decode
    /// as `T`.
    pub async fn pop<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let payload: Option<Vec<u8>> = redis::cmd("SPOP")
            .arg(&key)
            .query_async(&mut conn)
            .await?;
        match payload {
            Some(bytes) => Ok(Some(self.decode_member(&key, &bytes)?)),
            None => Ok(None),
        }
    }

    /// Remove and return one random member, raw.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn pop_raw(&self, key: &str) -> Result<Option<String>> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let member: Option<String> = redis::cmd("SPOP")
            .arg(&key)
            .query_async(&mut conn)
            .await?;
        Ok(member)
    }

    /// One random member without removing it.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or the payload does not decode
    /// as `T`.
    pub async fn random_member<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let payload: Option<Vec<u8>> = redis::cmd("SRANDMEMBER")
            .arg(&key)
            .query_async(&mut conn)
            .await?;
        match payload {
            Some(bytes) => Ok(Some(self.decode_member(&key, &bytes)?)),
            None => Ok(None),
        }
    }

    /// One random member as a raw string, without removing it.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn random_member_raw(&self, key: &str) -> Result<Option<String>> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let member: Option<String> = redis::cmd("SRANDMEMBER")
            .arg(&key)
            .query_async(&mut conn)
            .await?;
        Ok(member)
    }

    /// Up to `count` distinct random members without removing them.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or any member does not decode
    /// as `T`.
    pub async fn random_members<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
        count: u64,
    ) -> Result<Vec<T>> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let payloads: Vec<Vec<u8>> = redis::cmd("SRANDMEMBER")
            .arg(&key)
            .arg(count)
            .query_async(&mut conn)
            .await?;
        self.decode_members(&key, payloads)
    }

    /// Up to `count` distinct random members as raw strings.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn random_members_raw(&self, key: &str, count: u64) -> Result<Vec<String>> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let members: Vec<String> = redis::cmd("SRANDMEMBER")
            .arg(&key)
            .arg(count)
            .query_async(&mut conn)
            .await?;
        Ok(members)
    }

    /// Move a typed member between two sets. Both keys are namespaced.
    /// Returns false when the member was not in the source set.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the command fails.
    pub async fn move_member<T: serde::Serialize + ?Sized>(
        &self,
        source: &str,
        destination: &str,
        value: &T,
    ) -> Result<bool> {
        let payload = self.codec.serialize(value)?;
        let source = self.db.merge(source);
        let destination = self.db.merge(destination);
        let mut conn = self.db.connection_manager();
        let moved: bool = redis::cmd("SMOVE")
            .arg(&source)
            .arg(&destination)
            .arg(payload)
            .query_async(&mut conn)
            .await?;
        Ok(moved)
    }

    /// Set algebra over two sets, members decoded as `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or any member does not decode
    /// as `T`.
    pub async fn combine<T: serde::de::DeserializeOwned>(
        &self,
        op: SetOperation,
        first: &str,
        second: &str,
    ) -> Result<Vec<T>> {
        self.combine_many(op, &[first, second]).await
    }

    /// Set algebra over two sets, raw members.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn combine_raw(
        &self,
        op: SetOperation,
        first: &str,
        second: &str,
    ) -> Result<Vec<String>> {
        self.combine_many_raw(op, &[first, second]).await
    }

    /// Set algebra over any number of sets, members decoded as `T`. For
    /// [`SetOperation::Difference`] the first key is the base and later keys
    /// are subtracted from it.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or any member does not decode
    /// as `T`.
    pub async fn combine_many<T: serde::de::DeserializeOwned>(
        &self,
        op: SetOperation,
        keys: &[&str],
    ) -> Result<Vec<T>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.db.connection_manager();
        let mut cmd = redis::cmd(combine_command(op, false));
        for key in keys {
            cmd.arg(self.db.merge(key));
        }
        let payloads: Vec<Vec<u8>> = cmd.query_async(&mut conn).await?;
        self.decode_members("<combine>", payloads)
    }

    /// Set algebra over any number of sets, raw members.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn combine_many_raw(
        &self,
        op: SetOperation,
        keys: &[&str],
    ) -> Result<Vec<String>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.db.connection_manager();
        let mut cmd = redis::cmd(combine_command(op, false));
        for key in keys {
            cmd.arg(self.db.merge(key));
        }
        let members: Vec<String> = cmd.query_async(&mut conn).await?;
        Ok(members)
    }

    /// Set algebra over two sets, stored at `destination` (namespaced).
    /// Returns the stored cardinality.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn combine_and_store(
        &self,
        op: SetOperation,
        destination: &str,
        first: &str,
        second: &str,
    ) -> Result<u64> {
        self.combine_many_and_store(op, destination, &[first, second])
            .await
    }

    /// Set algebra over any number of sets, stored at `destination`.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn combine_many_and_store(
        &self,
        op: SetOperation,
        destination: &str,
        keys: &[&str],
    ) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let destination = self.db.merge(destination);
        let mut conn = self.db.connection_manager();
        let mut cmd = redis::cmd(combine_command(op, true));
        cmd.arg(&destination);
        for key in keys {
            cmd.arg(self.db.merge(key));
        }
        let stored: u64 = cmd.query_async(&mut conn).await?;
        debug!(destination = %destination, op = ?op, stored = stored, "Stored set combine");
        Ok(stored)
    }

    /// All members matching a glob pattern, drained with cursor-based SSCAN.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn scan(&self, key: &str, pattern: &str) -> Result<Vec<String>> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let mut members = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let result: (u64, Vec<String>) = redis::cmd("SSCAN")
                .arg(&key)
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;

            cursor = result.0;
            members.extend(result.1);

            if cursor == 0 {
                break;
            }
        }

        debug!(key = %key, pattern = %pattern, count = members.len(), "Scanned set members");
        Ok(members)
    }

    /// One SSCAN step. Returns the next cursor (zero when iteration is done)
    /// and the members of this page.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn scan_page(
        &self,
        key: &str,
        cursor: u64,
        pattern: &str,
        count: u64,
    ) -> Result<(u64, Vec<String>)> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let page: (u64, Vec<String>) = redis::cmd("SSCAN")
            .arg(&key)
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;
        Ok(page)
    }

    fn decode_member<T: serde::de::DeserializeOwned>(&self, key: &str, bytes: &[u8]) -> Result<T> {
        self.codec
            .deserialize(bytes)
            .with_context(|| format!("Failed to decode set member at key '{key}'"))
    }

    fn decode_members<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
        payloads: Vec<Vec<u8>>,
    ) -> Result<Vec<T>> {
        let mut values = Vec::with_capacity(payloads.len());
        for bytes in &payloads {
            values.push(self.decode_member(key, bytes)?);
        }
        Ok(values)
    }
}

#[async_trait]
impl<C: ValueCodec> KeyCommands for SetCommands<C> {
    fn database(&self) -> &Database {
        &self.db
    }
}
