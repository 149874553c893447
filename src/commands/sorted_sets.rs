//! Sorted set facade
//!
//! Scored members with rank and range queries. Members are raw strings:
//! sorted sets order by score and compare members byte-wise, so codec-encoded
//! payloads would make lexicographic operations meaningless. Range boundaries
//! take [`Exclude`] for inclusive/exclusive control and [`Order`] for
//! direction.

use crate::codec::{JsonCodec, ValueCodec};
use crate::commands::{
    Aggregate, Exclude, KeyCommands, Order, SetOperation, SetWhen, lex_max_arg, lex_min_arg,
    score_max_arg, score_min_arg,
};
use crate::connection::Database;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::debug;

/// Facade over Redis sorted set commands.
///
/// # Example
///
/// ```rust,no_run
/// use typed_redis_cache::{CacheClient, ConnectionSettings, Order, SetWhen};
///
/// # async fn example() -> anyhow::Result<()> {
/// let client = CacheClient::connect(ConnectionSettings::default()).await?;
/// let board = client.sorted_sets();
///
/// board.add("board", "alice", 10.0, SetWhen::Always).await?;
/// board.add("board", "bob", 20.0, SetWhen::Always).await?;
///
/// let ranked = board
///     .range_by_rank_with_scores("board", 0, -1, Order::Ascending)
///     .await?;
/// assert_eq!(ranked[0].0, "alice");
/// assert_eq!(board.rank("board", "bob", Order::Ascending).await?, Some(1));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SortedSetCommands<C: ValueCodec = JsonCodec> {
    db: Database,
    #[allow(dead_code)]
    codec: C,
}

impl SortedSetCommands<JsonCodec> {
    /// Facade over `db`.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self::with_codec(db, JsonCodec)
    }
}

impl<C: ValueCodec> SortedSetCommands<C> {
    /// Facade over `db` with a custom codec.
    ///
    /// The codec is carried for parity with the other facades; sorted set
    /// members themselves are raw strings.
    pub fn with_codec(db: Database, codec: C) -> Self {
        Self { db, codec }
    }

    /// Add one member with a score.
    ///
    /// Returns true when the write took effect: a new member for
    /// [`SetWhen::Always`] / [`SetWhen::IfAbsent`], a changed score for
    /// [`SetWhen::IfPresent`].
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn add(&self, key: &str, member: &str, score: f64, when: SetWhen) -> Result<bool> {
        let written = self.dispatch_add(key, &[(member, score)], when).await?;
        Ok(written > 0)
    }

    /// Add several members at once. Returns how many writes took effect.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn add_many(
        &self,
        key: &str,
        entries: &[(&str, f64)],
        when: SetWhen,
    ) -> Result<u64> {
        if entries.is_empty() {
            return Ok(0);
        }
        self.dispatch_add(key, entries, when).await
    }

    async fn dispatch_add(
        &self,
        key: &str,
        entries: &[(&str, f64)],
        when: SetWhen,
    ) -> Result<u64> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();

        let mut cmd = redis::cmd("ZADD");
        cmd.arg(&key);
        match when {
            SetWhen::Always => {}
            SetWhen::IfAbsent => {
                cmd.arg("NX");
            }
            SetWhen::IfPresent => {
                // CH so the reply counts updated scores, not (never) new members
                cmd.arg("XX").arg("CH");
            }
        }
        for (member, score) in entries {
            cmd.arg(*score).arg(*member);
        }

        let written: u64 = cmd.query_async(&mut conn).await?;
        debug!(key = %key, entries = entries.len(), written = written, "Added sorted set members");
        Ok(written)
    }

    /// Atomically add `delta` to a member's score, creating it at `delta`
    /// when absent. Returns the new score.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn increment(&self, key: &str, member: &str, delta: f64) -> Result<f64> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let score: f64 = conn.zincr(&key, member, delta).await?;
        Ok(score)
    }

    /// Atomically subtract `delta` from a member's score.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn decrement(&self, key: &str, member: &str, delta: f64) -> Result<f64> {
        self.increment(key, member, -delta).await
    }

    /// Zero-based rank of a member in the given order. `None` when the
    /// member is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn rank(&self, key: &str, member: &str, order: Order) -> Result<Option<u64>> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let rank: Option<u64> = match order {
            Order::Ascending => conn.zrank(&key, member).await?,
            Order::Descending => conn.zrevrank(&key, member).await?,
        };
        Ok(rank)
    }

    /// Score of a member. `None` when the member is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn score(&self, key: &str, member: &str) -> Result<Option<f64>> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let score: Option<f64> = conn.zscore(&key, member).await?;
        Ok(score)
    }

    /// Remove one member. Returns whether it was present.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn remove_member(&self, key: &str, member: &str) -> Result<bool> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let removed: i64 = conn.zrem(&key, member).await?;
        Ok(removed > 0)
    }

    /// Remove several members. Returns how many were present.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn remove_members(&self, key: &str, members: &[&str]) -> Result<u64> {
        if members.is_empty() {
            return Ok(0);
        }
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let removed: u64 = conn.zrem(&key, members).await?;
        Ok(removed)
    }

    /// Number of members; zero when the key is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn len(&self, key: &str) -> Result<u64> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let length: u64 = conn.zcard(&key).await?;
        Ok(length)
    }

    /// Number of members with scores inside the given range.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn count(&self, key: &str, min: f64, max: f64, exclude: Exclude) -> Result<u64> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let count: u64 = redis::cmd("ZCOUNT")
            .arg(&key)
            .arg(score_min_arg(min, exclude))
            .arg(score_max_arg(max, exclude))
            .query_async(&mut conn)
            .await?;
        Ok(count)
    }

    /// Number of members between two lexicographic boundaries. `None`
    /// boundaries are unbounded.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn len_by_value(
        &self,
        key: &str,
        min: Option<&str>,
        max: Option<&str>,
        exclude: Exclude,
    ) -> Result<u64> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let count: u64 = redis::cmd("ZLEXCOUNT")
            .arg(&key)
            .arg(lex_min_arg(min, exclude))
            .arg(lex_max_arg(max, exclude))
            .query_async(&mut conn)
            .await?;
        Ok(count)
    }

    /// Members between two ranks, inclusive (`0, -1` is everything).
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn range_by_rank(
        &self,
        key: &str,
        start: i64,
        stop: i64,
        order: Order,
    ) -> Result<Vec<String>> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let command = match order {
            Order::Ascending => "ZRANGE",
            Order::Descending => "ZREVRANGE",
        };
        let members: Vec<String> = redis::cmd(command)
            .arg(&key)
            .arg(start)
            .arg(stop)
            .query_async(&mut conn)
            .await?;
        Ok(members)
    }

    /// Members between two ranks, with their scores.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn range_by_rank_with_scores(
        &self,
        key: &str,
        start: i64,
        stop: i64,
        order: Order,
    ) -> Result<Vec<(String, f64)>> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let command = match order {
            Order::Ascending => "ZRANGE",
            Order::Descending => "ZREVRANGE",
        };
        let entries: Vec<(String, f64)> = redis::cmd(command)
            .arg(&key)
            .arg(start)
            .arg(stop)
            .arg("WITHSCORES")
            .query_async(&mut conn)
            .await?;
        Ok(entries)
    }

    /// Members with scores inside the given range. `min`/`max` always name
    /// the low and high boundary; `order` only flips the returned order.
    /// `skip`/`take` page the result; a negative `take` means "to the end".
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn range_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
        exclude: Exclude,
        order: Order,
        skip: u64,
        take: i64,
    ) -> Result<Vec<String>> {
        let mut cmd = self.score_range_cmd(key, min, max, exclude, order);
        if skip != 0 || take >= 0 {
            cmd.arg("LIMIT").arg(skip).arg(take);
        }
        let mut conn = self.db.connection_manager();
        let members: Vec<String> = cmd.query_async(&mut conn).await?;
        Ok(members)
    }

    /// Members with scores inside the given range, with their scores.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn range_by_score_with_scores(
        &self,
        key: &str,
        min: f64,
        max: f64,
        exclude: Exclude,
        order: Order,
        skip: u64,
        take: i64,
    ) -> Result<Vec<(String, f64)>> {
        let mut cmd = self.score_range_cmd(key, min, max, exclude, order);
        cmd.arg("WITHSCORES");
        if skip != 0 || take >= 0 {
            cmd.arg("LIMIT").arg(skip).arg(take);
        }
        let mut conn = self.db.connection_manager();
        let entries: Vec<(String, f64)> = cmd.query_async(&mut conn).await?;
        Ok(entries)
    }

    fn score_range_cmd(
        &self,
        key: &str,
        min: f64,
        max: f64,
        exclude: Exclude,
        order: Order,
    ) -> redis::Cmd {
        let key = self.db.merge(key);
        let mut cmd;
        match order {
            Order::Ascending => {
                cmd = redis::cmd("ZRANGEBYSCORE");
                cmd.arg(&key)
                    .arg(score_min_arg(min, exclude))
                    .arg(score_max_arg(max, exclude));
            }
            Order::Descending => {
                // ZREVRANGEBYSCORE wants the high boundary first
                cmd = redis::cmd("ZREVRANGEBYSCORE");
                cmd.arg(&key)
                    .arg(score_max_arg(max, exclude))
                    .arg(score_min_arg(min, exclude));
            }
        }
        cmd
    }

    /// Members between two lexicographic boundaries, ascending. Only
    /// meaningful when all members share one score, per Redis semantics.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn range_by_value(
        &self,
        key: &str,
        min: Option<&str>,
        max: Option<&str>,
        exclude: Exclude,
        skip: u64,
        take: i64,
    ) -> Result<Vec<String>> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let mut cmd = redis::cmd("ZRANGEBYLEX");
        cmd.arg(&key)
            .arg(lex_min_arg(min, exclude))
            .arg(lex_max_arg(max, exclude));
        if skip != 0 || take >= 0 {
            cmd.arg("LIMIT").arg(skip).arg(take);
        }
        let members: Vec<String> = cmd.query_async(&mut conn).await?;
        Ok(members)
    }

    /// Remove members between two ranks, inclusive. Returns how many were
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn remove_range_by_rank(&self, key: &str, start: i64, stop: i64) -> Result<u64> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let removed: u64 = redis::cmd("ZREMRANGEBYRANK")
            .arg(&key)
            .arg(start)
            .arg(stop)
            .query_async(&mut conn)
            .await?;
        Ok(removed)
    }

    /// Remove members with scores inside the given range.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn remove_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
        exclude: Exclude,
    ) -> Result<u64> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let removed: u64 = redis::cmd("ZREMRANGEBYSCORE")
            .arg(&key)
            .arg(score_min_arg(min, exclude))
            .arg(score_max_arg(max, exclude))
            .query_async(&mut conn)
            .await?;
        Ok(removed)
    }

    /// Remove members between two lexicographic boundaries.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn remove_range_by_value(
        &self,
        key: &str,
        min: Option<&str>,
        max: Option<&str>,
        exclude: Exclude,
    ) -> Result<u64> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let removed: u64 = redis::cmd("ZREMRANGEBYLEX")
            .arg(&key)
            .arg(lex_min_arg(min, exclude))
            .arg(lex_max_arg(max, exclude))
            .query_async(&mut conn)
            .await?;
        Ok(removed)
    }

    /// Combine two sorted sets into `destination` with equal weights.
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
        aggregate: Aggregate,
    ) -> Result<u64> {
        self.combine_many_and_store(op, destination, &[first, second], None, aggregate)
            .await
    }

    /// Combine any number of sorted sets into `destination`.
    ///
    /// Scores aggregate per `aggregate`, optionally weighted per input key.
    /// [`SetOperation::Difference`] maps to ZDIFFSTORE (Redis 6.2+), which
    /// accepts no weights and ignores `aggregate`.
    ///
    /// # Errors
    ///
    /// Returns an error if weights are supplied for a difference, the weight
    /// count does not match the key count, or the command fails.
    pub async fn combine_many_and_store(
        &self,
        op: SetOperation,
        destination: &str,
        keys: &[&str],
        weights: Option<&[f64]>,
        aggregate: Aggregate,
    ) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let destination = self.db.merge(destination);
        let mut conn = self.db.connection_manager();

        let mut cmd;
        match op {
            SetOperation::Difference => {
                if weights.is_some() {
                    return Err(anyhow!("weights are not supported for a difference store"));
                }
                cmd = redis::cmd("ZDIFFSTORE");
                cmd.arg(&destination).arg(keys.len());
                for key in keys {
                    cmd.arg(self.db.merge(key));
                }
            }
            SetOperation::Union | SetOperation::Intersect => {
                let command = match op {
                    SetOperation::Union => "ZUNIONSTORE",
                    _ => "ZINTERSTORE",
                };
                cmd = redis::cmd(command);
                cmd.arg(&destination).arg(keys.len());
                for key in keys {
                    cmd.arg(self.db.merge(key));
                }
                if let Some(weights) = weights {
                    if weights.len() != keys.len() {
                        return Err(anyhow!(
                            "expected {} weights, got {}",
                            keys.len(),
                            weights.len()
                        ));
                    }
                    cmd.arg("WEIGHTS");
                    for weight in weights {
                        cmd.arg(*weight);
                    }
                }
                cmd.arg("AGGREGATE").arg(aggregate.as_arg());
            }
        }

        let stored: u64 = cmd.query_async(&mut conn).await?;
        debug!(destination = %destination, op = ?op, stored = stored, "Stored sorted set combine");
        Ok(stored)
    }

    /// All members matching a glob pattern with their scores, drained with
    /// cursor-based ZSCAN.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn scan(&self, key: &str, pattern: &str) -> Result<Vec<(String, f64)>> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let mut entries = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let result: (u64, Vec<(String, f64)>) = redis::cmd("ZSCAN")
                .arg(&key)
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;

            cursor = result.0;
            entries.extend(result.1);

            if cursor == 0 {
                break;
            }
        }

        debug!(key = %key, pattern = %pattern, count = entries.len(), "Scanned sorted set members");
        Ok(entries)
    }

    /// One ZSCAN step. Returns the next cursor (zero when iteration is done)
    /// and this page's member/score pairs.
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
    ) -> Result<(u64, Vec<(String, f64)>)> {
        let key = self.db.merge(key);
        let mut conn = self.db.connection_manager();
        let page: (u64, Vec<(String, f64)>) = redis::cmd("ZSCAN")
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
}

#[async_trait]
impl<C: ValueCodec> KeyCommands for SortedSetCommands<C> {
    fn database(&self) -> &Database {
        &self.db
    }
}
