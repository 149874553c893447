//! Typed command facades
//!
//! One facade per Redis data structure, all sharing the same contract: every
//! operation takes a logical key, rewrites it through the handle's
//! [`Keyspace`](crate::Keyspace), dispatches the command over the shared
//! connection, and runs typed values through the configured
//! [`ValueCodec`](crate::ValueCodec) on the way in and out.
//!
//! # Facades
//!
//! - [`StringCommands`] - plain values with atomic set-with-expiry
//! - [`HashCommands`] - field/value maps
//! - [`ListCommands`] - queues and stacks
//! - [`SetCommands`] - membership and set algebra
//! - [`SortedSetCommands`] - scored members, ranks and range queries
//!
//! Key-level operations every structure needs (existence, delete, expiry,
//! rename) live on the [`KeyCommands`] trait, implemented by all five.
//!
//! # Usage
//!
//! ```rust,no_run
//! use typed_redis_cache::{CacheClient, ConnectionSettings, Expiry, KeyCommands};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = CacheClient::connect(ConnectionSettings::default()).await?;
//! let strings = client.strings();
//!
//! strings.set_raw("greeting", "hello", Expiry::Never).await?;
//! assert!(strings.exists("greeting").await?);
//! # Ok(())
//! # }
//! ```

pub mod hashes;
pub mod lists;
pub mod sets;
pub mod sorted_sets;
pub mod strings;

pub use hashes::HashCommands;
pub use lists::ListCommands;
pub use sets::SetCommands;
pub use sorted_sets::SortedSetCommands;
pub use strings::StringCommands;

use crate::connection::Database;
use anyhow::Result;
use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Condition attached to a set-style write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SetWhen {
    /// Write unconditionally.
    #[default]
    Always,
    /// Write only when the field/member does not exist yet (NX).
    IfAbsent,
    /// Write only when the field/member already exists (XX).
    ///
    /// Supported for sorted-set members; hash fields have no single-command
    /// equivalent and reject it.
    IfPresent,
}

/// Expiry attached to a string set.
///
/// Applied as arguments of the SET command itself, so value and expiry land
/// atomically; there is no window where the key exists without its TTL.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum Expiry {
    /// No expiry; also clears any TTL a previous value carried.
    #[default]
    Never,
    /// Expire this long after the write.
    In(Duration),
    /// Expire at an absolute point in time.
    At(SystemTime),
}

impl Expiry {
    /// SET argument pair for this expiry, `None` for [`Expiry::Never`].
    ///
    /// Seconds forms (EX/EXAT) when the instant is whole-second, millisecond
    /// forms (PX/PXAT) otherwise.
    pub(crate) fn set_args(self) -> Option<(&'static str, u64)> {
        match self {
            Self::Never => None,
            Self::In(ttl) => {
                if ttl.subsec_millis() == 0 {
                    Some(("EX", ttl.as_secs()))
                } else {
                    Some(("PX", saturating_millis(ttl)))
                }
            }
            Self::At(when) => {
                let since_epoch = when
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or(Duration::ZERO);
                if since_epoch.subsec_millis() == 0 {
                    Some(("EXAT", since_epoch.as_secs()))
                } else {
                    Some(("PXAT", saturating_millis(since_epoch)))
                }
            }
        }
    }
}

/// Sort direction for rank lookups and range queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Order {
    /// Lowest score / rank 0 first.
    #[default]
    Ascending,
    /// Highest score first.
    Descending,
}

/// Which ends of a score or lexicographic range are exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Exclude {
    /// Both boundaries included.
    #[default]
    Neither,
    /// Start boundary excluded.
    Start,
    /// Stop boundary excluded.
    Stop,
    /// Both boundaries excluded.
    Both,
}

impl Exclude {
    pub(crate) fn excludes_start(self) -> bool {
        matches!(self, Self::Start | Self::Both)
    }

    pub(crate) fn excludes_stop(self) -> bool {
        matches!(self, Self::Stop | Self::Both)
    }
}

/// Set algebra operation for combine calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperation {
    /// Members present in any input.
    Union,
    /// Members present in every input.
    Intersect,
    /// Members of the first input absent from the rest.
    Difference,
}

/// How scores aggregate in weighted sorted-set combines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Aggregate {
    /// Sum of weighted scores.
    #[default]
    Sum,
    /// Minimum weighted score.
    Min,
    /// Maximum weighted score.
    Max,
}

impl Aggregate {
    pub(crate) fn as_arg(self) -> &'static str {
        match self {
            Self::Sum => "SUM",
            Self::Min => "MIN",
            Self::Max => "MAX",
        }
    }
}

fn saturating_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Format the min boundary of a score range (`-inf`, `(x` or `x`).
pub(crate) fn score_min_arg(min: f64, exclude: Exclude) -> String {
    if min.is_infinite() && min.is_sign_negative() {
        "-inf".to_string()
    } else if exclude.excludes_start() {
        format!("({min}")
    } else {
        min.to_string()
    }
}

/// Format the max boundary of a score range (`+inf`, `(x` or `x`).
pub(crate) fn score_max_arg(max: f64, exclude: Exclude) -> String {
    if max.is_infinite() && max.is_sign_positive() {
        "+inf".to_string()
    } else if exclude.excludes_stop() {
        format!("({max}")
    } else {
        max.to_string()
    }
}

/// Format the min boundary of a lexicographic range (`-`, `[m` or `(m`).
pub(crate) fn lex_min_arg(min: Option<&str>, exclude: Exclude) -> String {
    match min {
        None => "-".to_string(),
        Some(value) if exclude.excludes_start() => format!("({value}"),
        Some(value) => format!("[{value}"),
    }
}

/// Format the max boundary of a lexicographic range (`+`, `[m` or `(m`).
pub(crate) fn lex_max_arg(max: Option<&str>, exclude: Exclude) -> String {
    match max {
        None => "+".to_string(),
        Some(value) if exclude.excludes_stop() => format!("({value}"),
        Some(value) => format!("[{value}"),
    }
}

/// Key-level operations shared by every facade.
///
/// Default methods dispatch through [`KeyCommands::database`], so a facade
/// only has to point at its handle to get the whole set. Keys are namespaced
/// exactly like the facade's own operations.
#[async_trait]
pub trait KeyCommands: Send + Sync {
    /// The database handle operations dispatch through.
    fn database(&self) -> &Database;

    /// Whether the key exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    async fn exists(&self, key: &str) -> Result<bool> {
        let key = self.database().merge(key);
        let mut conn = self.database().connection_manager();
        let exists: bool = conn.exists(&key).await?;
        Ok(exists)
    }

    /// Delete the key. Returns whether a key was actually removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    async fn remove(&self, key: &str) -> Result<bool> {
        let key = self.database().merge(key);
        let mut conn = self.database().connection_manager();
        let removed: i64 = conn.del(&key).await?;
        Ok(removed > 0)
    }

    /// Expire the key this long from now. Returns false if the key is gone.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    async fn expire_in(&self, key: &str, ttl: Duration) -> Result<bool> {
        let key = self.database().merge(key);
        let mut conn = self.database().connection_manager();
        let set: bool = redis::cmd("PEXPIRE")
            .arg(&key)
            .arg(saturating_millis(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(set)
    }

    /// Expire the key at an absolute point in time.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    async fn expire_at(&self, key: &str, when: SystemTime) -> Result<bool> {
        let key = self.database().merge(key);
        let since_epoch = when.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
        let mut conn = self.database().connection_manager();
        let set: bool = redis::cmd("PEXPIREAT")
            .arg(&key)
            .arg(saturating_millis(since_epoch))
            .query_async(&mut conn)
            .await?;
        Ok(set)
    }

    /// Remaining time to live. `None` when the key is missing or has no
    /// expiry.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    async fn time_to_live(&self, key: &str) -> Result<Option<Duration>> {
        let key = self.database().merge(key);
        let mut conn = self.database().connection_manager();
        // PTTL: -2 = missing key, -1 = no expiry
        let millis: i64 = redis::cmd("PTTL").arg(&key).query_async(&mut conn).await?;
        if millis > 0 {
            Ok(Some(Duration::from_millis(millis.unsigned_abs())))
        } else {
            Ok(None)
        }
    }

    /// Clear the key's expiry. Returns false if there was none to clear.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    async fn persist(&self, key: &str) -> Result<bool> {
        let key = self.database().merge(key);
        let mut conn = self.database().connection_manager();
        let cleared: bool = redis::cmd("PERSIST")
            .arg(&key)
            .query_async(&mut conn)
            .await?;
        Ok(cleared)
    }

    /// Rename a key; both names are namespaced. Fails if the source key does
    /// not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the source key is missing or the command fails.
    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let from = self.database().merge(from);
        let to = self.database().merge(to);
        let mut conn = self.database().connection_manager();
        let _: String = redis::cmd("RENAME")
            .arg(&from)
            .arg(&to)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_set_args() {
        assert_eq!(Expiry::Never.set_args(), None);
        assert_eq!(
            Expiry::In(Duration::from_secs(90)).set_args(),
            Some(("EX", 90))
        );
        assert_eq!(
            Expiry::In(Duration::from_millis(1500)).set_args(),
            Some(("PX", 1500))
        );

        let at = UNIX_EPOCH + Duration::from_secs(2_000_000_000);
        assert_eq!(Expiry::At(at).set_args(), Some(("EXAT", 2_000_000_000)));

        let at_millis = UNIX_EPOCH + Duration::from_millis(2_000_000_000_250);
        assert_eq!(
            Expiry::At(at_millis).set_args(),
            Some(("PXAT", 2_000_000_000_250))
        );

        // Pre-epoch instants clamp to immediate expiry rather than panic
        let before_epoch = UNIX_EPOCH - Duration::from_secs(10);
        assert_eq!(Expiry::At(before_epoch).set_args(), Some(("EXAT", 0)));
    }

    #[test]
    fn test_score_boundary_formatting() {
        assert_eq!(score_min_arg(5.0, Exclude::Neither), "5");
        assert_eq!(score_min_arg(5.0, Exclude::Start), "(5");
        assert_eq!(score_min_arg(5.5, Exclude::Both), "(5.5");
        assert_eq!(score_min_arg(f64::NEG_INFINITY, Exclude::Both), "-inf");

        assert_eq!(score_max_arg(10.0, Exclude::Neither), "10");
        assert_eq!(score_max_arg(10.0, Exclude::Stop), "(10");
        assert_eq!(score_max_arg(10.0, Exclude::Start), "10");
        assert_eq!(score_max_arg(f64::INFINITY, Exclude::Neither), "+inf");
    }

    #[test]
    fn test_lex_boundary_formatting() {
        assert_eq!(lex_min_arg(None, Exclude::Both), "-");
        assert_eq!(lex_min_arg(Some("alpha"), Exclude::Neither), "[alpha");
        assert_eq!(lex_min_arg(Some("alpha"), Exclude::Start), "(alpha");

        assert_eq!(lex_max_arg(None, Exclude::Neither), "+");
        assert_eq!(lex_max_arg(Some("omega"), Exclude::Stop), "(omega");
        assert_eq!(lex_max_arg(Some("omega"), Exclude::Start), "[omega");
    }

    #[test]
    fn test_aggregate_args() {
        assert_eq!(Aggregate::Sum.as_arg(), "SUM");
        assert_eq!(Aggregate::Min.as_arg(), "MIN");
        assert_eq!(Aggregate::Max.as_arg(), "MAX");
    }
}
