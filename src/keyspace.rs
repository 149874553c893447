//! Key namespacing
//!
//! Maps caller-visible logical keys onto the physical keys sent over the wire.
//! When a prefix is configured every key becomes `prefix:key`; without one the
//! key passes through unchanged. The mapping is a pure function of prefix and
//! key, so any two facades (or processes) configured identically agree on the
//! physical key.

/// Logical-to-physical key mapper shared by all facades on a database handle.
///
/// Cloning is cheap and clones are interchangeable: equality of output depends
/// only on the configured prefix.
///
/// # Example
///
/// ```rust
/// use typed_redis_cache::Keyspace;
///
/// let ks = Keyspace::new("orders");
/// assert_eq!(ks.merge("42"), "orders:42");
///
/// let bare = Keyspace::none();
/// assert_eq!(bare.merge("42"), "42");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyspace {
    prefix: Option<String>,
}

impl Keyspace {
    /// Create a keyspace with the given prefix.
    ///
    /// An empty prefix behaves exactly like [`Keyspace::none`].
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: if prefix.is_empty() {
                None
            } else {
                Some(prefix)
            },
        }
    }

    /// Create a keyspace that leaves keys untouched.
    #[must_use]
    pub fn none() -> Self {
        Self { prefix: None }
    }

    /// The configured prefix, if any.
    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Rewrite a logical key into its physical form.
    ///
    /// Returns `"{prefix}:{key}"` when a prefix is configured, the key
    /// unchanged otherwise. No I/O, no failure mode.
    #[must_use]
    pub fn merge(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{key}"),
            None => key.to_string(),
        }
    }
}
