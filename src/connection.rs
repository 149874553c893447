//! Connection hub
//!
//! Explicitly constructed, shared-ownership connection provider. One
//! [`ConnectionHub`] owns a multiplexed `ConnectionManager` per logical
//! database index; facades borrow lightweight [`Database`] handles from it and
//! never open connections of their own. The hub is `Clone` and every clone
//! shares the same managers, so N facades over one index cost exactly one
//! connection.
//!
//! Lifecycle is owned by the host application: build the hub once with
//! [`ConnectionHub::connect`], hand clones to whoever needs them, drop it on
//! shutdown. There is no global singleton and no first-use race: the default
//! database connects eagerly, additional indexes are created on demand under a
//! lock with the presence check inside the critical section.

use crate::keyspace::Keyspace;
use crate::settings::{ConnectionSettings, Endpoint, ProxyMode};
use anyhow::{Context, Result, anyhow};
use redis::Client;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

struct HubInner {
    settings: ConnectionSettings,
    endpoints: Vec<Endpoint>,
    keyspace: Keyspace,
    default_db: Database,
    /// Managers by database index. Creation happens while holding this lock,
    /// with the presence check re-done inside it, so concurrent first use of
    /// an index builds exactly one manager.
    managers: Mutex<HashMap<i64, ConnectionManager>>,
    managers_created: AtomicU64,
}

/// Shared connection provider for a Redis deployment.
///
/// Wraps the `redis` crate's auto-reconnecting `ConnectionManager`: commands
/// multiplex over few physical sockets and the manager re-establishes them
/// after failures on its own. The hub adds endpoint-list failover at connect
/// time, per-database-index handles and lifecycle logging; it holds no locks
/// during steady-state dispatch.
///
/// # Example
///
/// ```rust,no_run
/// use typed_redis_cache::{ConnectionHub, ConnectionSettings};
///
/// # async fn example() -> anyhow::Result<()> {
/// let hub = ConnectionHub::connect(ConnectionSettings::default()).await?;
/// let db = hub.default_database();
/// println!("connected to database {}", db.index());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ConnectionHub {
    inner: Arc<HubInner>,
}

impl ConnectionHub {
    /// Connect to the deployment described by `settings`.
    ///
    /// Parses the endpoint list, tries each endpoint in declared order and
    /// keeps the first that completes the handshake, then verifies it with a
    /// PING. The default database index connects eagerly here; other indexes
    /// connect on first request.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint list is malformed or every endpoint
    /// refuses the connection. With `abort_on_connect_fail` unset the
    /// underlying manager retries each endpoint with backoff before this
    /// gives up.
    pub async fn connect(settings: ConnectionSettings) -> Result<Self> {
        let endpoints = settings.endpoints()?;
        info!(
            endpoints = endpoints.len(),
            database = settings.database,
            proxy = %settings.proxy,
            "Connecting Redis hub"
        );

        let manager = Self::build_manager(&settings, &endpoints, settings.database).await?;
        let keyspace = settings.keyspace();
        let default_db = Database {
            manager: manager.clone(),
            keyspace: keyspace.clone(),
            index: settings.database,
        };

        let mut managers = HashMap::new();
        managers.insert(settings.database, manager);

        Ok(Self {
            inner: Arc::new(HubInner {
                settings,
                endpoints,
                keyspace,
                default_db,
                managers: Mutex::new(managers),
                managers_created: AtomicU64::new(1),
            }),
        })
    }

    /// Connect using settings read from the environment.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`ConnectionHub::connect`].
    pub async fn connect_from_env() -> Result<Self> {
        Self::connect(ConnectionSettings::from_env()).await
    }

    /// Handle for the default database index.
    #[must_use]
    pub fn default_database(&self) -> Database {
        self.inner.default_db.clone()
    }

    /// Handle for an arbitrary database index.
    ///
    /// The first request for an index builds its connection manager; later
    /// requests (from any clone of the hub) reuse it.
    ///
    /// # Errors
    ///
    /// Returns an error if a new manager is needed and no endpoint accepts
    /// the connection.
    pub async fn database(&self, index: i64) -> Result<Database> {
        let mut managers = self.inner.managers.lock().await;
        if let Some(manager) = managers.get(&index) {
            return Ok(self.handle(index, manager.clone()));
        }

        let manager =
            Self::build_manager(&self.inner.settings, &self.inner.endpoints, index).await?;
        self.inner.managers_created.fetch_add(1, Ordering::Relaxed);
        managers.insert(index, manager.clone());
        debug!(database = index, "Created connection manager for database");
        Ok(self.handle(index, manager))
    }

    /// PING round-trip against the default database.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not answer the PING.
    pub async fn ping(&self) -> Result<Duration> {
        let mut conn = self.inner.default_db.connection_manager();
        let started = Instant::now();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("Redis PING health check failed")?;
        Ok(started.elapsed())
    }

    /// Delete every key in one database (FLUSHDB).
    ///
    /// Refused locally unless `allow_admin` is set, and always refused when a
    /// proxy is configured; neither twemproxy nor envoy forwards admin
    /// commands.
    ///
    /// # Errors
    ///
    /// Returns an error if admin commands are disabled, a proxy is in the
    /// way, or the command itself fails.
    pub async fn flush_database(&self, index: i64) -> Result<()> {
        if !self.inner.settings.allow_admin {
            return Err(anyhow!("admin commands are disabled (allow_admin is off)"));
        }
        if self.inner.settings.proxy != ProxyMode::None {
            return Err(anyhow!(
                "admin commands are unavailable through a {} proxy",
                self.inner.settings.proxy
            ));
        }

        let db = self.database(index).await?;
        let mut conn = db.connection_manager();
        let _: String = redis::cmd("FLUSHDB")
            .query_async(&mut conn)
            .await
            .context("FLUSHDB failed")?;
        warn!(database = index, "Flushed database");
        Ok(())
    }

    /// The settings this hub was built from.
    #[must_use]
    pub fn settings(&self) -> &ConnectionSettings {
        &self.inner.settings
    }

    /// The keyspace shared by every handle from this hub.
    #[must_use]
    pub fn keyspace(&self) -> &Keyspace {
        &self.inner.keyspace
    }

    /// How many connection managers this hub has built so far.
    ///
    /// One per database index in steady state; useful for asserting that
    /// facades share connections instead of opening their own.
    #[must_use]
    pub fn managers_created(&self) -> u64 {
        self.inner.managers_created.load(Ordering::Relaxed)
    }

    fn handle(&self, index: i64, manager: ConnectionManager) -> Database {
        Database {
            manager,
            keyspace: self.inner.keyspace.clone(),
            index,
        }
    }

    /// Try each endpoint in declared order, first successful handshake wins.
    async fn build_manager(
        settings: &ConnectionSettings,
        endpoints: &[Endpoint],
        database: i64,
    ) -> Result<ConnectionManager> {
        let mut last_error: Option<anyhow::Error> = None;

        for endpoint in endpoints {
            let target = settings.display_target(endpoint, database);
            debug!(target = %target, "Attempting Redis connection");

            match Self::connect_endpoint(settings, endpoint, database).await {
                Ok(manager) => {
                    info!(target = %target, "Redis connection established");
                    return Ok(manager);
                }
                Err(e) => {
                    error!(target = %target, error = %e, "Redis connection failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("no endpoints configured")))
    }

    async fn connect_endpoint(
        settings: &ConnectionSettings,
        endpoint: &Endpoint,
        database: i64,
    ) -> Result<ConnectionManager> {
        let url = settings.connection_url(endpoint, database);
        let client = Client::open(url.as_str()).with_context(|| {
            format!(
                "Failed to create Redis client for {}",
                settings.display_target(endpoint, database)
            )
        })?;

        let mut config = ConnectionManagerConfig::new()
            .set_connection_timeout(Some(settings.connect_timeout()))
            .set_response_timeout(Some(settings.response_timeout()));
        if settings.abort_on_connect_fail {
            // Fail fast: first refused handshake propagates to the caller
            config = config.set_number_of_retries(1);
        } else {
            config = config.set_number_of_retries(6);
        }

        let manager = ConnectionManager::new_with_config(client, config)
            .await
            .context("Failed to establish Redis connection manager")?;

        // Round-trip before handing the manager out
        let mut conn = manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("Redis PING health check failed")?;

        Ok(manager)
    }
}

impl std::fmt::Debug for ConnectionHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHub")
            .field("endpoints", &self.inner.endpoints)
            .field("default_database", &self.inner.settings.database)
            .field("managers_created", &self.managers_created())
            .finish_non_exhaustive()
    }
}

/// Lightweight handle to one logical database inside the hub.
///
/// Holds a clone of the multiplexed manager plus the keyspace; cloning is
/// cheap and clones dispatch over the same connection. Facades take one of
/// these at construction, not per operation.
#[derive(Clone)]
pub struct Database {
    manager: ConnectionManager,
    keyspace: Keyspace,
    index: i64,
}

impl Database {
    /// The database index this handle is pinned to.
    #[must_use]
    pub fn index(&self) -> i64 {
        self.index
    }

    /// The keyspace applied to every key dispatched through this handle.
    #[must_use]
    pub fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }

    /// Rewrite a logical key into its physical form.
    #[must_use]
    pub fn merge(&self, key: &str) -> String {
        self.keyspace.merge(key)
    }

    /// Clone of the underlying connection manager.
    ///
    /// Escape hatch for commands the facades do not cover; the clone shares
    /// the same multiplexed connection.
    #[must_use]
    pub fn connection_manager(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("index", &self.index)
            .field("keyspace", &self.keyspace)
            .finish_non_exhaustive()
    }
}
