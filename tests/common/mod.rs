//! Common utilities for integration tests
//!
//! Every suite here talks to a real Redis instance. Keys carry a random
//! suffix so parallel test runs cannot collide, and the shared client uses a
//! dedicated keyspace prefix so leftovers are easy to spot and sweep.

use anyhow::Result;
use typed_redis_cache::{CacheClient, ConnectionSettings};

/// Redis host list from the environment, or the local default.
pub fn redis_hosts() -> String {
    std::env::var("REDIS_HOSTS").unwrap_or_else(|_| "127.0.0.1:6379".to_string())
}

/// Settings the suites connect with: test keyspace, admin off, database 0.
pub fn test_settings() -> ConnectionSettings {
    ConnectionSettings::default()
        .with_hosts(redis_hosts())
        .with_client_name("itest")
}

/// Connect a client with the standard test settings.
pub async fn setup_client() -> Result<CacheClient> {
    CacheClient::connect(test_settings()).await
}

/// Create a test key with a unique suffix to avoid conflicts between tests.
pub fn test_key(name: &str) -> String {
    format!("test_{}_{}", name, rand::random::<u32>())
}

/// Create a unique channel name for Pub/Sub tests.
pub fn test_channel(name: &str) -> String {
    format!("test-channel:{}:{}", name, rand::random::<u32>())
}

/// Test model types
pub mod test_data {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct User {
        pub id: u64,
        pub name: String,
        pub email: String,
    }

    impl User {
        pub fn new(id: u64) -> Self {
            Self {
                id,
                name: format!("User {id}"),
                email: format!("user{id}@example.com"),
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct Product {
        pub id: u64,
        pub name: String,
        pub price: f64,
        pub category: String,
    }

    impl Product {
        pub fn new(id: u64) -> Self {
            Self {
                id,
                name: format!("Product {id}"),
                price: 99.99 + (id as f64),
                category: format!("Category {}", id % 5),
            }
        }
    }
}

/// Wait for a condition with timeout
pub async fn wait_for<F>(mut condition: F, timeout_ms: u64) -> bool
where
    F: FnMut() -> bool,
{
    use tokio::time::{Duration, sleep};

    let start = std::time::Instant::now();
    let timeout = Duration::from_millis(timeout_ms);

    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_generation() {
        let key1 = test_key("user");
        let key2 = test_key("user");
        assert_ne!(key1, key2, "Keys should be unique");
        assert!(key1.starts_with("test_user_"));
    }

    #[test]
    fn test_data_generation() {
        let user = test_data::User::new(123);
        assert_eq!(user.id, 123);
        assert_eq!(user.name, "User 123");
        assert_eq!(user.email, "user123@example.com");
    }
}
