//! Integration tests for key lifecycle and the connection hub
//!
//! These tests verify the shared KEY operations every facade inherits, plus
//! keyspace isolation and connection manager reuse across facades.

mod common;

use common::*;
use std::time::Duration;
use typed_redis_cache::{CacheClient, ConnectionSettings, Expiry, KeyCommands};

/// Test existence, removal and the absent-key answers
#[tokio::test]
async fn test_exists_and_remove() {
    let client = setup_client().await.expect("Failed to connect");
    let strings = client.strings();
    let key = test_key("key_exists");

    assert!(!strings.exists(&key).await.unwrap());

    strings.set_raw(&key, "here", Expiry::Never).await.unwrap();
    assert!(strings.exists(&key).await.unwrap());

    assert!(strings.remove(&key).await.unwrap());
    assert!(!strings.remove(&key).await.unwrap(), "Second delete is a no-op");
    assert!(!strings.exists(&key).await.unwrap());
}

/// Test TTL install, readback, persist and the persistent-key answer
#[tokio::test]
async fn test_expire_and_persist() {
    let client = setup_client().await.unwrap();
    let strings = client.strings();
    let key = test_key("key_ttl");

    strings.set_raw(&key, "value", Expiry::Never).await.unwrap();
    assert_eq!(
        strings.time_to_live(&key).await.unwrap(),
        None,
        "A persistent key has no TTL"
    );

    assert!(strings.expire_in(&key, Duration::from_secs(60)).await.unwrap());
    let ttl = strings.time_to_live(&key).await.unwrap().unwrap();
    assert!(ttl <= Duration::from_secs(60));
    assert!(ttl > Duration::from_secs(50));

    assert!(strings.persist(&key).await.unwrap());
    assert_eq!(strings.time_to_live(&key).await.unwrap(), None);
    assert!(!strings.persist(&key).await.unwrap(), "Already persistent");

    let _ = strings.remove(&key).await;
}

/// Test expiring at an absolute deadline
#[tokio::test]
async fn test_expire_at() {
    let client = setup_client().await.unwrap();
    let strings = client.strings();
    let key = test_key("key_deadline");

    strings.set_raw(&key, "value", Expiry::Never).await.unwrap();
    let deadline = std::time::SystemTime::now() + Duration::from_millis(200);
    assert!(strings.expire_at(&key, deadline).await.unwrap());

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(!strings.exists(&key).await.unwrap());
}

/// Test that rename moves the value and keeps both keys namespaced
#[tokio::test]
async fn test_rename() {
    let client = setup_client().await.unwrap();
    let strings = client.strings();
    let from = test_key("key_rename_from");
    let to = test_key("key_rename_to");

    strings.set_raw(&from, "moving", Expiry::Never).await.unwrap();
    strings.rename(&from, &to).await.unwrap();

    assert!(!strings.exists(&from).await.unwrap());
    assert_eq!(strings.get_raw(&to).await.unwrap().as_deref(), Some("moving"));

    let _ = strings.remove(&to).await;
}

/// Test that clients with different keyspaces cannot see each other's keys
#[tokio::test]
async fn test_keyspace_isolation() {
    let alpha = CacheClient::connect(
        ConnectionSettings::default()
            .with_hosts(redis_hosts())
            .with_client_name("itest-alpha"),
    )
    .await
    .unwrap();
    let beta = CacheClient::connect(
        ConnectionSettings::default()
            .with_hosts(redis_hosts())
            .with_client_name("itest-beta"),
    )
    .await
    .unwrap();

    let key = test_key("key_isolated");
    alpha
        .strings()
        .set_raw(&key, "alpha-data", Expiry::Never)
        .await
        .unwrap();

    assert_eq!(
        beta.strings().get_raw(&key).await.unwrap(),
        None,
        "Another keyspace must not see the key"
    );
    assert_eq!(
        alpha.strings().get_raw(&key).await.unwrap().as_deref(),
        Some("alpha-data")
    );

    let _ = alpha.strings().remove(&key).await;
}

/// Test that many facades over one database share one connection manager
#[tokio::test]
async fn test_facades_share_one_connection() {
    let client = setup_client().await.unwrap();

    let strings = client.strings();
    let hashes = client.hashes();
    let lists = client.lists();
    let sets = client.sets();
    let board = client.sorted_sets();

    let key = test_key("key_shared_conn");
    strings.set_raw(&key, "v", Expiry::Never).await.unwrap();
    let _ = hashes.len(&test_key("key_shared_hash")).await.unwrap();
    let _ = lists.len(&test_key("key_shared_list")).await.unwrap();
    let _ = sets.len(&test_key("key_shared_set")).await.unwrap();
    let _ = board.len(&test_key("key_shared_zset")).await.unwrap();

    assert_eq!(
        client.hub().managers_created(),
        1,
        "Facades must reuse the hub's manager, not open their own"
    );

    let _ = strings.remove(&key).await;
}

/// Test that another database index gets its own manager, created once
#[tokio::test]
async fn test_database_index_managers() {
    let client = setup_client().await.unwrap();
    assert_eq!(client.hub().managers_created(), 1);

    let db1 = client.database(1).await.unwrap();
    assert_eq!(db1.index(), 1);
    assert_eq!(client.hub().managers_created(), 2);

    // Requesting the same index again reuses the manager
    let _ = client.database(1).await.unwrap();
    assert_eq!(client.hub().managers_created(), 2);

    // A clone of the hub shares the map
    let hub_clone = client.hub().clone();
    let _ = hub_clone.database(1).await.unwrap();
    assert_eq!(hub_clone.managers_created(), 2);
}

/// Test the PING health check
#[tokio::test]
async fn test_ping() {
    let client = setup_client().await.unwrap();
    let latency = client.ping().await.unwrap();
    assert!(latency < Duration::from_secs(5));
}

/// Test that admin commands are refused unless explicitly allowed
#[tokio::test]
async fn test_flush_requires_allow_admin() {
    let client = setup_client().await.unwrap();
    let result = client.flush_database(0).await;
    assert!(result.is_err(), "allow_admin is off in test settings");
}
