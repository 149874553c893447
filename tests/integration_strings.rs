//! Integration tests for the string facade
//!
//! These tests verify typed set/get, expiry and counter operations against a
//! real Redis instance.

mod common;

use common::*;
use std::time::Duration;
use typed_redis_cache::{Expiry, KeyCommands};

/// Test typed set and get round-trip
#[tokio::test]
async fn test_set_and_get_typed() {
    let client = setup_client().await.expect("Failed to connect");
    let strings = client.strings();
    let key = test_key("string_basic");
    let user = test_data::User::new(1);

    strings
        .set(&key, &user, Expiry::Never)
        .await
        .expect("Failed to set value");

    let found: Option<test_data::User> = strings.get(&key).await.expect("Failed to get value");
    assert_eq!(found, Some(user));

    let _ = strings.remove(&key).await;
}

/// Test that a missing key reads back as None, not an error
#[tokio::test]
async fn test_get_missing_key_is_none() {
    let client = setup_client().await.unwrap();
    let strings = client.strings();

    let found: Option<test_data::User> = strings.get(&test_key("string_missing")).await.unwrap();
    assert_eq!(found, None);
}

/// Test that stored keys carry the keyspace prefix on the server
#[tokio::test]
async fn test_keys_are_stored_under_prefix() {
    let client = setup_client().await.unwrap();
    let strings = client.strings();
    let key = test_key("string_prefixed");

    strings.set_raw(&key, "hello", Expiry::Never).await.unwrap();

    // Read the physical key through a raw connection, bypassing the facade
    let mut conn = client.hub().default_database().connection_manager();
    let physical: Option<String> = redis::cmd("GET")
        .arg(format!("itest:{key}"))
        .query_async(&mut conn)
        .await
        .unwrap();
    assert_eq!(physical.as_deref(), Some("hello"));

    let _ = strings.remove(&key).await;
}

/// Test that set with a TTL expires atomically
#[tokio::test]
async fn test_set_with_expiry() {
    let client = setup_client().await.unwrap();
    let strings = client.strings();
    let key = test_key("string_ttl");

    strings
        .set_raw(&key, "volatile", Expiry::In(Duration::from_millis(150)))
        .await
        .unwrap();

    assert_eq!(
        strings.get_raw(&key).await.unwrap().as_deref(),
        Some("volatile")
    );
    assert!(strings.time_to_live(&key).await.unwrap().is_some());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(strings.get_raw(&key).await.unwrap(), None);
}

/// Test that decoding into the wrong shape surfaces an error
#[tokio::test]
async fn test_wrong_shape_is_an_error() {
    let client = setup_client().await.unwrap();
    let strings = client.strings();
    let key = test_key("string_shape");

    strings
        .set(&key, &test_data::User::new(2), Expiry::Never)
        .await
        .unwrap();

    let result: anyhow::Result<Option<test_data::Product>> = strings.get(&key).await;
    assert!(result.is_err(), "Product cannot decode from a User payload");

    let _ = strings.remove(&key).await;
}

/// Test integer increment and decrement
#[tokio::test]
async fn test_increment_and_decrement() {
    let client = setup_client().await.unwrap();
    let strings = client.strings();
    let key = test_key("string_counter");

    assert_eq!(strings.increment(&key, 5).await.unwrap(), 5);
    assert_eq!(strings.increment(&key, 2).await.unwrap(), 7);
    assert_eq!(strings.decrement(&key, 3).await.unwrap(), 4);

    let _ = strings.remove(&key).await;
}

/// Test float increments
#[tokio::test]
async fn test_increment_by_float() {
    let client = setup_client().await.unwrap();
    let strings = client.strings();
    let key = test_key("string_float");

    let value = strings.increment_by_float(&key, 1.5).await.unwrap();
    assert!((value - 1.5).abs() < f64::EPSILON);
    let value = strings.decrement_by_float(&key, 0.5).await.unwrap();
    assert!((value - 1.0).abs() < f64::EPSILON);

    let _ = strings.remove(&key).await;
}

/// Test append semantics on present and absent keys
#[tokio::test]
async fn test_append() {
    let client = setup_client().await.unwrap();
    let strings = client.strings();
    let key = test_key("string_append");

    assert_eq!(strings.append(&key, "Hello").await.unwrap(), 5);
    assert_eq!(strings.append(&key, " World").await.unwrap(), 11);
    assert_eq!(
        strings.get_raw(&key).await.unwrap().as_deref(),
        Some("Hello World")
    );

    let _ = strings.remove(&key).await;
}

/// Test set with an absolute deadline
#[tokio::test]
async fn test_set_with_absolute_expiry() {
    let client = setup_client().await.unwrap();
    let strings = client.strings();
    let key = test_key("string_exat");

    let deadline = std::time::SystemTime::now() + Duration::from_secs(30);
    strings
        .set_raw(&key, "deadline", Expiry::At(deadline))
        .await
        .unwrap();

    let ttl = strings.time_to_live(&key).await.unwrap();
    let remaining = ttl.expect("key should carry a TTL");
    assert!(remaining <= Duration::from_secs(30));
    assert!(remaining > Duration::from_secs(20));

    let _ = strings.remove(&key).await;
}
