//! Integration tests for the hash facade
//!
//! These tests verify typed field operations, write conditions and whole-hash
//! reads against a real Redis instance.

mod common;

use common::*;
use std::collections::HashMap;
use typed_redis_cache::{KeyCommands, SetWhen};

/// Test typed field set and get round-trip
#[tokio::test]
async fn test_set_and_get_field() {
    let client = setup_client().await.expect("Failed to connect");
    let hashes = client.hashes();
    let key = test_key("hash_basic");
    let user = test_data::User::new(10);

    let created = hashes
        .set(&key, "owner", &user, SetWhen::Always)
        .await
        .expect("Failed to set field");
    assert!(created, "First write creates the field");

    let found: Option<test_data::User> = hashes.get(&key, "owner").await.unwrap();
    assert_eq!(found, Some(user));

    let _ = hashes.remove(&key).await;
}

/// Test that only-if-absent writes succeed once and then turn into no-ops
#[tokio::test]
async fn test_set_if_absent_wins_only_once() {
    let client = setup_client().await.unwrap();
    let hashes = client.hashes();
    let key = test_key("hash_nx");

    let first = hashes
        .set_raw(&key, "slot", "alpha", SetWhen::IfAbsent)
        .await
        .unwrap();
    assert!(first);

    let second = hashes
        .set_raw(&key, "slot", "beta", SetWhen::IfAbsent)
        .await
        .unwrap();
    assert!(!second, "Second only-if-absent write must not take effect");
    assert_eq!(
        hashes.get_raw(&key, "slot").await.unwrap().as_deref(),
        Some("alpha")
    );

    let _ = hashes.remove(&key).await;
}

/// Test that only-if-present writes are rejected for hash fields
#[tokio::test]
async fn test_set_if_present_is_rejected() {
    let client = setup_client().await.unwrap();
    let hashes = client.hashes();
    let key = test_key("hash_xx");

    let result = hashes
        .set_raw(&key, "slot", "value", SetWhen::IfPresent)
        .await;
    assert!(result.is_err(), "Redis has no HSET XX to honor");
}

/// Test remove and existence checks on fields
#[tokio::test]
async fn test_remove_and_field_exists() {
    let client = setup_client().await.unwrap();
    let hashes = client.hashes();
    let key = test_key("hash_exists");

    hashes
        .set_raw(&key, "field", "value", SetWhen::Always)
        .await
        .unwrap();
    assert!(hashes.field_exists(&key, "field").await.unwrap());

    assert!(hashes.remove_field(&key, "field").await.unwrap());
    assert!(!hashes.field_exists(&key, "field").await.unwrap());
    assert!(
        !hashes.remove_field(&key, "field").await.unwrap(),
        "Removing an absent field reports false"
    );
}

/// Test whole-hash typed read
#[tokio::test]
async fn test_get_all_typed() {
    let client = setup_client().await.unwrap();
    let hashes = client.hashes();
    let key = test_key("hash_all");

    let alice = test_data::User::new(1);
    let bob = test_data::User::new(2);
    hashes.set(&key, "alice", &alice, SetWhen::Always).await.unwrap();
    hashes.set(&key, "bob", &bob, SetWhen::Always).await.unwrap();

    let all: HashMap<String, test_data::User> = hashes.get_all(&key).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all.get("alice"), Some(&alice));
    assert_eq!(all.get("bob"), Some(&bob));
    assert_eq!(hashes.len(&key).await.unwrap(), 2);

    let _ = hashes.remove(&key).await;
}

/// Test that a missing hash reads back as an empty map
#[tokio::test]
async fn test_get_all_missing_key_is_empty() {
    let client = setup_client().await.unwrap();
    let hashes = client.hashes();

    let all: HashMap<String, test_data::User> =
        hashes.get_all(&test_key("hash_missing")).await.unwrap();
    assert!(all.is_empty());
}

/// Test integer and float field counters
#[tokio::test]
async fn test_field_counters() {
    let client = setup_client().await.unwrap();
    let hashes = client.hashes();
    let key = test_key("hash_counter");

    assert_eq!(hashes.increment(&key, "hits", 3).await.unwrap(), 3);
    assert_eq!(hashes.decrement(&key, "hits", 1).await.unwrap(), 2);

    let ratio = hashes.increment_by_float(&key, "ratio", 0.25).await.unwrap();
    assert!((ratio - 0.25).abs() < f64::EPSILON);

    let _ = hashes.remove(&key).await;
}
