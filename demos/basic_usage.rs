//! Basic Usage Example
//!
//! Demonstrates the typed facades: strings, hashes, lists and sorted sets,
//! all sharing one connection hub and one keyspace.
//!
//! Run with: cargo run --example basic_usage

use serde::{Deserialize, Serialize};
use std::time::Duration;
use typed_redis_cache::{CacheClient, ConnectionSettings, Expiry, KeyCommands, Order, SetWhen};

#[derive(Debug, Serialize, Deserialize)]
struct Session {
    user: String,
    role: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("=== Typed Redis Cache: Basic Usage ===\n");

    // 1. Connect; every key below lands under the "demo" prefix
    let settings = ConnectionSettings::default().with_client_name("demo");
    let client = CacheClient::connect(settings).await?;

    let latency = client.ping().await?;
    println!("✅ Connected (PING {latency:?})\n");

    // 2. Typed string values with a TTL
    let strings = client.strings();
    let session = Session {
        user: "alice".to_string(),
        role: "admin".to_string(),
    };

    println!("Storing session with a 5 minute TTL...");
    strings
        .set("session:1", &session, Expiry::In(Duration::from_secs(300)))
        .await?;

    if let Some(found) = strings.get::<Session>("session:1").await? {
        println!("✅ Retrieved: {} ({})", found.user, found.role);
    }
    if let Some(ttl) = strings.time_to_live("session:1").await? {
        println!("   TTL remaining: {ttl:?}");
    }
    println!();

    // 3. Hash fields as a profile record
    let hashes = client.hashes();
    hashes
        .set_raw("profile:alice", "city", "Hanoi", SetWhen::Always)
        .await?;
    hashes.increment("profile:alice", "logins", 1).await?;

    let profile = hashes.get_all_raw("profile:alice").await?;
    println!("Profile fields: {profile:?}\n");

    // 4. A list as a work queue
    let lists = client.lists();
    for job in ["resize:1", "resize:2", "resize:3"] {
        lists.push_right_raw("jobs", job).await?;
    }
    while let Some(job) = lists.pop_left_raw("jobs").await? {
        println!("Processing {job}");
    }
    println!();

    // 5. A sorted set as a leaderboard
    let board = client.sorted_sets();
    board.add("board", "alice", 10.0, SetWhen::Always).await?;
    board.add("board", "bob", 20.0, SetWhen::Always).await?;
    board.increment("board", "alice", 15.0).await?;

    println!("=== Leaderboard ===");
    let ranked = board
        .range_by_rank_with_scores("board", 0, -1, Order::Descending)
        .await?;
    for (rank, (member, score)) in ranked.iter().enumerate() {
        println!("#{} {member} with {score}", rank + 1);
    }

    // 6. Clean up the demo keys
    for key in ["session:1", "profile:alice", "board"] {
        strings.remove(key).await?;
    }

    Ok(())
}
