//! Pub/Sub Listener Example
//!
//! Subscribes to a channel with a typed JSON handler, publishes a few
//! events and prints the subscriber counters. Channels are never
//! prefixed, so external publishers can use the same name.
//!
//! Run with: RUST_LOG=debug cargo run --example pubsub_listener

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use typed_redis_cache::{CacheClient, ConnectionSettings};

#[derive(Debug, Serialize, Deserialize)]
struct OrderEvent {
    id: u64,
    status: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber to see what the listener task does
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()),
        )
        .init();

    println!("=== Typed Redis Cache: Pub/Sub Listener ===\n");

    // 1. Connect; the client carries one shared subscriber
    let settings = ConnectionSettings::default().with_client_name("demo");
    let client = CacheClient::connect(settings).await?;

    // 2. Subscribe with a typed handler before publishing anything
    let seen = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&seen);

    let subscriber = client.subscriber();
    subscriber.subscribe_json("orders", move |event: OrderEvent| {
        let counter = Arc::clone(&counter);
        async move {
            println!("📨 Order {} is now {}", event.id, event.status);
            counter.fetch_add(1, Ordering::Relaxed);
            anyhow::Ok(())
        }
    });

    // Give the listener task a moment to attach
    tokio::time::sleep(Duration::from_millis(200)).await;

    // 3. Publish a few events through the typed publisher
    let publisher = client.publisher();
    for (id, status) in [(1, "created"), (1, "paid"), (2, "created")] {
        let event = OrderEvent {
            id,
            status: status.to_string(),
        };
        let receivers = publisher.publish("orders", &event).await?;
        println!("Published order {id} ({status}) to {receivers} subscriber(s)");
    }

    // 4. Wait for delivery, then inspect the counters
    tokio::time::sleep(Duration::from_millis(500)).await;

    let stats = subscriber.stats();
    println!("\n📊 Subscriber Stats:");
    println!("Messages received: {}", stats.messages_received);
    println!("Decode errors:     {}", stats.decode_errors);
    println!("Handler errors:    {}", stats.handler_errors);
    println!("Handled locally:   {}", seen.load(Ordering::Relaxed));

    // 5. Tear the subscription down
    subscriber.unsubscribe("orders");
    println!("\n✅ Unsubscribed, exiting");

    Ok(())
}
