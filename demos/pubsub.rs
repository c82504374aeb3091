//! Publish/subscribe with one subscriber and one publisher connection.
//!
//! Run with: cargo run --example pubsub

use std::time::Duration;

use resply::{command, Connection, Result};

#[tokio::main]
async fn main() -> Result<()> {
    let mut subscriber = Connection::new("127.0.0.1:6379")?;
    subscriber.connect().await?;

    subscriber
        .subscribe("resply:news", |channel: &str, payload: &[u8]| {
            println!("[{}] {}", channel, String::from_utf8_lossy(payload));
        })
        .await
        .into_result()?;
    subscriber
        .psubscribe("resply:sport.*", |channel: &str, payload: &[u8]| {
            println!("[{} via pattern] {}", channel, String::from_utf8_lossy(payload));
        })
        .await
        .into_result()?;

    let listener = tokio::spawn(async move { subscriber.listen().await });

    let mut publisher = Connection::new("127.0.0.1:6379")?;
    publisher.connect().await?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    for (channel, message) in [
        ("resply:news", "first"),
        ("resply:sport.tennis", "match point"),
        ("resply:news", "second"),
    ] {
        let receivers = publisher.send(command::publish(channel, message)).await;
        println!("published to {} ({} receivers)", channel, receivers);
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    listener.abort();
    Ok(())
}
