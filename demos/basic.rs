//! Basic request/response usage.
//!
//! Run with: cargo run --example basic
//!
//! Requires a Redis server on 127.0.0.1:6379.

use resply::{command, ConnectionBuilder, Result};

#[tokio::main]
async fn main() -> Result<()> {
    let mut conn = ConnectionBuilder::new()
        .address("redis://127.0.0.1:6379")
        .connect()
        .await?;

    println!("PING -> {}", conn.send(command::ping()).await);

    conn.send(command::set("resply:greeting", "Hello, RESP!"))
        .await
        .into_result()?;
    println!("GET -> {}", conn.send(command::get("resply:greeting")).await);

    // Any command can be sent as a plain argument vector.
    let reply = conn.command(["MGET", "resply:greeting", "resply:missing"]).await;
    println!("MGET ->\n{}", reply);

    conn.send(command::del("resply:greeting")).await.into_result()?;
    conn.close().await;
    Ok(())
}
