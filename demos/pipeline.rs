//! Pipelining: many commands, one write.
//!
//! Run with: cargo run --example pipeline

use std::time::Instant;

use resply::{command, Connection, Result};

const COMMANDS: usize = 1000;

#[tokio::main]
async fn main() -> Result<()> {
    let mut conn = Connection::new("127.0.0.1:6379")?;
    conn.connect().await?;
    conn.send(command::del("resply:counter")).await.into_result()?;

    let start = Instant::now();
    let mut pipeline = conn.pipeline();
    for _ in 0..COMMANDS {
        pipeline.add(command::incr("resply:counter"));
    }
    let replies = pipeline.send().await;
    println!(
        "{} INCRs in {:?}, last reply: {}",
        replies.len(),
        start.elapsed(),
        replies.last().map(ToString::to_string).unwrap_or_default()
    );

    conn.send(command::del("resply:counter")).await.into_result()?;
    Ok(())
}
