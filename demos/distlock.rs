//! Two clients competing for the same Redlock.
//!
//! Run with: cargo run --example distlock
//!
//! Expects Redis instances on ports 6379 through 6383.

use std::time::Duration;

use resply::{Redlock, Result};

const INSTANCES: [&str; 5] = [
    "localhost:6379",
    "localhost:6380",
    "localhost:6381",
    "localhost:6382",
    "localhost:6383",
];

#[tokio::main]
async fn main() -> Result<()> {
    let mut first = Redlock::new("resply-demo", INSTANCES)?;
    let mut second = Redlock::new("resply-demo", INSTANCES)?;
    println!("first: {} instances connected", first.initialize().await);
    println!("second: {} instances connected", second.initialize().await);

    match first.lock(Duration::from_millis(750)).await {
        Some(validity) => println!("first lock: acquired, valid for {:?}", validity),
        None => println!("first lock: failed"),
    }
    match second.lock(Duration::from_millis(500)).await {
        Some(_) => println!("second lock: acquired (unexpected)"),
        None => println!("second lock: failed, as expected"),
    }

    first.unlock().await;
    if second.lock(Duration::from_millis(500)).await.is_some() {
        println!("second lock: acquired after release");
        second.unlock().await;
    }
    Ok(())
}
