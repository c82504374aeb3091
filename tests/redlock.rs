mod common;

use std::time::Duration;

use common::{closed_port, MockServer};
use resply::Redlock;

const RESOURCE: &str = "resply-test";

async fn start_servers(count: usize) -> Vec<MockServer> {
    let mut servers = Vec::with_capacity(count);
    for _ in 0..count {
        servers.push(MockServer::start().await);
    }
    servers
}

async fn redlock(servers: &[MockServer]) -> Redlock {
    let mut lock = Redlock::new(RESOURCE, servers.iter().map(MockServer::address)).unwrap();
    lock.set_retry_delay_max(Duration::from_millis(5));
    assert_eq!(lock.initialize().await, servers.len());
    lock
}

#[tokio::test]
async fn test_second_lock_fails_while_held() {
    let servers = start_servers(5).await;
    let mut first = redlock(&servers).await;
    let mut second = redlock(&servers).await;

    let validity = first.lock(Duration::from_millis(750)).await;
    assert!(validity.is_some());
    assert!(validity.unwrap() < Duration::from_millis(750));
    for server in &servers {
        assert_eq!(server.value(RESOURCE).as_deref(), Some(first.value()));
    }

    assert_eq!(second.lock(Duration::from_millis(500)).await, None);
    // The failed attempt must not disturb the holder's keys.
    for server in &servers {
        assert_eq!(server.value(RESOURCE).as_deref(), Some(first.value()));
    }

    first.unlock().await;
    for server in &servers {
        assert_eq!(server.value(RESOURCE), None);
    }
    assert!(second.lock(Duration::from_millis(500)).await.is_some());
    second.unlock().await;
}

#[tokio::test]
async fn test_majority_is_enough() {
    let servers = start_servers(5).await;
    // Another holder already owns two instances.
    servers[0].insert(RESOURCE, "someone-else");
    servers[1].insert(RESOURCE, "someone-else");

    let mut lock = redlock(&servers).await;
    assert!(lock.lock(Duration::from_secs(1)).await.is_some());

    lock.unlock().await;
    assert_eq!(servers[0].value(RESOURCE).as_deref(), Some("someone-else"));
    assert_eq!(servers[1].value(RESOURCE).as_deref(), Some("someone-else"));
    for server in &servers[2..] {
        assert_eq!(server.value(RESOURCE), None);
    }
}

#[tokio::test]
async fn test_minority_fails_and_releases() {
    let servers = start_servers(5).await;
    for server in &servers[..3] {
        server.insert(RESOURCE, "someone-else");
    }

    let mut lock = redlock(&servers).await;
    lock.set_retry_count(2);
    assert_eq!(lock.lock(Duration::from_secs(1)).await, None);

    for server in &servers[..3] {
        assert_eq!(server.value(RESOURCE).as_deref(), Some("someone-else"));
    }
    for server in &servers[3..] {
        assert_eq!(server.value(RESOURCE), None);
    }
}

#[tokio::test]
async fn test_unreachable_instances_count_as_failures() {
    let servers = start_servers(3).await;
    let mut addresses: Vec<String> = servers.iter().map(MockServer::address).collect();
    addresses.push(format!("127.0.0.1:{}", closed_port().await));
    addresses.push(format!("127.0.0.1:{}", closed_port().await));

    let mut lock = Redlock::new(RESOURCE, &addresses).unwrap();
    assert_eq!(lock.initialize().await, 3);
    assert_eq!(lock.quorum(), 3);
    assert!(lock.lock(Duration::from_secs(1)).await.is_some());
    lock.unlock().await;

    servers[0].insert(RESOURCE, "someone-else");
    lock.set_retry_count(1);
    assert_eq!(lock.lock(Duration::from_secs(1)).await, None);
}

#[tokio::test]
async fn test_unlock_is_idempotent() {
    let servers = start_servers(3).await;
    let mut lock = redlock(&servers).await;

    lock.unlock().await;
    assert!(lock.lock(Duration::from_secs(1)).await.is_some());
    lock.unlock().await;
    lock.unlock().await;
    for server in &servers {
        assert_eq!(server.value(RESOURCE), None);
    }
}

#[tokio::test]
async fn test_lock_expires_on_its_own() {
    let servers = start_servers(3).await;
    let mut first = redlock(&servers).await;
    let mut second = redlock(&servers).await;

    assert!(first.lock(Duration::from_millis(100)).await.is_some());
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(second.lock(Duration::from_secs(1)).await.is_some());
    second.unlock().await;
}

#[tokio::test]
async fn test_drop_releases_held_lock() {
    let servers = start_servers(3).await;
    {
        let mut lock = redlock(&servers).await;
        assert!(lock.lock(Duration::from_secs(10)).await.is_some());
    }

    for _ in 0..100 {
        if servers.iter().all(|s| s.value(RESOURCE).is_none()) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("dropped lock was not released");
}
