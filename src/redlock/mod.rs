//! # Resply Redlock
//!
//! Distributed mutual exclusion over several independent servers.
//!
//! A lock is held when a strict majority of instances accepted
//! `SET resource value NX PX ttl` and the time spent acquiring it still
//! leaves a positive validity window once clock drift is accounted for.
//! Release runs a compare-and-delete script on every instance, so only
//! the holder of the random value can delete the key.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use rand::rngs::{OsRng, StdRng};
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::core::command;
use crate::core::connection::Connection;
use crate::proto::reply::Reply;
use crate::Result;

/// Fraction of the TTL reserved for clock drift between instances.
const CLOCK_DRIFT_DIV: u64 = 100;

/// Number of acquisition attempts made by [`Redlock::lock`] by default.
pub const DEFAULT_RETRY_COUNT: usize = 3;

/// Upper bound of the random pause between attempts by default.
pub const DEFAULT_RETRY_DELAY_MAX: Duration = Duration::from_millis(200);

/// Deletes the key only if it still holds our value.
const UNLOCK_SCRIPT: &str = r#"if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end"#;

/// A connection shared between a lock and other users.
pub type SharedConnection = Arc<Mutex<Connection>>;

/// A distributed lock on one resource name.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use resply::Redlock;
///
/// # #[tokio::main]
/// # async fn main() -> resply::Result<()> {
/// let mut lock = Redlock::new(
///     "jobs:nightly",
///     ["10.0.0.1:6379", "10.0.0.2:6379", "10.0.0.3:6379"],
/// )?;
/// lock.initialize().await;
///
/// if let Some(validity) = lock.lock(Duration::from_secs(10)).await {
///     println!("lock held for {:?}", validity);
///     lock.unlock().await;
/// }
/// # Ok(())
/// # }
/// ```
pub struct Redlock {
    resource: String,
    value: String,
    instances: Vec<SharedConnection>,
    retry_count: usize,
    retry_delay_max: Duration,
    rng: StdRng,
    held: bool,
}

impl Redlock {
    /// Creates an unconnected lock over one instance per address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`](crate::Error::InvalidArgument) if
    /// an address cannot be parsed.
    pub fn new<I>(resource: impl Into<String>, addresses: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let instances = addresses
            .into_iter()
            .map(|address| Connection::new(address.as_ref()).map(|c| Arc::new(Mutex::new(c))))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::with_connections(resource, instances))
    }

    /// Creates a lock over existing connections.
    pub fn with_connections(resource: impl Into<String>, instances: Vec<SharedConnection>) -> Self {
        Self {
            resource: resource.into(),
            value: lock_value(),
            instances,
            retry_count: DEFAULT_RETRY_COUNT,
            retry_delay_max: DEFAULT_RETRY_DELAY_MAX,
            rng: StdRng::from_entropy(),
            held: false,
        }
    }

    /// Connects every instance that is not connected yet.
    ///
    /// Unreachable instances are logged and skipped; they count as failed
    /// votes in [`lock`](Redlock::lock). Returns how many are connected.
    pub async fn initialize(&self) -> usize {
        let connected = join_all(self.instances.iter().map(|instance| async move {
            let mut conn = instance.lock().await;
            if conn.is_connected() {
                return true;
            }
            match conn.connect().await {
                Ok(()) => true,
                Err(e) => {
                    warn!(host = conn.host(), port = conn.port(), error = %e, "lock instance unavailable");
                    false
                }
            }
        }))
        .await;
        connected.into_iter().filter(|ok| *ok).count()
    }

    /// Tries to acquire the lock for `ttl`.
    ///
    /// Makes up to [`retry_count`](Redlock::retry_count) attempts. Each
    /// attempt asks every instance in parallel and succeeds when a majority
    /// agreed and validity remains. A failed attempt releases whatever it
    /// acquired, then pauses for a random delay before the next one.
    ///
    /// Returns the remaining validity, or `None` if the lock was not taken.
    #[instrument(skip(self), fields(resource = %self.resource), level = "debug")]
    pub async fn lock(&mut self, ttl: Duration) -> Option<Duration> {
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        let quorum = self.quorum();

        for attempt in 1..=self.retry_count {
            let start = Instant::now();
            let acquired = self.lock_instances(ttl_ms).await;
            let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
            let validity = validity_ms(ttl_ms, elapsed_ms);

            if acquired >= quorum && validity > 0 {
                debug!(attempt, acquired, validity, "lock acquired");
                self.held = true;
                return Some(Duration::from_millis(validity));
            }

            debug!(attempt, acquired, quorum, validity, "lock attempt failed");
            self.unlock().await;

            if attempt < self.retry_count {
                let delay = self.retry_delay();
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
        None
    }

    /// Releases the lock on every instance.
    ///
    /// Instances holding another client's value are left untouched.
    /// Calling it again, or without holding the lock, is harmless.
    pub async fn unlock(&mut self) {
        let resource = self.resource.as_str();
        let value = self.value.as_str();
        join_all(
            self.instances
                .iter()
                .map(|instance| unlock_instance(instance, resource, value)),
        )
        .await;
        self.held = false;
    }

    /// Minimum number of instances that must agree: a strict majority.
    pub fn quorum(&self) -> usize {
        quorum(self.instances.len())
    }

    /// The locked resource name.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// The random value identifying this lock holder.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// The instances the lock is spread over.
    pub fn instances(&self) -> &[SharedConnection] {
        &self.instances
    }

    /// Number of acquisition attempts made by [`lock`](Redlock::lock).
    pub fn retry_count(&self) -> usize {
        self.retry_count
    }

    /// Sets the number of acquisition attempts.
    pub fn set_retry_count(&mut self, retry_count: usize) {
        self.retry_count = retry_count;
    }

    /// Upper bound of the random pause between attempts.
    pub fn retry_delay_max(&self) -> Duration {
        self.retry_delay_max
    }

    /// Sets the upper bound of the random pause between attempts.
    /// Zero disables the pause.
    pub fn set_retry_delay_max(&mut self, retry_delay_max: Duration) {
        self.retry_delay_max = retry_delay_max;
    }

    async fn lock_instances(&self, ttl_ms: u64) -> usize {
        let resource = self.resource.as_str();
        let value = self.value.as_str();
        join_all(
            self.instances
                .iter()
                .map(|instance| lock_instance(instance, resource, value, ttl_ms)),
        )
        .await
        .into_iter()
        .filter(|acquired| *acquired)
        .count()
    }

    fn retry_delay(&mut self) -> Duration {
        let max_ms = u64::try_from(self.retry_delay_max.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(self.rng.gen_range(1..=max_ms))
    }
}

impl fmt::Debug for Redlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Redlock")
            .field("resource", &self.resource)
            .field("instances", &self.instances.len())
            .field("retry_count", &self.retry_count)
            .field("retry_delay_max", &self.retry_delay_max)
            .field("held", &self.held)
            .finish()
    }
}

impl Drop for Redlock {
    fn drop(&mut self) {
        if !self.held {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(resource = %self.resource, "lock dropped outside a runtime, left to expire");
            return;
        };

        let instances = std::mem::take(&mut self.instances);
        let resource = std::mem::take(&mut self.resource);
        let value = std::mem::take(&mut self.value);
        handle.spawn(async move {
            join_all(
                instances
                    .iter()
                    .map(|instance| unlock_instance(instance, &resource, &value)),
            )
            .await;
        });
    }
}

async fn lock_instance(instance: &Mutex<Connection>, resource: &str, value: &str, ttl_ms: u64) -> bool {
    let mut conn = instance.lock().await;
    let reply = conn.send(command::set_nx_px(resource, value, ttl_ms)).await;
    if let Reply::IOError(message) = &reply {
        debug!(host = conn.host(), port = conn.port(), %message, "lock instance failed");
    }
    reply.is_ok()
}

async fn unlock_instance(instance: &Mutex<Connection>, resource: &str, value: &str) {
    let mut conn = instance.lock().await;
    let reply = conn
        .send(command::eval(UNLOCK_SCRIPT, [resource], [value]))
        .await;
    if reply.is_error() {
        debug!(host = conn.host(), port = conn.port(), %reply, "unlock failed");
    }
}

fn quorum(instances: usize) -> usize {
    instances / 2 + 1
}

/// Validity left after acquisition, minus the drift allowance.
fn validity_ms(ttl_ms: u64, elapsed_ms: u64) -> u64 {
    ttl_ms
        .saturating_sub(elapsed_ms)
        .saturating_sub(ttl_ms / CLOCK_DRIFT_DIV)
}

/// A 128-bit value from the OS random source, in base 36.
fn lock_value() -> String {
    to_base36(OsRng.gen::<u128>())
}

fn to_base36(mut n: u128) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    digits.iter().rev().map(|&d| d as char).collect()
}
