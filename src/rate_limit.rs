use async_trait::async_trait;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::errors::StoreError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed per key in one window.
    pub limit: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 60,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }

    fn window_millis(&self) -> u64 {
        (self.window.as_millis() as u64).max(1)
    }
}

/// Counter backing for the limiter: one atomic increment per request.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increments the counter of `key` in `window_id` and returns the new count.
    async fn increment_and_get(&self, key: &str, window_id: u64) -> Result<u64, StoreError>;

    /// Short backend name for health reporting.
    fn name(&self) -> &'static str;

    /// Drops counters of windows before `current_window_id`. Stores whose
    /// entries expire on their own keep the default.
    fn purge_stale(&self, _current_window_id: u64) -> usize {
        0
    }
}

#[derive(Debug, Clone, Copy)]
struct WindowCount {
    window_id: u64,
    count: u64,
}

/// Process-local counters. Only valid for a single server instance.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    slots: Mutex<HashMap<String, WindowCount>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&self, key: &str, window_id: u64) -> Result<u64, StoreError> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| StoreError::Internal("memory counter lock poisoned".to_string()))?;

        let slot = slots.entry(key.to_string()).or_insert(WindowCount {
            window_id,
            count: 0,
        });

        // a newer window replaces the stale one in place
        if window_id > slot.window_id {
            slot.window_id = window_id;
            slot.count = 0;
        }
        // a late caller of an already replaced window must not charge the current one
        if window_id < slot.window_id {
            return Ok(1);
        }

        slot.count += 1;
        Ok(slot.count)
    }

    fn drop_stale(&self, current_window_id: u64) -> usize {
        match self.slots.lock() {
            Ok(mut slots) => {
                let before = slots.len();
                slots.retain(|_, slot| slot.window_id >= current_window_id);
                before - slots.len()
            }
            Err(_) => 0,
        }
    }

    pub fn tracked_keys(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment_and_get(&self, key: &str, window_id: u64) -> Result<u64, StoreError> {
        self.bump(key, window_id)
    }

    fn name(&self) -> &'static str {
        "memory"
    }

    fn purge_stale(&self, current_window_id: u64) -> usize {
        self.drop_stale(current_window_id)
    }
}

/// Counters shared across server processes through Redis.
#[derive(Clone)]
pub struct RedisCounterStore {
    conn: ConnectionManager,
    ttl_secs: i64,
}

impl RedisCounterStore {
    pub async fn connect(url: &str, window: Duration) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let mut conn = client.get_connection_manager().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;

        Ok(Self {
            conn,
            ttl_secs: window.as_secs() as i64 + 1,
        })
    }

    fn counter_key(key: &str, window_id: u64) -> String {
        format!("mcp:rate_limit:{}:{}", key, window_id)
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn increment_and_get(&self, key: &str, window_id: u64) -> Result<u64, StoreError> {
        let counter_key = Self::counter_key(key, window_id);
        let mut conn = self.conn.clone();

        let (count,): (u64,) = redis::pipe()
            .atomic()
            .incr(&counter_key, 1u64)
            .expire(&counter_key, self.ttl_secs)
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(count)
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub limit: u32,
    pub remaining: u32,
    /// Time until the current window closes.
    pub reset_after: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed(Quota),
    Rejected { limit: u32, retry_after: Duration },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed(_))
    }
}

pub struct RateLimiter {
    config: RateLimitConfig,
    store: Arc<dyn CounterStore>,
    fallback: MemoryCounterStore,
    // shared store was configured but never reached
    shared_unavailable: bool,
    failing: AtomicBool,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, store: Arc<dyn CounterStore>) -> Self {
        Self {
            config,
            store,
            fallback: MemoryCounterStore::new(),
            shared_unavailable: false,
            failing: AtomicBool::new(false),
        }
    }

    pub fn in_memory(config: RateLimitConfig) -> Self {
        Self::new(config, Arc::new(MemoryCounterStore::new()))
    }

    /// Memory-backed limiter standing in for an unreachable shared store.
    pub fn degraded(config: RateLimitConfig) -> Self {
        let mut limiter = Self::in_memory(config);
        limiter.shared_unavailable = true;
        limiter
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    pub fn is_degraded(&self) -> bool {
        self.shared_unavailable || self.failing.load(Ordering::Relaxed)
    }

    /// Wall-clock time as a duration since the UNIX epoch.
    pub fn now() -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
    }

    pub fn window_id(&self, now: Duration) -> u64 {
        now.as_millis() as u64 / self.config.window_millis()
    }

    pub async fn check_and_increment(&self, key: &str, now: Duration) -> RateDecision {
        self.check_and_increment_with_limit(key, self.config.limit, now)
            .await
    }

    pub async fn check_and_increment_with_limit(
        &self,
        key: &str,
        limit: u32,
        now: Duration,
    ) -> RateDecision {
        let window_ms = self.config.window_millis();
        let now_ms = now.as_millis() as u64;
        let window_id = now_ms / window_ms;
        let window_end = (window_id + 1) * window_ms;
        let until_reset = Duration::from_millis(window_end - now_ms);

        let count = match self.store.increment_and_get(key, window_id).await {
            Ok(count) => {
                if self.failing.swap(false, Ordering::Relaxed) {
                    tracing::info!("{} counter store recovered", self.store.name());
                }
                count
            }
            Err(e) => {
                tracing::error!("Counter store error, falling back to memory: {}", e);
                self.failing.store(true, Ordering::Relaxed);
                // the fallback's own lock cannot be poisoned by the shared store
                self.fallback.bump(key, window_id).unwrap_or(u64::MAX)
            }
        };

        if count > limit as u64 {
            tracing::warn!("Rate limit exceeded for client: {}", key);
            return RateDecision::Rejected {
                limit,
                retry_after: until_reset,
            };
        }

        RateDecision::Allowed(Quota {
            limit,
            remaining: limit - count as u32,
            reset_after: until_reset,
        })
    }

    /// Drops counters of windows that ended before `now`.
    pub fn purge_stale(&self, now: Duration) -> usize {
        let current = self.window_id(now);
        self.store.purge_stale(current) + self.fallback.drop_stale(current)
    }
}

/// Periodically purges stale windows. Without it memory counters keep one
/// slot for every key ever seen.
pub fn spawn_sweeper(limiter: Arc<RateLimiter>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = limiter.purge_stale(RateLimiter::now());
            if removed > 0 {
                tracing::debug!("Swept {} stale rate-limit windows", removed);
            }
        }
    })
}
