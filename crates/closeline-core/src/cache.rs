//! In-memory memoization for rate-limited reference lookups.
//!
//! Entries are immutable once written and replaced wholesale. Series fetch
//! paths never go through this cache.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Defines the behavior of the in-memory cache for a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Read from the cache if a non-expired entry is present;
    /// otherwise compute and write the result. (Default)
    #[default]
    Use,
    /// Always compute, bypassing any cached entry, and write the new result.
    Refresh,
    /// Always compute and do not read from or write to the cache.
    Bypass,
}

/// Cache key: `(operation, symbol, parameters)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub operation: &'static str,
    pub symbol: Option<String>,
    pub params: String,
}

impl CacheKey {
    pub fn new(operation: &'static str, symbol: Option<&str>, params: impl Into<String>) -> Self {
        Self {
            operation,
            symbol: symbol.map(str::to_owned),
            params: params.into(),
        }
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.operation,
            self.symbol.as_deref().unwrap_or("-"),
            self.params
        )
    }
}

#[derive(Debug)]
struct CacheEntry {
    body: String,
    expires_at: Instant,
    last_used: AtomicU64,
}

#[derive(Debug)]
struct CacheInner {
    map: HashMap<CacheKey, CacheEntry>,
    default_ttl: Duration,
    capacity: usize,
    tick: AtomicU64,
}

impl CacheInner {
    fn new(default_ttl: Duration, capacity: usize) -> Self {
        Self {
            map: HashMap::new(),
            default_ttl,
            capacity,
            tick: AtomicU64::new(0),
        }
    }

    fn next_tick(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::Relaxed)
    }

    fn get(&self, key: &CacheKey) -> Option<String> {
        let entry = self.map.get(key)?;
        if Instant::now() > entry.expires_at {
            return None;
        }
        entry.last_used.store(self.next_tick(), Ordering::Relaxed);
        Some(entry.body.clone())
    }

    fn put(&mut self, key: CacheKey, body: String, ttl_override: Option<Duration>) {
        let ttl = ttl_override.unwrap_or(self.default_ttl);
        let expires_at = Instant::now() + ttl;

        if !self.map.contains_key(&key) && self.map.len() >= self.capacity {
            self.evict_one();
        }

        let last_used = AtomicU64::new(self.next_tick());
        self.map.insert(
            key,
            CacheEntry {
                body,
                expires_at,
                last_used,
            },
        );
    }

    // Expired entries go first; otherwise the least recently used one.
    fn evict_one(&mut self) {
        let now = Instant::now();
        let before = self.map.len();
        self.map.retain(|_, entry| entry.expires_at >= now);
        if self.map.len() < before {
            return;
        }

        let victim = self
            .map
            .iter()
            .min_by_key(|(_, entry)| entry.last_used.load(Ordering::Relaxed))
            .map(|(key, _)| key.clone());
        if let Some(victim) = victim {
            self.map.remove(&victim);
        }
    }

    fn clear_expired(&mut self) {
        let now = Instant::now();
        self.map.retain(|_, entry| entry.expires_at > now);
    }

    fn is_disabled(&self) -> bool {
        self.default_ttl == Duration::ZERO || self.capacity == 0
    }
}

/// Thread-safe bounded TTL cache for serialized results.
#[derive(Debug, Clone)]
pub struct CacheStore {
    inner: Arc<tokio::sync::RwLock<CacheInner>>,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(120), 128)
    }
}

impl CacheStore {
    pub fn new(default_ttl: Duration, capacity: usize) -> Self {
        Self {
            inner: Arc::new(tokio::sync::RwLock::new(CacheInner::new(
                default_ttl,
                capacity,
            ))),
        }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, 0)
    }

    /// Returns the cached body if present and not expired.
    pub async fn get(&self, key: &CacheKey) -> Option<String> {
        let store = self.inner.read().await;
        store.get(key)
    }

    /// Stores a body. No-op when the cache is disabled.
    pub async fn put(&self, key: CacheKey, body: String, ttl_override: Option<Duration>) {
        let mut store = self.inner.write().await;
        if store.is_disabled() {
            return;
        }
        store.put(key, body, ttl_override);
    }

    /// Typed read; an entry that no longer deserializes counts as a miss.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let body = self.get(key).await?;
        serde_json::from_str(&body).ok()
    }

    pub async fn put_json<T: Serialize>(&self, key: CacheKey, value: &T) {
        match serde_json::to_string(value) {
            Ok(body) => self.put(key, body, None).await,
            Err(error) => tracing::warn!(%key, %error, "skipping cache write"),
        }
    }

    /// Returns the cached value for `key`, or computes and stores it.
    ///
    /// Failed computations are never cached.
    pub async fn memoize<T, E, F, Fut>(&self, key: CacheKey, mode: CacheMode, compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        if mode == CacheMode::Use {
            if let Some(hit) = self.get_json::<T>(&key).await {
                tracing::debug!(%key, "cache hit");
                return Ok(hit);
            }
        }

        let value = compute().await?;
        if mode != CacheMode::Bypass {
            self.put_json(key, &value).await;
        }
        Ok(value)
    }

    pub async fn clear_expired(&self) {
        let mut store = self.inner.write().await;
        store.clear_expired();
    }

    pub async fn clear(&self) {
        let mut store = self.inner.write().await;
        store.map.clear();
    }

    /// Number of entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.inner.read().await.map.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn is_disabled(&self) -> bool {
        self.inner.read().await.is_disabled()
    }
}
