use crate::redis_client::RedisClient;
use dashmap::{mapref::entry::Entry, DashMap};
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

pub mod login;
pub mod names;
pub mod oauth;

/// Key/value cache with per-entry TTL. Backed by Redis when configured so
/// that several instances share state, otherwise by an in-process map.
#[derive(Clone)]
pub struct CacheService {
    backend: Backend,
    shared: bool,
}

#[derive(Clone)]
enum Backend {
    Redis(RedisClient),
    Memory(Arc<DashMap<String, MemoryEntry>>),
}

#[derive(Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

impl MemoryEntry {
    fn is_live(&self) -> bool {
        self.expires_at > Instant::now()
    }
}

impl CacheService {
    pub fn redis(redis: RedisClient) -> Self {
        Self { backend: Backend::Redis(redis), shared: true }
    }

    pub fn in_memory() -> Self {
        Self { backend: Backend::Memory(Arc::new(DashMap::new())), shared: false }
    }

    /// In-process map that behaves like a cache shared between instances:
    /// clones stand in for separate gateways.
    #[cfg(test)]
    pub(crate) fn shared_in_memory() -> Self {
        Self { shared: true, ..Self::in_memory() }
    }

    /// Whether other instances see this cache's entries.
    pub fn is_shared(&self) -> bool {
        self.shared
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, redis::RedisError> {
        match &self.backend {
            Backend::Redis(redis) => {
                let mut conn = redis.conn.clone();
                conn.get(RedisClient::key(key)).await
            }
            Backend::Memory(map) => Ok(map
                .get(key)
                .filter(|entry| entry.is_live())
                .map(|entry| entry.value.clone())),
        }
    }

    pub async fn set_ex(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), redis::RedisError> {
        match &self.backend {
            Backend::Redis(redis) => {
                let mut conn = redis.conn.clone();
                conn.set_ex(RedisClient::key(key), value, ttl.as_secs().max(1)).await
            }
            Backend::Memory(map) => {
                map.insert(
                    key.to_string(),
                    MemoryEntry { value: value.to_string(), expires_at: Instant::now() + ttl },
                );
                Ok(())
            }
        }
    }

    /// Atomically sets `key` only when absent. Returns whether this caller won.
    pub async fn set_nx_ex(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, redis::RedisError> {
        match &self.backend {
            Backend::Redis(redis) => {
                let mut conn = redis.conn.clone();
                // SET NX EX returns nil when the key exists
                let result: Option<String> = redis::cmd("SET")
                    .arg(RedisClient::key(key))
                    .arg(value)
                    .arg("NX")
                    .arg("EX")
                    .arg(ttl.as_secs().max(1))
                    .query_async(&mut conn)
                    .await?;
                Ok(result.is_some())
            }
            Backend::Memory(map) => {
                let fresh = MemoryEntry {
                    value: value.to_string(),
                    expires_at: Instant::now() + ttl,
                };
                match map.entry(key.to_string()) {
                    Entry::Occupied(mut occupied) => {
                        if occupied.get().is_live() {
                            return Ok(false);
                        }
                        occupied.insert(fresh);
                        Ok(true)
                    }
                    Entry::Vacant(vacant) => {
                        vacant.insert(fresh);
                        Ok(true)
                    }
                }
            }
        }
    }

    pub async fn del(&self, key: &str) -> Result<(), redis::RedisError> {
        match &self.backend {
            Backend::Redis(redis) => {
                let mut conn = redis.conn.clone();
                conn.del(RedisClient::key(key)).await
            }
            Backend::Memory(map) => {
                map.remove(key);
                Ok(())
            }
        }
    }

    /// Drops expired in-process entries. Redis expires keys on its own.
    pub fn evict_expired(&self) -> usize {
        match &self.backend {
            Backend::Redis(_) => 0,
            Backend::Memory(map) => {
                let before = map.len();
                map.retain(|_, entry| entry.is_live());
                let evicted = before.saturating_sub(map.len());
                if evicted > 0 {
                    info!("Evicted {} expired cache entries", evicted);
                }
                evicted
            }
        }
    }
}
