use std::collections::HashMap;
use std::time::{Duration, Instant};

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::Mutex;

use tandem_shared::clients::timeout::with_timeout;
use tandem_shared::errors::{AppError, AppResult};

/// Key/value store with per-entry expiry.
#[axum::async_trait]
pub trait Cache: Send + Sync {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()>;
    /// Writes only when the key is absent. Returns whether this call wrote it.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> AppResult<bool>;
    async fn get(&self, key: &str) -> AppResult<Option<String>>;
    async fn delete(&self, key: &str) -> AppResult<()>;

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

/// Redis-backed cache. Every command is bounded by `timeout`.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    timeout: Duration,
}

impl RedisCache {
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        tracing::info!("connected to Redis");
        Ok(Self { conn, timeout })
    }
}

fn redis_error(e: redis::RedisError) -> AppError {
    AppError::unavailable(format!("cache error: {e}"))
}

/// SETEX takes whole seconds; round up so short TTLs still land.
fn whole_seconds(ttl: Duration) -> u64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    secs.max(1)
}

#[axum::async_trait]
impl Cache for RedisCache {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        let mut conn = self.conn.clone();
        with_timeout("cache set", self.timeout, async move {
            conn.set_ex::<_, _, ()>(key, value, whole_seconds(ttl)).await.map_err(redis_error)
        })
        .await
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        with_timeout("cache set_if_absent", self.timeout, async move {
            redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("NX")
                .arg("EX")
                .arg(whole_seconds(ttl))
                .query_async::<_, Option<String>>(&mut conn)
                .await
                .map(|reply| reply.is_some())
                .map_err(redis_error)
        })
        .await
    }

    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.conn.clone();
        with_timeout("cache get", self.timeout, async move {
            conn.get::<_, Option<String>>(key).await.map_err(redis_error)
        })
        .await
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let mut conn = self.conn.clone();
        with_timeout("cache delete", self.timeout, async move {
            conn.del::<_, ()>(key).await.map_err(redis_error)
        })
        .await
    }

    async fn ping(&self) -> AppResult<()> {
        let mut conn = self.conn.clone();
        with_timeout("cache ping", self.timeout, async move {
            redis::cmd("PING")
                .query_async::<_, String>(&mut conn)
                .await
                .map(|_| ())
                .map_err(redis_error)
        })
        .await
    }
}

/// Process-local cache for tests and single-node development.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[axum::async_trait]
impl Cache for MemoryCache {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        let expires_at = Instant::now() + ttl;
        let mut entries = self.entries.lock().await;
        entries.retain(|_, (_, at)| *at > Instant::now());
        entries.insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> AppResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        if matches!(entries.get(key), Some((_, at)) if *at > now) {
            return Ok(false);
        }
        entries.insert(key.to_string(), (value.to_string(), now + ttl));
        Ok(true)
    }

    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some((value, at)) if *at > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redis_ttl_rounds_up_to_whole_seconds() {
        assert_eq!(whole_seconds(Duration::from_millis(1)), 1);
        assert_eq!(whole_seconds(Duration::from_millis(1500)), 2);
        assert_eq!(whole_seconds(Duration::from_secs(3)), 3);
        assert_eq!(whole_seconds(Duration::ZERO), 1);
    }

    #[tokio::test]
    async fn memory_cache_expires_entries() {
        let cache = MemoryCache::new();
        cache.set("k", "v", Duration::from_millis(50)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_cache_delete_and_overwrite() {
        let cache = MemoryCache::new();
        cache.set("k", "1", Duration::from_secs(60)).await.unwrap();
        cache.set("k", "2", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("2"));

        cache.delete("k").await.unwrap();
        cache.delete("missing").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_if_absent_writes_once_until_expiry() {
        let cache = MemoryCache::new();
        assert!(cache.set_if_absent("k", "first", Duration::from_millis(50)).await.unwrap());
        assert!(!cache.set_if_absent("k", "second", Duration::from_secs(60)).await.unwrap());
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("first"));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(cache.set_if_absent("k", "third", Duration::from_secs(60)).await.unwrap());
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("third"));
    }
}
