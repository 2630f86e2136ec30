use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use tracing::{debug, warn};

use crate::error::{AppError, Result};

/// Byte-level get/set-with-TTL cache used by the weight resolver.
///
/// Kept as a trait so tests can inject in-memory or failing doubles.
#[async_trait]
pub trait WeightsCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: &[u8], ttl_secs: u64) -> Result<()>;
}

/// Redis-backed weights cache
#[derive(Clone)]
pub struct RedisWeightsCache {
    redis: ConnectionManager,
}

impl RedisWeightsCache {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl WeightsCache for RedisWeightsCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.redis.clone();
        match conn.get::<_, Option<Vec<u8>>>(key).await {
            Ok(Some(data)) => {
                debug!("weights cache HIT for {}", key);
                Ok(Some(data))
            }
            Ok(None) => {
                debug!("weights cache MISS for {}", key);
                Ok(None)
            }
            Err(e) => {
                warn!("Redis GET failed for {}: {}", key, e);
                Err(AppError::Cache(e))
            }
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl_secs: u64) -> Result<()> {
        let mut conn = self.redis.clone();
        redis::cmd("SETEX")
            .arg(key)
            .arg(ttl_secs)
            .arg(value)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| {
                warn!("Redis SETEX failed for {}: {}", key, e);
                AppError::Cache(e)
            })?;
        Ok(())
    }
}
