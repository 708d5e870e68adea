//! Redis 接入: 分布式锁与在线状态缓存

pub mod lock;
pub mod presence;

pub use lock::RedisLockManager;
pub use presence::RedisPresenceStore;

use config::RedisConfig;
use domain::errors::{DomainError, DomainResult};
use redis::aio::ConnectionManager;

/// 建立自动重连的共享连接
pub async fn create_connection(config: &RedisConfig) -> DomainResult<ConnectionManager> {
    let client = redis::Client::open(config.url.as_str())
        .map_err(|e| DomainError::cache(format!("open redis client: {}", e)))?;
    ConnectionManager::new(client)
        .await
        .map_err(|e| DomainError::cache(format!("connect redis: {}", e)))
}

pub(crate) fn cache_err(e: redis::RedisError) -> DomainError {
    DomainError::cache(e.to_string())
}
