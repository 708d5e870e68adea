//! Redis 分布式锁
//!
//! SET NX PX 抢锁, 等待窗口内指数退避重试; 释放用 Lua 脚本
//! 先比对 token 再 DEL, 锁过期后被他人持有时不会误删。

use application::ports::{LockGuard, LockManager};
use async_trait::async_trait;
use domain::errors::{DomainError, DomainResult};
use redis::aio::ConnectionManager;
use redis::Script;
use tokio::time::{sleep, Duration, Instant};

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

pub struct RedisLockManager {
    conn: ConnectionManager,
}

impl RedisLockManager {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl LockManager for RedisLockManager {
    async fn acquire(
        &self,
        key: &str,
        wait_ms: u64,
        ttl_ms: u64,
    ) -> DomainResult<Box<dyn LockGuard>> {
        // 进程号+随机数, 跨节点同毫秒也不会撞 token
        let token = format!("{}-{:016x}", std::process::id(), rand::random::<u64>());
        let deadline = Instant::now() + Duration::from_millis(wait_ms);
        let mut backoff = Duration::from_millis(10);
        let mut conn = self.conn.clone();
        loop {
            let acquired: Option<String> = redis::cmd("SET")
                .arg(key)
                .arg(&token)
                .arg("NX")
                .arg("PX")
                .arg(ttl_ms)
                .query_async(&mut conn)
                .await
                .map_err(super::cache_err)?;
            if acquired.is_some() {
                return Ok(Box::new(RedisLockGuard {
                    conn: self.conn.clone(),
                    key: key.to_string(),
                    token,
                }));
            }
            if Instant::now() + backoff > deadline {
                return Err(DomainError::ServerBusy);
            }
            sleep(backoff).await;
            backoff = (backoff * 2).min(Duration::from_millis(200));
        }
    }
}

struct RedisLockGuard {
    conn: ConnectionManager,
    key: String,
    token: String,
}

#[async_trait]
impl LockGuard for RedisLockGuard {
    async fn release(self: Box<Self>) -> DomainResult<bool> {
        let mut conn = self.conn.clone();
        let deleted: i64 = Script::new(RELEASE_SCRIPT)
            .key(&self.key)
            .arg(&self.token)
            .invoke_async(&mut conn)
            .await
            .map_err(super::cache_err)?;
        Ok(deleted > 0)
    }
}
