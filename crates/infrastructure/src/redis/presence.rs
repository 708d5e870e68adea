//! Redis 在线状态缓存
//!
//! 每个 (用户, 平台) 一个键, 值为 JSON, 心跳 SET EX 续期。
//! 批量查询用 MGET 一次拉全平台键。

use std::collections::HashSet;

use application::ports::{keys, PresenceStore};
use async_trait::async_trait;
use domain::errors::{DomainError, DomainResult};
use domain::presence::{Platform, UserOnlineStatus};
use redis::aio::ConnectionManager;

pub struct RedisPresenceStore {
    conn: ConnectionManager,
    /// 服务名, 缓存键命名空间
    name: String,
}

impl RedisPresenceStore {
    pub fn new(conn: ConnectionManager, name: String) -> Self {
        Self { conn, name }
    }

    fn key(&self, platform: Platform, user_id: i64) -> String {
        keys::user_online(&self.name, platform.as_str(), user_id)
    }

    /// uid x 平台的全组合键, 与 MGET 结果一一对应
    fn all_keys(&self, user_ids: &[i64]) -> Vec<(i64, String)> {
        let mut result = Vec::with_capacity(user_ids.len() * Platform::ALL.len());
        for uid in user_ids {
            for platform in Platform::ALL {
                result.push((*uid, self.key(platform, *uid)));
            }
        }
        result
    }

    async fn fetch_all(&self, user_ids: &[i64]) -> DomainResult<Vec<(i64, UserOnlineStatus)>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let pairs = self.all_keys(user_ids);
        let mut cmd = redis::cmd("MGET");
        for (_, key) in &pairs {
            cmd.arg(key);
        }
        let mut conn = self.conn.clone();
        let values: Vec<Option<String>> = cmd
            .query_async(&mut conn)
            .await
            .map_err(super::cache_err)?;
        let mut result = Vec::new();
        for ((uid, _), value) in pairs.iter().zip(values) {
            let Some(raw) = value else { continue };
            let status: UserOnlineStatus = serde_json::from_str(&raw)
                .map_err(|e| DomainError::cache(format!("decode online status: {}", e)))?;
            result.push((*uid, status));
        }
        Ok(result)
    }
}

#[async_trait]
impl PresenceStore for RedisPresenceStore {
    async fn set(&self, status: &UserOnlineStatus, ttl_secs: u64) -> DomainResult<()> {
        let key = self.key(status.platform, status.user_id);
        let value = serde_json::to_string(status)
            .map_err(|e| DomainError::cache(format!("encode online status: {}", e)))?;
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(&key)
            .arg(&value)
            .arg("EX")
            .arg(ttl_secs)
            .query_async::<()>(&mut conn)
            .await
            .map_err(super::cache_err)
    }

    async fn get(
        &self,
        user_id: i64,
        platform: Platform,
    ) -> DomainResult<Option<UserOnlineStatus>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(self.key(platform, user_id))
            .query_async(&mut conn)
            .await
            .map_err(super::cache_err)?;
        match raw {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| DomainError::cache(format!("decode online status: {}", e))),
            None => Ok(None),
        }
    }

    async fn delete(&self, user_id: i64, platform: Platform) -> DomainResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(self.key(platform, user_id))
            .query_async::<()>(&mut conn)
            .await
            .map_err(super::cache_err)
    }

    async fn statuses(&self, user_ids: &[i64]) -> DomainResult<Vec<UserOnlineStatus>> {
        Ok(self
            .fetch_all(user_ids)
            .await?
            .into_iter()
            .map(|(_, status)| status)
            .collect())
    }

    async fn online_uids(&self, user_ids: &[i64]) -> DomainResult<HashSet<i64>> {
        Ok(self
            .fetch_all(user_ids)
            .await?
            .into_iter()
            .map(|(uid, _)| uid)
            .collect())
    }
}
