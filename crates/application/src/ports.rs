//! 出站端口
//!
//! 应用层依赖的基础设施抽象: 分布式锁、在线状态缓存、事件总线、
//! 内容审核、用户服务、对象存储签名、雪花id。实现在 infrastructure。

use async_trait::async_trait;
use domain::errors::DomainResult;
use domain::presence::{Platform, UserOnlineStatus};
use std::collections::HashMap;
use std::collections::HashSet;

use crate::dto::{CheckMessageReq, OnlineStatusNotify};

/// 分布式锁管理器
///
/// 获取失败(等待窗口耗尽)返回 `ServerBusy`, 调用方直接透传给客户端。
#[async_trait]
pub trait LockManager: Send + Sync {
    async fn acquire(
        &self,
        key: &str,
        wait_ms: u64,
        ttl_ms: u64,
    ) -> DomainResult<Box<dyn LockGuard>>;
}

/// 已持有的锁, 消费自身释放
#[async_trait]
pub trait LockGuard: Send {
    /// 返回是否由本持有者释放(token 不匹配说明锁已过期被他人持有)
    async fn release(self: Box<Self>) -> DomainResult<bool>;
}

/// 在线状态缓存
#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// 写入/续期一条在线记录
    async fn set(&self, status: &UserOnlineStatus, ttl_secs: u64) -> DomainResult<()>;

    async fn get(
        &self,
        user_id: i64,
        platform: Platform,
    ) -> DomainResult<Option<UserOnlineStatus>>;

    /// 删除指定 (用户, 平台) 的在线记录
    async fn delete(&self, user_id: i64, platform: Platform) -> DomainResult<()>;

    /// 批量查询用户全平台在线记录
    async fn statuses(&self, user_ids: &[i64]) -> DomainResult<Vec<UserOnlineStatus>>;

    /// 任一平台在线的用户集合; 缓存查询失败时按全员离线处理
    async fn online_uids(&self, user_ids: &[i64]) -> DomainResult<HashSet<i64>>;
}

/// 事件发布端口, 每个 topic 一个实例
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// 以 key 分区发布一条头部携带载荷的事件
    async fn publish(&self, key: &str, headers: Vec<(String, String)>) -> DomainResult<()>;
}

/// 内容审核服务
#[async_trait]
pub trait MessageChecker: Send + Sync {
    /// 放行返回 Ok, 拒绝返回 `Moderation`(错误码原样透传)
    async fn check(&self, req: &CheckMessageReq) -> DomainResult<()>;
}

/// 用户服务出站接口
#[async_trait]
pub trait UserApi: Send + Sync {
    /// token 换 uid, 无效 token 返回 `Unauthorized`
    async fn user_id_by_token(&self, token: &str) -> DomainResult<i64>;

    /// 上下线通知
    async fn post_online_status(&self, notify: &OnlineStatusNotify) -> DomainResult<()>;
}

/// 对象存储签名服务
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// 返回 (上传地址, http 方法, 表单参数)
    async fn upload_params(
        &self,
        key: &str,
    ) -> DomainResult<(String, String, HashMap<String, String>)>;

    async fn download_url(&self, key: &str) -> DomainResult<String>;
}

/// 消息 id 生成器
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> i64;
}

/// 缓存键布局, `name` 为服务名命名空间
pub mod keys {
    /// 防并发建会话: 同一 (创建者, 对端实体) 串行
    pub fn session_create(name: &str, user_id: i64, entity_id: i64) -> String {
        format!("{}:se:c:{}:{}", name, user_id, entity_id)
    }

    /// 会话级变更锁
    pub fn session_update(name: &str, session_id: i64) -> String {
        format!("{}:se:m:{}", name, session_id)
    }

    /// 用户会话级变更锁
    pub fn user_session_update(name: &str, user_id: i64, session_id: i64) -> String {
        format!("{}:u:se:m:{}:{}", name, user_id, session_id)
    }

    /// 在线记录键
    pub fn user_online(name: &str, platform: &str, user_id: i64) -> String {
        format!("{}:olu:{}:{}", name, platform, user_id)
    }
}
