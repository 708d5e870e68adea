//! 用例服务
//!
//! 会话与成员操作在 session_service / session_user_service,
//! 发送管线与消息操作在 message_service / message_operate_service。

pub mod message_service;
mod message_operate_service;
pub mod object_service;
pub mod session_service;
mod session_user_service;
pub mod user_service;

#[cfg(test)]
pub(crate) mod test_support;

use crate::ports::LockGuard;
use tracing::warn;

/// IM 业务参数快照, 从配置装配
#[derive(Debug, Clone)]
pub struct ImSettings {
    /// 服务名, 缓存键命名空间
    pub name: String,
    pub max_group_member: i64,
    pub max_super_group_member: i64,
}

/// 锁等待窗口
pub(crate) const LOCK_WAIT_MS: u64 = 1000;
/// 锁持有 TTL
pub(crate) const LOCK_TTL_MS: u64 = 3000;

/// 释放失败不影响业务结果, 锁会随 TTL 过期
pub(crate) async fn release_quietly(guard: Box<dyn LockGuard>) {
    if let Err(err) = guard.release().await {
        warn!(error = %err, "release lock failed, waiting for ttl expiry");
    }
}
