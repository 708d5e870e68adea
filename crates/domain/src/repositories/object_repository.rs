//! 媒体对象仓储接口

use crate::errors::DomainResult;
use crate::object::Object;
use async_trait::async_trait;

#[async_trait]
pub trait ObjectRepository: Send + Sync {
    /// 登记对象, 返回分配的 object_id
    async fn insert(&self, session_id: i64, engine: &str, key: &str) -> DomainResult<i64>;

    /// 服务端直查(ip 鉴权模式, uid=0)
    async fn find(&self, object_id: i64) -> DomainResult<Option<Object>>;

    /// 用户侧查找: 对象必须挂在调用者所属的某个会话下
    /// (原始会话或转发克隆出的绑定)
    async fn find_for_user(&self, object_id: i64, user_id: i64) -> DomainResult<Option<Object>>;
}

#[async_trait]
pub trait SessionObjectRepository: Send + Sync {
    /// 冲突忽略插入绑定记录
    async fn insert(
        &self,
        object_id: i64,
        session_id: i64,
        from_user_id: i64,
        client_id: i64,
    ) -> DomainResult<()>;

    /// 转发克隆: 把源会话 (from_uids x client_ids) 命中的绑定复制到
    /// 目标会话(保留 object_id, 重绑 session/from/client), 冲突忽略;
    /// 返回涉及的 object_id 列表
    async fn clone_for_forward(
        &self,
        src_session_id: i64,
        from_user_ids: &[i64],
        client_ids: &[i64],
        new_from_user_id: i64,
        new_client_id: i64,
        new_session_id: i64,
    ) -> DomainResult<Vec<i64>>;
}
