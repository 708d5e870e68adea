//! session_message 仓储接口(读扩散)

use crate::errors::DomainResult;
use crate::message::SessionMessage;
use async_trait::async_trait;

/// 待插入的读扩散消息
#[derive(Debug, Clone)]
pub struct NewSessionMessage {
    pub msg_id: i64,
    pub client_id: i64,
    pub session_id: i64,
    pub from_user_id: i64,
    pub msg_type: i32,
    pub msg_content: String,
    pub at_users: Option<String>,
    pub reply_msg_id: Option<i64>,
    pub ext_data: Option<String>,
    pub create_time: i64,
}

#[async_trait]
pub trait SessionMessageRepository: Send + Sync {
    async fn insert(&self, message: &NewSessionMessage) -> DomainResult<SessionMessage>;

    /// 幂等查找: (session_id, client_id, from_user_id)
    async fn find_by_client_id(
        &self,
        session_id: i64,
        client_id: i64,
        from_user_id: i64,
    ) -> DomainResult<Option<SessionMessage>>;

    async fn find(
        &self,
        session_id: i64,
        msg_id: i64,
        from_user_id: i64,
    ) -> DomainResult<Option<SessionMessage>>;

    /// 同 find, 但包含已软删除的行(撤回需要区分"不存在"与"已删")
    async fn find_any(
        &self,
        session_id: i64,
        msg_id: i64,
        from_user_id: i64,
    ) -> DomainResult<Option<SessionMessage>>;

    /// asc=false: create_time <= c_time 降序; asc=true: create_time >= c_time 升序
    async fn get_messages(
        &self,
        session_id: i64,
        c_time: i64,
        offset: i64,
        count: i64,
        msg_ids: &[i64],
        asc: bool,
    ) -> DomainResult<Vec<SessionMessage>>;

    /// 撤回路径: 软删除单条, 返回受影响行数
    async fn delete_one(
        &self,
        session_id: i64,
        msg_id: i64,
        from_user_id: i64,
    ) -> DomainResult<u64>;

    /// 按 id 列表或时间范围批量软删除
    async fn delete_many(
        &self,
        session_id: i64,
        msg_ids: &[i64],
        time_from: i64,
        time_to: i64,
    ) -> DomainResult<()>;
}
