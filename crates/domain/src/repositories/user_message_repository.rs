//! user_message 仓储接口(写扩散)

use crate::errors::DomainResult;
use crate::message::UserMessage;
use async_trait::async_trait;

#[async_trait]
pub trait UserMessageRepository: Send + Sync {
    /// 冲突忽略插入(幂等键为唯一索引)
    async fn insert(&self, message: &UserMessage) -> DomainResult<()>;

    /// 幂等查找: (user_id, session_id, from_user_id=user_id, client_id)
    async fn find_by_client_id(
        &self,
        user_id: i64,
        session_id: i64,
        client_id: i64,
    ) -> DomainResult<Option<UserMessage>>;

    async fn find(
        &self,
        user_id: i64,
        session_id: i64,
        msg_id: i64,
    ) -> DomainResult<Option<UserMessage>>;

    /// 同 find, 但包含已软删除的行(撤回需要区分"不存在"与"已删")
    async fn find_any(
        &self,
        user_id: i64,
        session_id: i64,
        msg_id: i64,
    ) -> DomainResult<Option<UserMessage>>;

    async fn find_many(
        &self,
        user_id: i64,
        session_id: i64,
        msg_ids: &[i64],
    ) -> DomainResult<Vec<UserMessage>>;

    /// status |= ACKED
    async fn ack(&self, user_id: i64, session_id: i64, msg_ids: &[i64]) -> DomainResult<()>;

    /// status |= status_bits
    async fn mark_status(
        &self,
        user_id: i64,
        session_id: i64,
        msg_ids: &[i64],
        status_bits: i32,
    ) -> DomainResult<()>;

    /// create_time > c_time 的消息与 status=0 的未确认消息取并集,
    /// 按 create_time 升序分页
    async fn get_user_messages(
        &self,
        user_id: i64,
        c_time: i64,
        offset: i64,
        count: i64,
    ) -> DomainResult<Vec<UserMessage>>;

    /// 按 id 列表或时间范围软删除; 两者都缺省则为空操作
    async fn delete_messages(
        &self,
        user_id: i64,
        session_id: i64,
        msg_ids: &[i64],
        time_from: Option<i64>,
        time_to: Option<i64>,
    ) -> DomainResult<()>;

    /// 离会清理: 软删除该用户在会话内的全部消息
    async fn delete_by_session(&self, user_id: i64, session_id: i64) -> DomainResult<()>;
}
