//! session_user 仓储接口
//!
//! 成员写路径同时维护 user_session 配对镜像, 两表写入在同一事务内。

use crate::errors::DomainResult;
use crate::session::Session;
use crate::session_user::{NewMember, SessionUser};
use crate::user_session::{MuteUpdate, UserSession};
use async_trait::async_trait;

#[async_trait]
pub trait SessionUserRepository: Send + Sync {
    /// 增量拉取成员, update_time >= m_time 升序
    async fn find_by_m_time(
        &self,
        session_id: i64,
        m_time: i64,
        role: Option<i32>,
        count: i64,
    ) -> DomainResult<Vec<SessionUser>>;

    /// 会话全部成员(含已删除, 镜像回填用)
    async fn find_all(&self, session_id: i64) -> DomainResult<Vec<SessionUser>>;

    /// 按 uid 列表查未删除成员
    async fn find_many(&self, session_id: i64, user_ids: &[i64]) -> DomainResult<Vec<SessionUser>>;

    /// 查单个未删除成员
    async fn find_one(&self, session_id: i64, user_id: i64) -> DomainResult<Option<SessionUser>>;

    /// 未删除成员数
    async fn count(&self, session_id: i64) -> DomainResult<i64>;

    /// 接收方过滤: status & status_mask == 0 且未删除;
    /// user_ids 非空时取交集
    async fn find_receivers(
        &self,
        session_id: i64,
        status_mask: i32,
        user_ids: &[i64],
    ) -> DomainResult<Vec<SessionUser>>;

    /// 批量加人: 校验容量(current + new <= max_count, 否则 MemberCount),
    /// 同一事务内 upsert session_user 与配对 user_session,
    /// 冲突时复位 deleted=0(单聊重开的恢复路径)
    async fn add_users(
        &self,
        session: &Session,
        members: &[NewMember],
        max_count: i64,
    ) -> DomainResult<Vec<UserSession>>;

    /// 批量减员: 软删除 session_user 与配对 user_session
    async fn del_users(&self, session_id: i64, user_ids: &[i64]) -> DomainResult<()>;

    /// 同步会话类型到成员行
    async fn update_type(&self, session_id: i64, session_type: i32) -> DomainResult<()>;

    /// 更新成员字段, 传 None 的字段不变
    async fn update_users(
        &self,
        session_id: i64,
        user_ids: &[i64],
        role: Option<i32>,
        status: Option<i32>,
        note_name: Option<&str>,
        note_avatar: Option<&str>,
        mute: Option<MuteUpdate>,
    ) -> DomainResult<()>;

    /// 级联软删除: 先成员镜像, 再成员行, 最后会话行, 单事务
    async fn delete_session_cascade(&self, session_id: i64) -> DomainResult<()>;
}
