//! user_session 仓储接口

use crate::errors::DomainResult;
use crate::user_session::{MuteUpdate, UserSession};
use async_trait::async_trait;

/// user_session 批量更新字段集, None 表示不变
#[derive(Debug, Clone, Default)]
pub struct UserSessionUpdate {
    pub name: Option<String>,
    pub remark: Option<String>,
    pub mute: Option<MuteUpdate>,
    pub function_flag: Option<i64>,
    pub ext_data: Option<String>,
    pub note_name: Option<String>,
    pub top: Option<i64>,
    pub status: Option<i32>,
    pub role: Option<i32>,
    pub parent_id: Option<i64>,
}

impl UserSessionUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.remark.is_none()
            && self.mute.is_none()
            && self.function_flag.is_none()
            && self.ext_data.is_none()
            && self.note_name.is_none()
            && self.top.is_none()
            && self.status.is_none()
            && self.role.is_none()
            && self.parent_id.is_none()
    }
}

#[async_trait]
pub trait UserSessionRepository: Send + Sync {
    /// 按 (uid, entity_id, type) 查用户会话; include_deleted 用于创建路径
    async fn find_by_entity_id(
        &self,
        user_id: i64,
        entity_id: i64,
        session_type: i32,
        include_deleted: bool,
    ) -> DomainResult<Option<UserSession>>;

    /// 查用户会话(含已删除)
    async fn get(&self, user_id: i64, session_id: i64) -> DomainResult<Option<UserSession>>;

    /// 用户增量拉取: update_time > m_time 升序分页, types 可选过滤
    async fn query_latest(
        &self,
        user_id: i64,
        m_time: i64,
        offset: i64,
        count: i64,
        types: &[i32],
    ) -> DomainResult<Vec<UserSession>>;

    /// 按分片分组后批量更新镜像行, 单事务
    async fn update(
        &self,
        user_ids: &[i64],
        session_id: i64,
        update: &UserSessionUpdate,
    ) -> DomainResult<()>;

    /// 按分片分组同步会话类型, 单事务
    async fn update_type(
        &self,
        user_ids: &[i64],
        session_id: i64,
        session_type: i32,
    ) -> DomainResult<()>;

    /// 仅推进 update_time(超级群已读语义)
    async fn touch(&self, user_id: i64, session_id: i64, now_ms: i64) -> DomainResult<()>;
}
