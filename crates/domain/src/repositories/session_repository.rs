//! session 仓储接口

use crate::errors::DomainResult;
use crate::session::Session;
use async_trait::async_trait;

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// 创建空会话, id 由雪花生成器分配
    async fn create_empty(
        &self,
        session_type: i32,
        name: &str,
        remark: &str,
        function_flag: i64,
        ext_data: Option<&str>,
    ) -> DomainResult<Session>;

    /// 查找未删除的会话
    async fn find(&self, session_id: i64) -> DomainResult<Option<Session>>;

    /// 更新会话基础字段, 传 None 的字段不变
    async fn update(
        &self,
        session_id: i64,
        name: Option<&str>,
        remark: Option<&str>,
        mute: Option<i32>,
        function_flag: Option<i64>,
        ext_data: Option<&str>,
    ) -> DomainResult<()>;

    /// 修改会话类型(镜像行由调用方负责)
    async fn update_type(&self, session_id: i64, session_type: i32) -> DomainResult<()>;
}
