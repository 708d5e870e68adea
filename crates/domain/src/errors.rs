//! 领域错误定义
//!
//! 错误码随响应体下发给客户端，内部各层统一返回本类型，
//! HTTP 状态码的翻译只发生在 web-api 边界。

use thiserror::Error;

/// 领域错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// 分布式锁在等待窗口内未获取到
    #[error("server busy")]
    ServerBusy,

    /// 请求参数错误
    #[error("params error")]
    ParamsError,

    /// 请求不合法
    #[error("bad request")]
    BadRequest,

    /// 未认证
    #[error("unauthorized")]
    Unauthorized,

    /// 无权限
    #[error("forbidden")]
    Forbidden,

    /// session 不存在或已删除
    #[error("invalid session")]
    SessionInvalid,

    /// 群已删除, 不可恢复
    #[error("group has been deleted")]
    SessionAlreadyDeleted,

    /// session 类型错误
    #[error("session type error")]
    SessionType,

    /// session 消息不存在
    #[error("invalid session message")]
    SessionMessageInvalid,

    /// 消息类型不支持该操作
    #[error("message type not support")]
    MessageTypeNotSupport,

    /// 全员禁言
    #[error("session muted")]
    SessionMuted,

    /// 用户被禁言
    #[error("user muted")]
    UserMuted,

    /// 接收方拒收
    #[error("user reject your message")]
    UserReject,

    /// 成员数超出上限
    #[error("member count error")]
    MemberCount,

    /// 消息已落库但总线投递失败
    #[error("message delivery failed")]
    MessageDeliveryFailed,

    /// 内容审核服务拒绝, 原样透传其错误码
    #[error("message check failed: {message}")]
    Moderation { code: i32, message: String },

    /// 存储层错误
    #[error("database error: {0}")]
    Database(String),

    /// 缓存层错误
    #[error("cache error: {0}")]
    Cache(String),

    /// 消息总线错误
    #[error("bus error: {0}")]
    Bus(String),

    /// 出站调用错误
    #[error("remote error: {0}")]
    Remote(String),

    /// 未分类内部错误
    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    /// 下发给客户端的整数错误码
    pub fn code(&self) -> i32 {
        match self {
            DomainError::ServerBusy => 5030000,
            DomainError::ParamsError => 4000001,
            DomainError::BadRequest => 4000000,
            DomainError::Unauthorized => 4010000,
            DomainError::Forbidden => 4030000,
            DomainError::SessionInvalid => 4004001,
            DomainError::SessionAlreadyDeleted => 4004002,
            DomainError::SessionType => 4004003,
            DomainError::SessionMessageInvalid => 4004004,
            DomainError::MessageTypeNotSupport => 4004005,
            DomainError::SessionMuted => 4004101,
            DomainError::UserMuted => 4004102,
            DomainError::UserReject => 4004103,
            DomainError::MemberCount => 4000002,
            DomainError::MessageDeliveryFailed => 5004001,
            DomainError::Moderation { code, .. } => *code,
            DomainError::Database(_)
            | DomainError::Cache(_)
            | DomainError::Bus(_)
            | DomainError::Remote(_)
            | DomainError::Internal(_) => 5000000,
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache(message.into())
    }

    pub fn bus(message: impl Into<String>) -> Self {
        Self::Bus(message.into())
    }

    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

/// 领域结果类型
pub type DomainResult<T> = Result<T, DomainError>;
