//! 领域层
//!
//! IM 控制面的核心实体、位标志常量、统一错误和仓储接口。
//! 所有 id 均为 64 位雪花id，时间戳为毫秒。

pub mod errors;
pub mod message;
pub mod object;
pub mod presence;
pub mod repositories;
pub mod session;
pub mod session_user;
pub mod user_session;

pub use errors::{DomainError, DomainResult};
pub use message::{SessionMessage, UserMessage};
pub use object::{Object, SessionObject};
pub use presence::{Platform, UserOnlineStatus};
pub use session::Session;
pub use session_user::{NewMember, SessionUser};
pub use user_session::{MuteUpdate, UserSession};

/// 当前毫秒时间戳
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
