//! 仓储接口定义
//!
//! 每张逻辑表一个接口, 由 infrastructure 以分表 SQL 实现。
//! 跨分片的多行写入由实现方按分片分组并在单个事务内提交。

pub mod object_repository;
pub mod session_message_repository;
pub mod session_repository;
pub mod session_user_repository;
pub mod user_message_repository;
pub mod user_session_repository;

pub use object_repository::{ObjectRepository, SessionObjectRepository};
pub use session_message_repository::SessionMessageRepository;
pub use session_repository::SessionRepository;
pub use session_user_repository::SessionUserRepository;
pub use user_message_repository::UserMessageRepository;
pub use user_session_repository::{UserSessionRepository, UserSessionUpdate};
