//! 仓储的 MySQL 分表实现

pub mod object_repository_impl;
pub mod session_message_repository_impl;
pub mod session_repository_impl;
pub mod session_user_repository_impl;
pub mod user_message_repository_impl;
pub mod user_session_repository_impl;

pub use object_repository_impl::{MysqlObjectRepository, MysqlSessionObjectRepository};
pub use session_message_repository_impl::MysqlSessionMessageRepository;
pub use session_repository_impl::MysqlSessionRepository;
pub use session_user_repository_impl::MysqlSessionUserRepository;
pub use user_message_repository_impl::MysqlUserMessageRepository;
pub use user_session_repository_impl::MysqlUserSessionRepository;
