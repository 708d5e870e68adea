//! 应用层
//!
//! 编排领域仓储与出站端口, 实现会话/成员/消息/对象/在线状态各用例。
//! 仅依赖抽象接口, 不触碰具体存储与总线实现。

pub mod dto;
pub mod events;
pub mod ports;
pub mod services;

pub use services::message_service::MessageService;
pub use services::object_service::ObjectService;
pub use services::session_service::SessionService;
pub use services::user_service::UserService;
