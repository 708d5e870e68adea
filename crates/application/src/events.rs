//! 事件约定
//!
//! 三类下游事件共享同一种形态: kafka 消息体为空, 载荷放在 header,
//! key 决定分区(同一会话的消息保序)。

/// 推送事件 header: 信令类型
pub const PUSH_HEADER_TYPE: &str = "type";
/// 推送事件 header: 消息体 JSON
pub const PUSH_HEADER_BODY: &str = "body";
/// 推送事件 header: 接收 uid 列表 JSON
pub const PUSH_HEADER_RECEIVERS: &str = "receivers";

/// 落库事件 header: 消息体 JSON
pub const SAVE_HEADER_BODY: &str = "msg_body";
/// 落库事件 header: 全量接收 uid 列表 JSON
pub const SAVE_HEADER_RECEIVERS: &str = "receivers";

/// 新消息信令
pub const SIGNAL_NEW_MESSAGE: i32 = 0;
/// 踢人下线信令
pub const SIGNAL_KICK_OFF_USER: i32 = 1;

/// 踢人信令的消息体
pub const KICK_OFF_BODY: &str = "kickOff";

/// 直推信令不关联会话, 固定分区 key
pub const PUSH_PARTITION_KEY: &str = "push";

/// 同一会话的事件落在同一分区
pub fn session_partition_key(session_id: i64) -> String {
    format!("session-{}", session_id)
}
