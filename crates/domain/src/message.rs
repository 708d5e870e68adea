//! 消息实体
//!
//! session_message 为超级群读扩散权威记录, 按 `session_id % shards` 分表;
//! user_message 为单聊/群聊写扩散记录, 每个接收人一条, 按 `user_id % shards` 分表。

use serde::{Deserialize, Serialize};

/// 撤回消息(用户可见的删除标记)
pub const MSG_TYPE_REVOKE: i32 = 100;
/// 已接收控制消息
pub const MSG_TYPE_RECEIVED: i32 = -1;
/// 已读控制消息
pub const MSG_TYPE_READ: i32 = -2;
/// 重编辑控制消息
pub const MSG_TYPE_REEDIT: i32 = -3;

/// 负类型为服务端合成的控制消息, 正类型为用户内容
pub fn is_control_type(msg_type: i32) -> bool {
    msg_type < 0
}

/// user_message 状态位
pub mod msg_status {
    pub const INIT: i32 = 0;
    pub const ACKED: i32 = 1;
    /// 客户端已读
    pub const CLIENT_READ: i32 = 2;
    /// 服务端已读
    pub const SERVER_READ: i32 = 4;
    pub const READ: i32 = CLIENT_READ | SERVER_READ;
    pub const REEDIT: i32 = 8;
}

/// 读扩散消息, 幂等键 (session_id, client_id, from_user_id)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMessage {
    pub id: i64,
    pub msg_id: i64,
    pub client_id: i64,
    pub session_id: i64,
    pub from_user_id: i64,
    pub msg_type: i32,
    pub msg_content: String,
    pub at_users: Option<String>,
    pub reply_msg_id: Option<i64>,
    pub ext_data: Option<String>,
    pub create_time: i64,
    pub update_time: i64,
    pub deleted: i8,
}

/// 写扩散消息, 幂等键 (user_id, session_id, from_user_id, client_id)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMessage {
    pub id: i64,
    pub msg_id: i64,
    pub client_id: i64,
    pub user_id: i64,
    pub session_id: i64,
    pub from_user_id: i64,
    pub msg_type: i32,
    pub msg_content: String,
    pub reply_msg_id: Option<i64>,
    pub at_users: Option<String>,
    pub ext_data: Option<String>,
    pub status: i32,
    pub create_time: i64,
    pub update_time: i64,
    pub deleted: i8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_type_convention() {
        assert!(is_control_type(MSG_TYPE_READ));
        assert!(is_control_type(MSG_TYPE_REEDIT));
        assert!(is_control_type(MSG_TYPE_RECEIVED));
        // 撤回是用户可见的删除标记, 不是控制消息
        assert!(!is_control_type(MSG_TYPE_REVOKE));
        assert!(!is_control_type(1));
    }

    #[test]
    fn test_msg_status_bits_disjoint() {
        assert_eq!(msg_status::ACKED & msg_status::CLIENT_READ, 0);
        assert_eq!(msg_status::CLIENT_READ & msg_status::SERVER_READ, 0);
        assert_eq!(msg_status::READ, 6);
    }
}
