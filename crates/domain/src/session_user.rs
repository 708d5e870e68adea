//! session_user 实体
//!
//! 会话成员表, 按 `session_id % shards` 分表。
//! 不变量: 每个 (session_id, user_id) 至多一条未删除记录。

use serde::{Deserialize, Serialize};

/// 普通成员, 可以查询session信息和会话历史消息
pub const ROLE_MEMBER: i32 = 1;
/// 管理员, 可以修改session基本信息, 禁言单个用户, 添加/删除普通成员
pub const ROLE_ADMIN: i32 = 2;
/// 超级管理员, 可以全员禁言, 添加/删除管理员
pub const ROLE_SUPER_ADMIN: i32 = 3;
/// 拥有者, 可以添加超级管理员, 删除管理员, 删除session
pub const ROLE_OWNER: i32 = 4;

/// 成员 mute 位: 全员禁言
pub const MUTE_ALL_BIT: i32 = 1 << 0;
/// 成员 mute 位: 单人禁言
pub const MUTE_USER_BIT: i32 = 1 << 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: i64,
    pub session_id: i64,
    pub user_id: i64,
    #[serde(rename = "type")]
    pub session_type: i32,
    pub role: i32,
    pub mute: i32,
    pub status: i32,
    pub note_name: String,
    pub note_avatar: String,
    pub create_time: i64,
    pub update_time: i64,
    pub deleted: i8,
}

/// 批量加人时的单个成员入参
#[derive(Debug, Clone)]
pub struct NewMember {
    pub user_id: i64,
    pub entity_id: i64,
    pub role: i32,
    pub note_name: String,
    pub note_avatar: String,
}

impl NewMember {
    pub fn new(user_id: i64, entity_id: i64, role: i32) -> Self {
        Self {
            user_id,
            entity_id,
            role,
            note_name: String::new(),
            note_avatar: String::new(),
        }
    }
}

/// 角色是否在合法区间内
pub fn role_in_range(role: i32) -> bool {
    (ROLE_MEMBER..=ROLE_OWNER).contains(&role)
}
