//! user_session 实体
//!
//! 会话的用户侧镜像, 按 `user_id % shards` 分表, 支撑用户增量拉取。
//! 不变量: 每条 session_user 在对应用户分片上有一条配对记录,
//! 两者总在同一事务内写入。

use serde::{Deserialize, Serialize};

/// status 位: 拒收消息
pub const STATUS_REJECT_BIT: i32 = 1 << 0;
/// status 位: 静音(不做离线推送)
pub const STATUS_SILENCE_BIT: i32 = 1 << 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSession {
    pub id: i64,
    pub session_id: i64,
    pub user_id: i64,
    pub parent_id: i64,
    #[serde(rename = "type")]
    pub session_type: i32,
    pub entity_id: i64,
    pub name: String,
    pub remark: String,
    pub function_flag: i64,
    pub ext_data: Option<String>,
    pub top: i64,
    pub role: i32,
    pub mute: i32,
    pub status: i32,
    pub note_name: String,
    pub note_avatar: String,
    pub create_time: i64,
    pub update_time: i64,
    pub deleted: i8,
}

impl UserSession {
    pub fn is_deleted(&self) -> bool {
        self.deleted == 1
    }
}

/// mute 位更新
///
/// 以 (掩码, 置位/清位) 的形式传递到仓储层, 由仓储层渲染
/// `mute | b` / `mute & ~b`, SQL 片段不跨层传递。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MuteUpdate {
    Set(i32),
    Clear(i32),
}

impl MuteUpdate {
    /// 作用到一个现有位集上(仓储层 SQL 的语义等价物, 也用于测试)
    pub fn apply(self, mute: i32) -> i32 {
        match self {
            MuteUpdate::Set(bit) => mute | bit,
            MuteUpdate::Clear(bit) => mute & !bit,
        }
    }
}
