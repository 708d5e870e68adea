//! session 实体
//!
//! 会话按 `id % shards` 分表, 软删除, 不做物理删除。

use serde::{Deserialize, Serialize};

/// 单聊
pub const SESSION_TYPE_SINGLE: i32 = 1;
/// 群聊(写扩散)
pub const SESSION_TYPE_GROUP: i32 = 2;
/// 超级群(读扩散)
pub const SESSION_TYPE_SUPER_GROUP: i32 = 3;

/// session 功能位, 控制可接受的消息类型和行为
pub mod function_flag {
    pub const TEXT: i64 = 1 << 0;
    pub const AUDIO: i64 = 1 << 1;
    pub const EMOJI: i64 = 1 << 2;
    pub const IMAGE: i64 = 1 << 3;
    pub const VIDEO: i64 = 1 << 4;
    pub const FORWARD: i64 = 1 << 5;
    /// 已读回执开关
    pub const READ: i64 = 1 << 6;
}

/// session 全员禁言位(mute 字段 bit0)
pub const SESSION_MUTE_ALL: i32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub name: String,
    pub remark: String,
    pub function_flag: i64,
    #[serde(rename = "type")]
    pub session_type: i32,
    pub mute: i32,
    pub ext_data: Option<String>,
    pub create_time: i64,
    pub update_time: i64,
    pub deleted: i8,
}

impl Session {
    pub fn is_deleted(&self) -> bool {
        self.deleted == 1
    }

    /// 读扩散模型仅用于超级群
    pub fn is_read_diffusion(&self) -> bool {
        self.session_type == SESSION_TYPE_SUPER_GROUP
    }
}
