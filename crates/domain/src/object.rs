//! 媒体对象实体
//!
//! object 保存存储引擎和存储 key, 按 `id % shards` 分表;
//! session_object 把对象绑定到 (session_id, from_user_id, client_id),
//! 按 `session_id % shards` 分表, 转发时按冲突忽略语义克隆。

use serde::{Deserialize, Serialize};

/// 内置对象存储引擎标识
pub const ENGINE_MINIO: &str = "minio";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Object {
    pub id: i64,
    pub session_id: i64,
    pub engine: String,
    pub key: String,
    pub create_time: i64,
    pub update_time: i64,
    pub deleted: i8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionObject {
    pub id: i64,
    pub object_id: i64,
    pub session_id: i64,
    pub from_user_id: i64,
    pub client_id: i64,
    pub create_time: i64,
}
