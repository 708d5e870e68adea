//! 在线状态
//!
//! 缓存键 `{name}:olu:{platform}:{uid}`, 值为 JSON, 心跳续期 TTL。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 客户端平台, 每个 (用户, 平台) 一条在线记录
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    Android,
    #[serde(rename = "IOS")]
    Ios,
    Web,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Android, Platform::Ios, Platform::Web];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Android => "Android",
            Platform::Ios => "IOS",
            Platform::Web => "Web",
        }
    }

    pub fn parse(s: &str) -> Option<Platform> {
        match s {
            "Android" => Some(Platform::Android),
            "IOS" => Some(Platform::Ios),
            "Web" => Some(Platform::Web),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 在线记录缓存值
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserOnlineStatus {
    #[serde(rename = "u_id")]
    pub user_id: i64,
    pub platform: Platform,
    pub conn_id: i64,
    pub node_id: i64,
    pub timestamp_ms: i64,
}
