//! 接口数据传输对象
//!
//! JSON 字段名是对客户端 SDK 的兼容承诺, 修改前先确认协议版本。

use domain::message::{SessionMessage, UserMessage};
use domain::presence::{Platform, UserOnlineStatus};
use domain::session_user::SessionUser;
use domain::user_session::UserSession;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---------------- 会话 ----------------

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSessionReq {
    #[serde(rename = "u_id")]
    pub user_id: i64,
    #[serde(rename = "type")]
    pub session_type: i32,
    /// 单聊时为对端 uid, 群聊时为业务实体 id
    #[serde(default)]
    pub entity_id: i64,
    /// 群聊初始成员, 单聊必须为空
    #[serde(default)]
    pub members: Vec<i64>,
    #[serde(default)]
    pub member_names: Vec<String>,
    #[serde(default)]
    pub member_avatars: Vec<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub remark: String,
    #[serde(default)]
    pub function_flag: i64,
    #[serde(default)]
    pub ext_data: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionRes {
    #[serde(rename = "s_id")]
    pub session_id: i64,
    pub parent_id: i64,
    #[serde(rename = "type")]
    pub session_type: i32,
    pub entity_id: i64,
    pub name: String,
    pub remark: String,
    pub function_flag: i64,
    pub mute: i32,
    pub role: i32,
    pub top: i64,
    pub status: i32,
    pub note_name: String,
    pub note_avatar: String,
    pub ext_data: Option<String>,
    #[serde(rename = "c_time")]
    pub create_time: i64,
    #[serde(rename = "m_time")]
    pub update_time: i64,
    /// false 表示命中已有会话(含单聊重开)
    pub is_new: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSessionReq {
    #[serde(rename = "u_id", default)]
    pub user_id: i64,
    #[serde(rename = "s_id")]
    pub session_id: i64,
    pub name: Option<String>,
    pub remark: Option<String>,
    /// 全员禁言开关, 仅接受 0/1
    pub mute: Option<i32>,
    pub function_flag: Option<i64>,
    pub ext_data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSessionTypeReq {
    #[serde(rename = "id")]
    pub session_id: i64,
    #[serde(rename = "type")]
    pub session_type: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateUserSessionReq {
    #[serde(rename = "u_id")]
    pub user_id: i64,
    #[serde(rename = "s_id")]
    pub session_id: i64,
    pub top: Option<i64>,
    pub status: Option<i32>,
    pub note_name: Option<String>,
    pub note_avatar: Option<String>,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSessionDto {
    #[serde(rename = "s_id")]
    pub session_id: i64,
    #[serde(rename = "u_id")]
    pub user_id: i64,
    pub parent_id: i64,
    #[serde(rename = "type")]
    pub session_type: i32,
    pub entity_id: i64,
    pub name: String,
    pub remark: String,
    pub function_flag: i64,
    pub mute: i32,
    pub role: i32,
    pub top: i64,
    pub status: i32,
    pub note_name: String,
    pub note_avatar: String,
    pub ext_data: Option<String>,
    #[serde(rename = "c_time")]
    pub create_time: i64,
    #[serde(rename = "m_time")]
    pub update_time: i64,
    pub deleted: i8,
}

impl From<UserSession> for UserSessionDto {
    fn from(us: UserSession) -> Self {
        Self {
            session_id: us.session_id,
            user_id: us.user_id,
            parent_id: us.parent_id,
            session_type: us.session_type,
            entity_id: us.entity_id,
            name: us.name,
            remark: us.remark,
            function_flag: us.function_flag,
            mute: us.mute,
            role: us.role,
            top: us.top,
            status: us.status,
            note_name: us.note_name,
            note_avatar: us.note_avatar,
            ext_data: us.ext_data,
            create_time: us.create_time,
            update_time: us.update_time,
            deleted: us.deleted,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryLatestUserSessionReq {
    #[serde(rename = "u_id")]
    pub user_id: i64,
    #[serde(rename = "m_time", default)]
    pub m_time: i64,
    #[serde(default)]
    pub offset: i64,
    pub count: i64,
    /// 会话类型过滤, 为空不过滤
    #[serde(default)]
    pub types: Vec<i32>,
}

// ---------------- 会话成员 ----------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUserDto {
    #[serde(rename = "s_id")]
    pub session_id: i64,
    #[serde(rename = "u_id")]
    pub user_id: i64,
    #[serde(rename = "type")]
    pub session_type: i32,
    pub role: i32,
    pub mute: i32,
    pub status: i32,
    pub note_name: String,
    pub note_avatar: String,
    #[serde(rename = "c_time")]
    pub create_time: i64,
    #[serde(rename = "m_time")]
    pub update_time: i64,
    pub deleted: i8,
}

impl From<SessionUser> for SessionUserDto {
    fn from(su: SessionUser) -> Self {
        Self {
            session_id: su.session_id,
            user_id: su.user_id,
            session_type: su.session_type,
            role: su.role,
            mute: su.mute,
            status: su.status,
            note_name: su.note_name,
            note_avatar: su.note_avatar,
            create_time: su.create_time,
            update_time: su.update_time,
            deleted: su.deleted,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuerySessionUsersReq {
    #[serde(rename = "m_time", default)]
    pub m_time: i64,
    pub role: Option<i32>,
    pub count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionAddUserReq {
    #[serde(rename = "u_id", default)]
    pub user_id: i64,
    pub entity_id: i64,
    #[serde(rename = "u_ids")]
    pub user_ids: Vec<i64>,
    #[serde(default)]
    pub note_names: Vec<String>,
    #[serde(default)]
    pub note_avatars: Vec<String>,
    pub role: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionDelUserReq {
    #[serde(rename = "u_id", default)]
    pub user_id: i64,
    #[serde(rename = "u_ids")]
    pub user_ids: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionUserUpdateReq {
    #[serde(rename = "u_id", default)]
    pub user_id: i64,
    #[serde(rename = "u_ids")]
    pub user_ids: Vec<i64>,
    pub role: Option<i32>,
    /// 单人禁言开关, 仅接受 0/1
    pub mute: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionUserCountRes {
    pub count: i64,
}

// ---------------- 消息 ----------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageReq {
    #[serde(rename = "c_id")]
    pub client_id: i64,
    #[serde(rename = "s_id")]
    pub session_id: i64,
    #[serde(rename = "type")]
    pub msg_type: i32,
    /// 0 表示系统消息, 跳过发送方准入
    #[serde(rename = "f_u_id", default)]
    pub from_user_id: i64,
    #[serde(rename = "c_time")]
    pub c_time: i64,
    pub body: String,
    #[serde(default)]
    pub at_users: Option<String>,
    #[serde(rename = "r_msg_id", default)]
    pub reply_msg_id: Option<i64>,
    #[serde(default)]
    pub ext_data: Option<String>,
    /// 指定接收者, 为空发给全部未拒收成员
    #[serde(default)]
    pub receivers: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRes {
    pub msg_id: i64,
    pub create_time: i64,
    /// 保持接收方原始顺序
    pub online_ids: Vec<i64>,
    /// 去重
    pub offline_ids: Vec<i64>,
}

/// 下发/查询统一的消息形态
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDto {
    #[serde(rename = "c_id")]
    pub client_id: i64,
    #[serde(rename = "s_id")]
    pub session_id: i64,
    pub msg_id: i64,
    #[serde(rename = "f_u_id")]
    pub from_user_id: i64,
    #[serde(rename = "type")]
    pub msg_type: i32,
    pub body: String,
    #[serde(default)]
    pub at_users: Option<String>,
    #[serde(rename = "r_msg_id", default)]
    pub reply_msg_id: Option<i64>,
    #[serde(default)]
    pub ext_data: Option<String>,
    #[serde(default)]
    pub status: Option<i32>,
    #[serde(rename = "c_time")]
    pub create_time: i64,
}

impl From<SessionMessage> for MessageDto {
    fn from(m: SessionMessage) -> Self {
        Self {
            client_id: m.client_id,
            session_id: m.session_id,
            msg_id: m.msg_id,
            from_user_id: m.from_user_id,
            msg_type: m.msg_type,
            body: m.msg_content,
            at_users: m.at_users,
            reply_msg_id: m.reply_msg_id,
            ext_data: m.ext_data,
            status: None,
            create_time: m.create_time,
        }
    }
}

impl From<UserMessage> for MessageDto {
    fn from(m: UserMessage) -> Self {
        Self {
            client_id: m.client_id,
            session_id: m.session_id,
            msg_id: m.msg_id,
            from_user_id: m.from_user_id,
            msg_type: m.msg_type,
            body: m.msg_content,
            at_users: m.at_users,
            reply_msg_id: m.reply_msg_id,
            ext_data: m.ext_data,
            status: Some(m.status),
            create_time: m.create_time,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GetMessageRes {
    pub data: Vec<MessageDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetUserMessageReq {
    #[serde(rename = "u_id")]
    pub user_id: i64,
    #[serde(rename = "c_time", default)]
    pub c_time: i64,
    #[serde(default)]
    pub offset: i64,
    pub count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetSessionMessageReq {
    #[serde(rename = "c_time", default)]
    pub c_time: i64,
    #[serde(default)]
    pub offset: i64,
    pub count: i64,
    /// 逗号分隔的 msg_id 列表
    #[serde(default)]
    pub msg_ids: Option<String>,
    /// 非 0 时按 create_time 升序
    #[serde(default)]
    pub asc: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DelSessionMessageReq {
    #[serde(rename = "u_id", default)]
    pub user_id: i64,
    #[serde(rename = "msg_ids", default)]
    pub msg_ids: Vec<i64>,
    #[serde(default)]
    pub time_from: i64,
    #[serde(default)]
    pub time_to: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteUserMessageReq {
    #[serde(rename = "u_id")]
    pub user_id: i64,
    #[serde(rename = "s_id")]
    pub session_id: i64,
    #[serde(rename = "msg_ids", default)]
    pub msg_ids: Vec<i64>,
    pub time_from: Option<i64>,
    pub time_to: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AckUserMessagesReq {
    #[serde(rename = "u_id")]
    pub user_id: i64,
    #[serde(rename = "s_id")]
    pub session_id: i64,
    pub msg_ids: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadUserMessageReq {
    #[serde(rename = "u_id")]
    pub user_id: i64,
    #[serde(rename = "s_id")]
    pub session_id: i64,
    pub msg_ids: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RevokeUserMessageReq {
    #[serde(rename = "u_id")]
    pub user_id: i64,
    #[serde(rename = "s_id")]
    pub session_id: i64,
    pub msg_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReeditUserMessageReq {
    #[serde(rename = "u_id")]
    pub user_id: i64,
    #[serde(rename = "s_id")]
    pub session_id: i64,
    pub msg_id: i64,
    /// 重编辑后的内容
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForwardUserMessageReq {
    #[serde(flatten)]
    pub message: SendMessageReq,
    #[serde(rename = "fwd_s_id")]
    pub fwd_session_id: i64,
    #[serde(rename = "fwd_from_u_ids", default)]
    pub fwd_from_user_ids: Vec<i64>,
    #[serde(rename = "fwd_client_ids", default)]
    pub fwd_client_ids: Vec<i64>,
}

/// 无会话的系统广播, msg_id 即 client_id
#[derive(Debug, Clone, Deserialize)]
pub struct SendSysMessageReq {
    #[serde(rename = "type")]
    pub msg_type: i32,
    pub body: String,
    #[serde(default)]
    pub ext_data: Option<String>,
    pub receivers: Vec<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendSysMessageRes {
    pub msg_id: i64,
    pub create_time: i64,
    pub online_ids: Vec<i64>,
    pub offline_ids: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushMessageReq {
    #[serde(rename = "type")]
    pub signal_type: i32,
    pub body: String,
    #[serde(rename = "u_ids")]
    pub user_ids: Vec<i64>,
    /// 离线用户是否转离线推送
    #[serde(default)]
    pub offline_push: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PushMessageRes {
    pub online_ids: Vec<i64>,
    pub offline_ids: Vec<i64>,
}

// ---------------- 内容审核 ----------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckMessageReq {
    pub session_type: i32,
    pub session_id: i64,
    #[serde(rename = "from_u_id")]
    pub from_user_id: i64,
    pub entity_id: i64,
    pub message_type: i32,
    pub message_content: String,
}

// ---------------- 在线状态 ----------------

#[derive(Debug, Clone, Deserialize)]
pub struct PostUserOnlineReq {
    #[serde(rename = "u_id")]
    pub user_id: i64,
    pub online: bool,
    #[serde(rename = "conn_id")]
    pub conn_id: i64,
    pub platform: String,
    #[serde(rename = "node_id", default)]
    pub node_id: i64,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryUsersOnlineStatusReq {
    #[serde(rename = "u_ids")]
    pub user_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryUsersOnlineStatusRes {
    pub data: Vec<UserOnlineStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KickUserReq {
    #[serde(rename = "u_ids")]
    pub user_ids: Vec<i64>,
}

/// 上下线回调给用户服务的载荷
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnlineStatusNotify {
    #[serde(rename = "u_id")]
    pub user_id: i64,
    pub is_login: bool,
    pub conn_id: i64,
    pub platform: Platform,
    pub timestamp_ms: i64,
}

// ---------------- 对象 ----------------

#[derive(Debug, Clone, Deserialize)]
pub struct GetUploadParamsReq {
    #[serde(rename = "s_id")]
    pub session_id: i64,
    #[serde(rename = "u_id")]
    pub user_id: i64,
    #[serde(rename = "c_id")]
    pub client_id: i64,
    #[serde(rename = "f_name")]
    pub file_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GetUploadParamsRes {
    pub id: i64,
    pub url: String,
    pub method: String,
    pub params: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetDownloadUrlReq {
    #[serde(rename = "u_id", default)]
    pub user_id: i64,
}
