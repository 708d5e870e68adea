//! 系统路由
//!
//! 网关回调与服务端互调接口, 一律走 ip 白名单鉴权。

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use application::dto::{
    CreateSessionReq, CreateSessionRes, KickUserReq, PostUserOnlineReq, PushMessageReq,
    PushMessageRes, QueryUsersOnlineStatusReq, QueryUsersOnlineStatusRes, SendMessageReq,
    SendMessageRes, SendSysMessageReq, SendSysMessageRes, SessionAddUserReq, SessionDelUserReq,
    UpdateSessionTypeReq,
};

use crate::error::ApiError;
use crate::session_routes::{parse_id_list, DelUserQuery};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/system/user/online",
            post(post_user_online).get(query_online_status),
        )
        .route("/system/user/kickoff", post(kick_users))
        .route(
            "/system/session",
            post(create_session).put(update_session_type),
        )
        .route(
            "/system/session/{id}/user",
            post(add_session_user).delete(del_session_user),
        )
        .route("/system/session_message", post(send_session_message))
        .route("/system/system_message", post(send_sys_message))
        .route("/system/push_message", post(push_message))
}

/// 网关连接事件回调, 驱动在线记录与上下线通知
async fn post_user_online(
    State(state): State<AppState>,
    Json(req): Json<PostUserOnlineReq>,
) -> Result<StatusCode, ApiError> {
    state.user_service.update_online_status(req).await?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
struct OnlineStatusQuery {
    /// 逗号分隔的 uid 列表
    u_ids: String,
}

async fn query_online_status(
    State(state): State<AppState>,
    Query(query): Query<OnlineStatusQuery>,
) -> Result<Json<QueryUsersOnlineStatusRes>, ApiError> {
    let user_ids = parse_id_list::<i64>(Some(&query.u_ids))?;
    let res = state
        .user_service
        .query_online_status(QueryUsersOnlineStatusReq { user_ids })
        .await?;
    Ok(Json(res))
}

async fn kick_users(
    State(state): State<AppState>,
    Json(req): Json<KickUserReq>,
) -> Result<StatusCode, ApiError> {
    state.user_service.kick_users(req).await?;
    Ok(StatusCode::OK)
}

/// 服务端建会话(单聊重建走同一入口)
async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionReq>,
) -> Result<Json<CreateSessionRes>, ApiError> {
    let res = state.session_service.create(req).await?;
    Ok(Json(res))
}

async fn update_session_type(
    State(state): State<AppState>,
    Json(req): Json<UpdateSessionTypeReq>,
) -> Result<StatusCode, ApiError> {
    state
        .session_service
        .update_type(req.session_id, req.session_type)
        .await?;
    Ok(StatusCode::OK)
}

async fn add_session_user(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
    Json(req): Json<SessionAddUserReq>,
) -> Result<StatusCode, ApiError> {
    state
        .session_service
        .add_session_user(session_id, req)
        .await?;
    Ok(StatusCode::OK)
}

async fn del_session_user(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
    Query(query): Query<DelUserQuery>,
    Json(req): Json<SessionDelUserReq>,
) -> Result<StatusCode, ApiError> {
    state
        .session_service
        .del_session_user(session_id, query.delete_msg != 0, req)
        .await?;
    Ok(StatusCode::OK)
}

/// 服务端发会话消息, 允许 f_u_id=0 与控制类型
async fn send_session_message(
    State(state): State<AppState>,
    Json(req): Json<SendMessageReq>,
) -> Result<Json<SendMessageRes>, ApiError> {
    let res = state.message_service.send_message(req).await?;
    Ok(Json(res))
}

/// 无会话的系统广播, 接收者必填
async fn send_sys_message(
    State(state): State<AppState>,
    Json(req): Json<SendSysMessageReq>,
) -> Result<Json<SendSysMessageRes>, ApiError> {
    let res = state.message_service.send_sys_message(req).await?;
    Ok(Json(res))
}

async fn push_message(
    State(state): State<AppState>,
    Json(req): Json<PushMessageReq>,
) -> Result<Json<PushMessageRes>, ApiError> {
    let res = state.message_service.push_message(req).await?;
    Ok(Json(res))
}
