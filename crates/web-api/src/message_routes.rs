//! 消息路由

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};

use application::dto::{
    AckUserMessagesReq, DelSessionMessageReq, DeleteUserMessageReq, ForwardUserMessageReq,
    GetMessageRes, GetSessionMessageReq, GetUserMessageReq, ReadUserMessageReq,
    ReeditUserMessageReq, RevokeUserMessageReq, SendMessageReq, SendMessageRes,
};
use domain::errors::DomainError;
use domain::message::is_control_type;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::session_routes::parse_id_list;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/message", post(send_message).delete(delete_user_messages))
        .route("/message/latest", get(get_user_messages))
        .route("/message/ack", post(ack_user_messages))
        .route("/message/read", post(read_user_messages))
        .route("/message/revoke", post(revoke_user_message))
        .route("/message/reedit", post(reedit_user_message))
        .route("/message/forward", post(forward_user_message))
        .route(
            "/session/{id}/message",
            get(get_session_messages).delete(del_session_messages),
        )
}

async fn send_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(mut req): Json<SendMessageReq>,
) -> Result<Json<SendMessageRes>, ApiError> {
    if !auth.is_backend() {
        // 控制消息只允许服务端合成
        if is_control_type(req.msg_type) {
            return Err(ApiError(DomainError::MessageTypeNotSupport));
        }
        req.from_user_id = auth.0;
    }
    let res = state.message_service.send_message(req).await?;
    Ok(Json(res))
}

async fn get_user_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(mut req): Query<GetUserMessageReq>,
) -> Result<Json<GetMessageRes>, ApiError> {
    if !auth.is_backend() {
        req.user_id = auth.0;
    }
    let res = state.message_service.get_user_messages(req).await?;
    Ok(Json(res))
}

async fn get_session_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(session_id): Path<i64>,
    Query(req): Query<GetSessionMessageReq>,
) -> Result<Json<GetMessageRes>, ApiError> {
    if !auth.is_backend()
        && !state.session_service.can_read(auth.0, session_id).await?
    {
        return Err(ApiError(DomainError::Forbidden));
    }
    let msg_ids = parse_id_list::<i64>(req.msg_ids.as_deref())?;
    let res = state
        .message_service
        .get_session_messages(
            session_id,
            req.c_time,
            req.offset,
            req.count,
            &msg_ids,
            req.asc != 0,
        )
        .await?;
    Ok(Json(res))
}

async fn del_session_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(session_id): Path<i64>,
    Json(req): Json<DelSessionMessageReq>,
) -> Result<StatusCode, ApiError> {
    if !auth.is_backend()
        && !state
            .session_service
            .can_mutate(auth.0, session_id, &[])
            .await?
    {
        return Err(ApiError(DomainError::Forbidden));
    }
    state
        .message_service
        .del_session_messages(session_id, req)
        .await?;
    Ok(StatusCode::OK)
}

async fn delete_user_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(mut req): Json<DeleteUserMessageReq>,
) -> Result<StatusCode, ApiError> {
    if !auth.is_backend() {
        req.user_id = auth.0;
    }
    state.message_service.delete_user_messages(req).await?;
    Ok(StatusCode::OK)
}

async fn ack_user_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(mut req): Json<AckUserMessagesReq>,
) -> Result<StatusCode, ApiError> {
    if !auth.is_backend() {
        req.user_id = auth.0;
    }
    state.message_service.ack_user_messages(req).await?;
    Ok(StatusCode::OK)
}

async fn read_user_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(mut req): Json<ReadUserMessageReq>,
) -> Result<StatusCode, ApiError> {
    if !auth.is_backend() {
        req.user_id = auth.0;
    }
    state.message_service.read_user_messages(req).await?;
    Ok(StatusCode::OK)
}

async fn revoke_user_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(mut req): Json<RevokeUserMessageReq>,
) -> Result<StatusCode, ApiError> {
    if !auth.is_backend() {
        req.user_id = auth.0;
    }
    state.message_service.revoke_user_message(req).await?;
    Ok(StatusCode::OK)
}

async fn reedit_user_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(mut req): Json<ReeditUserMessageReq>,
) -> Result<StatusCode, ApiError> {
    if !auth.is_backend() {
        req.user_id = auth.0;
    }
    state.message_service.reedit_user_message(req).await?;
    Ok(StatusCode::OK)
}

async fn forward_user_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(mut req): Json<ForwardUserMessageReq>,
) -> Result<Json<SendMessageRes>, ApiError> {
    if !auth.is_backend() {
        if is_control_type(req.message.msg_type) {
            return Err(ApiError(DomainError::MessageTypeNotSupport));
        }
        req.message.from_user_id = auth.0;
    }
    let res = state.message_service.forward_user_message(req).await?;
    Ok(Json(res))
}
