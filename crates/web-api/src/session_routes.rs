//! 会话与成员路由

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Extension, Json, Router};
use serde::Deserialize;

use application::dto::{
    QueryLatestUserSessionReq, QuerySessionUsersReq, SessionAddUserReq, SessionDelUserReq,
    SessionUserDto, SessionUserUpdateReq, UpdateSessionReq, UpdateUserSessionReq, UserSessionDto,
};
use domain::errors::DomainError;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/session/{id}", put(update_session).delete(delete_session))
        .route(
            "/session/{id}/user",
            get(query_session_users)
                .post(add_session_user)
                .delete(del_session_user)
                .put(update_session_user),
        )
        .route("/session/{id}/user/{uid}", get(query_session_user))
        .route(
            "/user_session",
            get(query_user_session).put(update_user_session),
        )
        .route("/user_session/latest", get(query_latest_user_sessions))
        .route(
            "/user_session/{uid}/{sid}",
            get(get_user_session).delete(delete_user_session),
        )
}

/// 用户调用时校验 path/body 里的 uid 与登录态一致
fn check_self(auth: AuthUser, user_id: i64) -> Result<(), ApiError> {
    if auth.is_backend() || auth.0 == user_id {
        Ok(())
    } else {
        Err(ApiError(DomainError::Forbidden))
    }
}

async fn ensure_can_mutate(
    state: &AppState,
    auth: AuthUser,
    session_id: i64,
    targets: &[i64],
) -> Result<(), ApiError> {
    if auth.is_backend() {
        return Ok(());
    }
    if state
        .session_service
        .can_mutate(auth.0, session_id, targets)
        .await?
    {
        Ok(())
    } else {
        Err(ApiError(DomainError::Forbidden))
    }
}

async fn ensure_can_read(
    state: &AppState,
    auth: AuthUser,
    session_id: i64,
) -> Result<(), ApiError> {
    if auth.is_backend() {
        return Ok(());
    }
    if state.session_service.can_read(auth.0, session_id).await? {
        Ok(())
    } else {
        Err(ApiError(DomainError::Forbidden))
    }
}

async fn update_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(session_id): Path<i64>,
    Json(mut req): Json<UpdateSessionReq>,
) -> Result<StatusCode, ApiError> {
    req.session_id = session_id;
    ensure_can_mutate(&state, auth, session_id, &[]).await?;
    state.session_service.update(req).await?;
    Ok(StatusCode::OK)
}

async fn delete_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(session_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    ensure_can_mutate(&state, auth, session_id, &[]).await?;
    state.session_service.delete(session_id).await?;
    Ok(StatusCode::OK)
}

async fn query_session_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(session_id): Path<i64>,
    Query(req): Query<QuerySessionUsersReq>,
) -> Result<Json<Vec<SessionUserDto>>, ApiError> {
    ensure_can_read(&state, auth, session_id).await?;
    let list = state
        .session_service
        .query_session_users(session_id, req)
        .await?;
    Ok(Json(list))
}

async fn add_session_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(session_id): Path<i64>,
    Json(req): Json<SessionAddUserReq>,
) -> Result<StatusCode, ApiError> {
    ensure_can_mutate(&state, auth, session_id, &[]).await?;
    state
        .session_service
        .add_session_user(session_id, req)
        .await?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
pub(crate) struct DelUserQuery {
    /// 1 时连同清理被踢用户的会话消息
    #[serde(default)]
    pub(crate) delete_msg: i32,
}

async fn del_session_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(session_id): Path<i64>,
    Query(query): Query<DelUserQuery>,
    Json(req): Json<SessionDelUserReq>,
) -> Result<StatusCode, ApiError> {
    ensure_can_mutate(&state, auth, session_id, &req.user_ids).await?;
    state
        .session_service
        .del_session_user(session_id, query.delete_msg != 0, req)
        .await?;
    Ok(StatusCode::OK)
}

async fn update_session_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(session_id): Path<i64>,
    Json(req): Json<SessionUserUpdateReq>,
) -> Result<StatusCode, ApiError> {
    ensure_can_mutate(&state, auth, session_id, &req.user_ids).await?;
    state
        .session_service
        .update_session_user(session_id, req)
        .await?;
    Ok(StatusCode::OK)
}

async fn query_session_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((session_id, user_id)): Path<(i64, i64)>,
) -> Result<Json<SessionUserDto>, ApiError> {
    ensure_can_read(&state, auth, session_id).await?;
    let su = state
        .session_service
        .query_session_user(session_id, user_id)
        .await?;
    Ok(Json(su))
}

#[derive(Debug, Deserialize)]
struct UserSessionQuery {
    #[serde(rename = "u_id", default)]
    user_id: i64,
    entity_id: i64,
    #[serde(rename = "type")]
    session_type: i32,
}

/// 按 (uid, 对端实体, 类型) 查会话
async fn query_user_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<UserSessionQuery>,
) -> Result<Json<UserSessionDto>, ApiError> {
    let user_id = if auth.is_backend() { query.user_id } else { auth.0 };
    let us = state
        .session_service
        .get_user_session_by_entity_id(user_id, query.entity_id, query.session_type)
        .await?;
    Ok(Json(us))
}

async fn update_user_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(mut req): Json<UpdateUserSessionReq>,
) -> Result<StatusCode, ApiError> {
    if !auth.is_backend() {
        req.user_id = auth.0;
    }
    state.session_service.update_user_session(req).await?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
struct LatestQuery {
    #[serde(rename = "u_id", default)]
    user_id: i64,
    #[serde(rename = "m_time", default)]
    m_time: i64,
    #[serde(default)]
    offset: i64,
    count: i64,
    /// 逗号分隔的会话类型列表
    #[serde(default)]
    types: Option<String>,
}

async fn query_latest_user_sessions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<LatestQuery>,
) -> Result<Json<Vec<UserSessionDto>>, ApiError> {
    let user_id = if auth.is_backend() { query.user_id } else { auth.0 };
    let types = parse_id_list::<i32>(query.types.as_deref())?;
    let req = QueryLatestUserSessionReq {
        user_id,
        m_time: query.m_time,
        offset: query.offset,
        count: query.count,
        types,
    };
    let list = state.session_service.query_latest_user_sessions(req).await?;
    Ok(Json(list))
}

/// 解析逗号分隔的数字列表
pub(crate) fn parse_id_list<T: std::str::FromStr>(raw: Option<&str>) -> Result<Vec<T>, ApiError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.trim().parse::<T>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| ApiError(DomainError::ParamsError))
}

async fn get_user_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((user_id, session_id)): Path<(i64, i64)>,
) -> Result<Json<UserSessionDto>, ApiError> {
    check_self(auth, user_id)?;
    let us = state
        .session_service
        .get_user_session(user_id, session_id)
        .await?;
    Ok(Json(us))
}

async fn delete_user_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((user_id, session_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    check_self(auth, user_id)?;
    state
        .session_service
        .delete_user_session(user_id, session_id)
        .await?;
    Ok(StatusCode::OK)
}
