//! 媒体对象路由
//!
//! 未配置对象存储时两个接口都返回 400。

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::Redirect;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Deserialize;

use application::dto::{GetUploadParamsReq, GetUploadParamsRes};
use application::ObjectService;
use domain::errors::DomainError;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/session/object/upload_params", get(upload_params))
        .route("/session/object/download_url", get(download_url))
}

fn object_service(state: &AppState) -> Result<&Arc<ObjectService>, ApiError> {
    state
        .object_service
        .as_ref()
        .ok_or(ApiError(DomainError::BadRequest))
}

async fn upload_params(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(mut req): Query<GetUploadParamsReq>,
) -> Result<Json<GetUploadParamsRes>, ApiError> {
    if !auth.is_backend() {
        req.user_id = auth.0;
    }
    let res = object_service(&state)?.upload_params(req).await?;
    Ok(Json(res))
}

#[derive(Debug, Deserialize)]
struct DownloadQuery {
    id: i64,
}

async fn download_url(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<DownloadQuery>,
) -> Result<Redirect, ApiError> {
    let url = object_service(&state)?
        .download_url(query.id, auth.0)
        .await?;
    Ok(Redirect::temporary(&url))
}
