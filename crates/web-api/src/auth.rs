//! 鉴权中间件
//!
//! 对外部署(Exposed)时业务路由用 Token 头换取调用方 uid;
//! 内网部署(Backend)与 /system 路由用 ip 白名单, 调用方 uid 记为 0
//! (受信服务端, 各 handler 跳过权限校验)。

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use config::DeployMode;
use domain::errors::DomainError;
use std::net::SocketAddr;
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

/// 已认证调用方, 0 表示受信服务端
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub i64);

impl AuthUser {
    pub fn is_backend(&self) -> bool {
        self.0 == 0
    }
}

fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers.get("Token").and_then(|v| v.to_str().ok())
}

fn client_ip(request: &Request) -> Option<String> {
    // 反向代理后取 X-Real-IP, 直连取对端地址
    if let Some(real_ip) = request
        .headers()
        .get("X-Real-IP")
        .and_then(|v| v.to_str().ok())
    {
        return Some(real_ip.to_string());
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
}

fn check_white_list(state: &AppState, request: &Request) -> Result<(), ApiError> {
    let ip = client_ip(request).ok_or(ApiError(DomainError::Forbidden))?;
    if state.ip_white_list.iter().any(|allowed| allowed == &ip) {
        Ok(())
    } else {
        warn!(ip, "rejected by ip white list");
        Err(ApiError(DomainError::Forbidden))
    }
}

/// 业务路由鉴权
pub async fn business_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth = match state.deploy_mode {
        DeployMode::Exposed => {
            let token = token_from_headers(request.headers())
                .ok_or(ApiError(DomainError::Unauthorized))?;
            let user_id = state.user_api.user_id_by_token(token).await?;
            AuthUser(user_id)
        }
        DeployMode::Backend => {
            check_white_list(&state, &request)?;
            AuthUser(0)
        }
    };
    request.extensions_mut().insert(auth);
    Ok(next.run(request).await)
}

/// /system 路由鉴权, 任何部署模式都走 ip 白名单
pub async fn system_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    check_white_list(&state, &request)?;
    request.extensions_mut().insert(AuthUser(0));
    Ok(next.run(request).await)
}
