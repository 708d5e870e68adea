//! HTTP 接入层
//!
//! 路由、鉴权与错误翻译。业务语义全部在 application, 这里只做
//! 参数解析、权限校验和 DomainError 到 HTTP 响应的映射。

pub mod auth;
pub mod error;
pub mod message_routes;
pub mod object_routes;
pub mod session_routes;
pub mod state;
pub mod system_routes;

pub use error::ApiError;
pub use state::AppState;

use axum::middleware;
use axum::Router;
use tower_http::trace::TraceLayer;

/// 组装全部路由
pub fn router(state: AppState) -> Router {
    let business = Router::new()
        .merge(session_routes::routes())
        .merge(message_routes::routes())
        .merge(object_routes::routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::business_auth,
        ));
    let system = system_routes::routes().layer(middleware::from_fn_with_state(
        state.clone(),
        auth::system_auth,
    ));
    Router::new()
        .merge(business)
        .merge(system)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
