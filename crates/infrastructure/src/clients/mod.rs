//! 出站 HTTP 客户端

pub mod msg_checker;
pub mod object_storage;
pub mod user_api;

pub use msg_checker::HttpMessageChecker;
pub use object_storage::HttpObjectStorage;
pub use user_api::HttpUserApi;

use std::time::Duration;

use domain::errors::{DomainError, DomainResult};

/// 出站请求统一超时
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) fn build_client() -> DomainResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| DomainError::remote(format!("build http client: {}", e)))
}

pub(crate) fn remote_err(e: reqwest::Error) -> DomainError {
    DomainError::remote(e.to_string())
}
