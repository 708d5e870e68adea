//! 用户服务客户端
//!
//! token 换 uid 与上下线通知两条出站路径。

use application::dto::OnlineStatusNotify;
use application::ports::UserApi;
use async_trait::async_trait;
use domain::errors::{DomainError, DomainResult};
use serde::Deserialize;
use tracing::debug;

use super::{build_client, remote_err};

#[derive(Debug, Deserialize)]
struct TokenRes {
    #[serde(rename = "u_id")]
    user_id: i64,
}

pub struct HttpUserApi {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpUserApi {
    pub fn new(endpoint: &str) -> DomainResult<Self> {
        Ok(Self {
            client: build_client()?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl UserApi for HttpUserApi {
    async fn user_id_by_token(&self, token: &str) -> DomainResult<i64> {
        let url = format!("{}/user/token", self.endpoint);
        let response = self
            .client
            .get(&url)
            .header("Token", token)
            .send()
            .await
            .map_err(remote_err)?;
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(DomainError::Unauthorized);
        }
        if !response.status().is_success() {
            return Err(DomainError::remote(format!(
                "user api status {}",
                response.status()
            )));
        }
        let body: TokenRes = response.json().await.map_err(remote_err)?;
        if body.user_id <= 0 {
            return Err(DomainError::Unauthorized);
        }
        Ok(body.user_id)
    }

    async fn post_online_status(&self, notify: &OnlineStatusNotify) -> DomainResult<()> {
        let url = format!("{}/user/online", self.endpoint);
        let response = self
            .client
            .post(&url)
            .json(notify)
            .send()
            .await
            .map_err(remote_err)?;
        if !response.status().is_success() {
            return Err(DomainError::remote(format!(
                "online notify status {}",
                response.status()
            )));
        }
        debug!(user_id = notify.user_id, is_login = notify.is_login, "online status notified");
        Ok(())
    }
}
