//! 内容审核客户端
//!
//! 审核服务拒绝时返回 {code, message}, 错误码原样透传给发送方。

use application::dto::CheckMessageReq;
use application::ports::MessageChecker;
use async_trait::async_trait;
use domain::errors::{DomainError, DomainResult};
use serde::Deserialize;

use super::{build_client, remote_err};

#[derive(Debug, Deserialize)]
struct RejectRes {
    code: i32,
    message: String,
}

pub struct HttpMessageChecker {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpMessageChecker {
    pub fn new(endpoint: &str) -> DomainResult<Self> {
        Ok(Self {
            client: build_client()?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn check_url(&self) -> String {
        format!("{}/system/message/check", self.endpoint)
    }
}

#[async_trait]
impl MessageChecker for HttpMessageChecker {
    async fn check(&self, req: &CheckMessageReq) -> DomainResult<()> {
        let url = self.check_url();
        let response = self
            .client
            .post(&url)
            .json(req)
            .send()
            .await
            .map_err(remote_err)?;
        if response.status().is_success() {
            return Ok(());
        }
        match response.json::<RejectRes>().await {
            Ok(reject) => Err(DomainError::Moderation {
                code: reject.code,
                message: reject.message,
            }),
            Err(e) => Err(remote_err(e)),
        }
    }
}
