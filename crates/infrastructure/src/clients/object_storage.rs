//! 对象存储签名客户端
//!
//! 向签名服务换取上传表单参数和下载直链, 本服务不经手文件内容。

use std::collections::HashMap;

use application::ports::ObjectStorage;
use async_trait::async_trait;
use domain::errors::{DomainError, DomainResult};
use serde::Deserialize;

use super::{build_client, remote_err};

#[derive(Debug, Deserialize)]
struct UploadParamsRes {
    url: String,
    method: String,
    #[serde(default)]
    params: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct DownloadUrlRes {
    url: String,
}

pub struct HttpObjectStorage {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpObjectStorage {
    pub fn new(endpoint: &str) -> DomainResult<Self> {
        Ok(Self {
            client: build_client()?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ObjectStorage for HttpObjectStorage {
    async fn upload_params(
        &self,
        key: &str,
    ) -> DomainResult<(String, String, HashMap<String, String>)> {
        let url = format!("{}/object/upload_params", self.endpoint);
        let response = self
            .client
            .get(&url)
            .query(&[("key", key)])
            .send()
            .await
            .map_err(remote_err)?;
        if !response.status().is_success() {
            return Err(DomainError::remote(format!(
                "upload params status {}",
                response.status()
            )));
        }
        let body: UploadParamsRes = response.json().await.map_err(remote_err)?;
        Ok((body.url, body.method, body.params))
    }

    async fn download_url(&self, key: &str) -> DomainResult<String> {
        let url = format!("{}/object/download_url", self.endpoint);
        let response = self
            .client
            .get(&url)
            .query(&[("key", key)])
            .send()
            .await
            .map_err(remote_err)?;
        if !response.status().is_success() {
            return Err(DomainError::remote(format!(
                "download url status {}",
                response.status()
            )));
        }
        let body: DownloadUrlRes = response.json().await.map_err(remote_err)?;
        Ok(body.url)
    }
}
