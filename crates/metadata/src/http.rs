//! 基于 reqwest 的元数据来源

use std::time::Duration;

use contracts::{ContractError, MetadataDocument, MetadataSource};
use tracing::{debug, instrument};

use crate::error::MetadataError;

/// 通过 HTTP 获取元数据文档
#[derive(Debug, Clone)]
pub struct HttpMetadataSource {
    client: reqwest::Client,
}

impl HttpMetadataSource {
    /// 创建请求在 `timeout` 后放弃的来源
    pub fn new(timeout: Duration) -> Result<Self, MetadataError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// 包装已有客户端
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl MetadataSource for HttpMetadataSource {
    #[instrument(name = "http_metadata_fetch", skip(self))]
    async fn fetch(&self, url: &str) -> Result<MetadataDocument, ContractError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ContractError::metadata_fetch(url, e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ContractError::metadata_fetch(
                url,
                format!("unexpected status {}", status.as_u16()),
            ));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| ContractError::metadata_fetch(url, e.to_string()))?;
        debug!(bytes = body.len(), "Metadata body received");

        serde_json::from_slice(&body).map_err(|e| ContractError::metadata_decode(e.to_string()))
    }
}
