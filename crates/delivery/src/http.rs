//! 基于 reqwest 的 beacon 客户端

use std::time::Duration;

use contracts::{BeaconClient, ContractError};
use tracing::trace;

use crate::error::DeliveryError;

/// 以普通 GET 请求发送 beacon
#[derive(Debug, Clone)]
pub struct HttpBeaconClient {
    client: reqwest::Client,
}

impl HttpBeaconClient {
    /// 创建请求在 `timeout` 后放弃的客户端
    pub fn new(timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl BeaconClient for HttpBeaconClient {
    async fn send(&self, url: &str) -> Result<u16, ContractError> {
        let resp = self.client.get(url).send().await.map_err(|e| {
            if e.is_builder() {
                ContractError::InvalidUrl {
                    url: url.to_string(),
                }
            } else {
                ContractError::beacon_transport(url, e.to_string())
            }
        })?;
        let status = resp.status().as_u16();
        trace!(url, status, "Beacon response");
        Ok(status)
    }
}
