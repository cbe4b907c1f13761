//! 元数据错误类型

use thiserror::Error;

/// 元数据相关错误
#[derive(Debug, Error)]
pub enum MetadataError {
    /// 媒体或元数据 URL 不可用
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// HTTP 客户端构建失败
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),

    /// 请求或解码错误（来自 contracts）
    #[error("metadata error: {0}")]
    Contract(#[from] contracts::ContractError),
}

impl MetadataError {
    /// 创建 URL 无效错误
    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }
}
