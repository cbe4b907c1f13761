//! 分层错误定义
//!
//! 按来源分类：config / metadata / beacon

use thiserror::Error;

/// 统一错误类型
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// 配置解析错误
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// 配置校验错误
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Metadata Errors =====
    /// 元数据请求失败（传输错误或非 2xx）
    #[error("metadata fetch error for '{url}': {message}")]
    MetadataFetch { url: String, message: String },

    /// 元数据无法解码或不完整
    #[error("metadata decode error: {message}")]
    MetadataDecode { message: String },

    /// 元数据有效区间未覆盖当前位置
    #[error("metadata window [{start}, {end}] does not cover position {position}")]
    MetadataOutOfRange { start: f64, end: f64, position: f64 },

    // ===== Beacon Errors =====
    /// Beacon 请求未得到 HTTP 状态码
    #[error("beacon transport error for '{url}': {message}")]
    BeaconTransport { url: String, message: String },

    /// URL 无法解析
    #[error("invalid url '{url}'")]
    InvalidUrl { url: String },

    // ===== General Errors =====
    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 其他错误
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// 创建配置解析错误
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// 创建配置校验错误
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// 创建元数据请求错误
    pub fn metadata_fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MetadataFetch {
            url: url.into(),
            message: message.into(),
        }
    }

    /// 创建元数据解码错误
    pub fn metadata_decode(message: impl Into<String>) -> Self {
        Self::MetadataDecode {
            message: message.into(),
        }
    }

    /// 创建 beacon 传输错误
    pub fn beacon_transport(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BeaconTransport {
            url: url.into(),
            message: message.into(),
        }
    }

    /// 之后的请求是否可能成功
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            Self::MetadataFetch { .. } | Self::MetadataDecode { .. } | Self::MetadataOutOfRange { .. }
        )
    }
}
