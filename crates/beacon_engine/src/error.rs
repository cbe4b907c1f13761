//! 引擎与会话错误类型

use thiserror::Error;

/// 建立会话或与会话通信时的错误
#[derive(Debug, Error)]
pub enum EngineError {
    /// 既未配置元数据 URL 也未配置媒体 URL
    #[error("no metadata url: set session.metadata_url or session.media_url")]
    NoMetadataUrl,

    /// 元数据 URL 推导失败
    #[error("metadata error: {0}")]
    Metadata(#[from] metadata::MetadataError),

    /// 会话任务已停止
    #[error("tracking session closed")]
    SessionClosed,

    /// 会话任务 panic
    #[error("tracking session failed: {0}")]
    SessionPanicked(String),
}
