//! 投递错误类型

use thiserror::Error;

/// 投递相关错误
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// HTTP 客户端构建失败
    #[error("failed to build beacon client: {0}")]
    ClientBuild(#[from] reqwest::Error),

    /// 投递任务结束但没有结果
    #[error("delivery of '{point_id}' aborted: {message}")]
    Aborted { point_id: String, message: String },

    /// 传输错误（来自 contracts）
    #[error("beacon error: {0}")]
    Contract(#[from] contracts::ContractError),
}

impl DeliveryError {
    pub fn aborted(point_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Aborted {
            point_id: point_id.into(),
            message: message.into(),
        }
    }
}
