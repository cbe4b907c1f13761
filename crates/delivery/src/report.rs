//! 按 URL 的投递报告

use contracts::EventKind;
use serde::{Deserialize, Serialize};

/// 单个回调请求的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// 2xx 响应
    Delivered { status: u16 },
    /// 其他响应
    Rejected { status: u16 },
    /// 无响应（连接错误、超时、URL 无效）
    Transport { message: String },
}

impl DeliveryOutcome {
    /// 由响应状态码映射
    pub fn from_status(status: u16) -> Self {
        if (200..300).contains(&status) {
            Self::Delivered { status }
        } else {
            Self::Rejected { status }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }

    /// 指标标签
    pub fn label(&self) -> &'static str {
        match self {
            Self::Delivered { .. } => "delivered",
            Self::Rejected { .. } => "rejected",
            Self::Transport { .. } => "transport_error",
        }
    }
}

/// 一次投递尝试，发布给宿主记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub point_id: String,
    pub kind: EventKind,
    pub url: String,
    #[serde(flatten)]
    pub outcome: DeliveryOutcome,
    pub latency_ms: f64,
}
