//! # Metadata
//!
//! 将获取到的追踪元数据转换为内存中的调度。
//!
//! 职责：
//! - 将新文档合并进本地调度，不丢失投递状态
//! - 判断文档是否覆盖当前位置
//! - 由媒体 URL 推导元数据接口地址
//! - 通过 HTTP (reqwest) 获取文档

mod endpoint;
mod error;
mod fetcher;
mod http;
mod reconciler;

pub use contracts::{MetadataDocument, MetadataSource, ScheduleItem};
pub use endpoint::{metadata_url_for, with_start_param};
pub use error::MetadataError;
pub use fetcher::{accept_checked, accept_unchecked, fetch_for_position, AcceptedDocument};
pub use http::HttpMetadataSource;
pub use reconciler::reconcile;
