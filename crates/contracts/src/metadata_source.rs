//! MetadataSource trait - 调度文档获取接口

use crate::{ContractError, MetadataDocument};

/// 元数据文档来源
#[trait_variant::make(MetadataSource: Send)]
pub trait LocalMetadataSource {
    /// 获取并解码 `url` 处的文档
    ///
    /// # Errors
    /// 返回 `MetadataFetch` 或 `MetadataDecode`
    async fn fetch(&self, url: &str) -> Result<MetadataDocument, ContractError>;
}
