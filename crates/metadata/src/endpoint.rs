//! 元数据接口地址推导

use url::Url;

use crate::error::MetadataError;

/// 由媒体 URL 推导元数据 URL
///
/// 最后一个路径段替换为 `metadata`；保留查询参数。
pub fn metadata_url_for(media_url: &str) -> Result<String, MetadataError> {
    let mut url =
        Url::parse(media_url).map_err(|e| MetadataError::invalid_url(media_url, e.to_string()))?;

    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| MetadataError::invalid_url(media_url, "url cannot have a path"))?;
        segments.pop().push("metadata");
    }

    Ok(url.to_string())
}

/// 附加 `start=<position>`，让服务端以 `position` 为起点生成文档
pub fn with_start_param(metadata_url: &str, position: f64) -> Result<String, MetadataError> {
    let mut url = Url::parse(metadata_url)
        .map_err(|e| MetadataError::invalid_url(metadata_url, e.to_string()))?;
    url.query_pairs_mut()
        .append_pair("start", &format!("{}", position.trunc() as i64));
    Ok(url.to_string())
}
