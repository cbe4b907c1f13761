//! 文档接收与按起点锚定的回退请求

use contracts::{ContractError, MetadataDocument, MetadataSource, ScheduleItem, TimeRange};
use tracing::{debug, instrument, warn};

use crate::endpoint::with_start_param;

/// 通过接收检查并已转换为调度节点的文档
#[derive(Debug, Clone)]
pub struct AcceptedDocument {
    /// 文档的请求 URL
    pub url: String,
    /// 文档覆盖的流区间
    pub valid_window: TimeRange,
    /// 投递状态为初始值的调度节点
    pub items: Vec<ScheduleItem>,
}

/// 仅当 `doc` 的有效区间覆盖 `position` 时接收
///
/// 文档在当前位置之后至少还需有效 `early_fetch_ms`：
/// `start <= position <= end - early_fetch_ms`.
pub fn accept_checked(
    url: &str,
    doc: &MetadataDocument,
    position: f64,
    early_fetch_ms: f64,
) -> Result<AcceptedDocument, ContractError> {
    let accepted = accept_unchecked(url, doc)?;
    let window = accepted.valid_window;
    if window.start <= position && position <= window.end - early_fetch_ms {
        Ok(accepted)
    } else {
        Err(ContractError::MetadataOutOfRange {
            start: window.start,
            end: window.end,
            position,
        })
    }
}

/// 不检查位置直接接收 `doc`
///
/// 文档仍需包含完整的 data range。
pub fn accept_unchecked(url: &str, doc: &MetadataDocument) -> Result<AcceptedDocument, ContractError> {
    let valid_window = doc
        .valid_window()
        .ok_or_else(|| ContractError::metadata_decode("document has no complete dataRange"))?;
    Ok(AcceptedDocument {
        url: url.to_string(),
        valid_window,
        items: doc.to_schedule(),
    })
}

/// 获取在 `position` 处可用的文档
///
/// 先请求 `url` 并做区间检查。任何失败都会附加 `start=<position>` 重试，
/// 只要该文档带有 data range 即接收。
#[instrument(name = "metadata_fetch_for_position", skip(source))]
pub async fn fetch_for_position<S: MetadataSource>(
    source: &S,
    url: &str,
    position: f64,
    early_fetch_ms: f64,
) -> Result<AcceptedDocument, ContractError> {
    let first = match source.fetch(url).await {
        Ok(doc) => accept_checked(url, &doc, position, early_fetch_ms),
        Err(e) => Err(e),
    };

    let first_error = match first {
        Ok(accepted) => return Ok(accepted),
        Err(e) => e,
    };
    debug!(error = %first_error, "Plain fetch unusable, retrying anchored at position");

    let anchored_url = with_start_param(url, position)
        .map_err(|e| ContractError::metadata_fetch(url, e.to_string()))?;
    let doc = source.fetch(&anchored_url).await.inspect_err(|e| {
        warn!(url = %anchored_url, error = %e, "Anchored metadata fetch failed");
    })?;
    accept_unchecked(&anchored_url, &doc)
}
