//! BeaconClient trait - 投递传输接口

use crate::ContractError;

/// beacon 回调的 HTTP 传输
///
/// 只要收到响应就返回其状态码；
/// 传输失败（包括传输层自身超时）视为错误。
#[trait_variant::make(BeaconClient: Send)]
pub trait LocalBeaconClient {
    /// 向 `url` 发起 GET
    ///
    /// # Errors
    /// 未收到状态码时返回 `BeaconTransport` / `InvalidUrl`
    async fn send(&self, url: &str) -> Result<u16, ContractError>;
}
