//! # Contracts
//!
//! 工作区内所有 crate 共享的冻结接口契约。
//! 业务 crate 只依赖本 crate；禁止反向依赖。
//!
//! ## 时间模型
//! - 所有时间戳均为自 Unix 纪元起的毫秒数 (wall-clock position)，
//!   类型为 `f64`（与播放器上报 program date 的单位一致）
//! - 时长使用相同单位

mod beacon_client;
mod clock;
mod document;
mod error;
mod metadata_source;
mod schedule;
mod time_range;
mod tracker_config;

pub use beacon_client::{BeaconClient, LocalBeaconClient};
pub use clock::{ClockSample, SecondaryState, SecondaryStatus};
pub use document::{AdBreakDoc, AdDoc, DataRangeDoc, MetadataDocument, TrackingEventDoc};
pub use error::*;
pub use metadata_source::{LocalMetadataSource, MetadataSource};
pub use schedule::*;
pub use time_range::TimeRange;
pub use tracker_config::*;
