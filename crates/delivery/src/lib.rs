//! # Delivery
//!
//! 追踪点投递。
//!
//! 职责：
//! - 选中追踪点的同时认领 (`idle -> connecting`)
//! - 每个回调 URL 并发发起一个请求，不短路
//! - 所有 URL 均返回 2xx 才记为 `done`，否则为 `failed`
//! - 每个 URL 发布一条报告，不阻塞于慢消费者

pub mod dispatcher;
pub mod error;
pub mod http;
pub mod metrics;
pub mod report;

pub use contracts::{BeaconClient, DeliveryState, TrackingPoint};
pub use dispatcher::{BeaconDispatcher, InFlight};
pub use error::DeliveryError;
pub use http::HttpBeaconClient;
pub use metrics::{DeliveryMetrics, MetricsSnapshot};
pub use report::{DeliveryOutcome, DeliveryReport};
