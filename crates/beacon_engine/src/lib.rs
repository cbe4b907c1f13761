//! # Beacon Engine
//!
//! 决定追踪点何时触发。
//!
//! 职责：
//! - 追踪实际播放过的位置
//! - 每次 tick 扫描到期的时钟驱动追踪点，受播放速度门控
//! - 次级内容在时段中途停滞时暂停扫描
//! - 补发扫描期间未能看到的已播放追踪点
//! - 在单个会话任务中串行处理采样、tick、刷新和操作
//!
//! ## 使用示例
//!
//! ```ignore
//! use beacon_engine::{BeaconEngine, TrackingSession};
//!
//! let session = TrackingSession::from_config(&config, client, source, Some(reports_tx))?;
//! let handle = session.spawn();
//! handle.push_sample(ClockSample::at(position)).await?;
//! let summary = handle.shutdown().await?;
//! ```

pub mod engine;
pub mod error;
pub mod played_range;
pub mod session;
pub mod suppression;

pub use engine::{settle_all, BeaconEngine, TickDecision, TickReport};
pub use error::EngineError;
pub use played_range::PlayedRangeTracker;
pub use session::{resolve_metadata_url, SessionHandle, SessionSummary, TrackingSession};
pub use suppression::SuppressionPolicy;
