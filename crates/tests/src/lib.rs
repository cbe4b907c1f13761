//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 调度属性测试（合并、调度、覆盖、投递）
//! - 文档 -> 合并 -> tick -> 投递
//! - 基于暂停时间的完整追踪会话（无需网络）

#[cfg(test)]
mod mocks;

#[cfg(test)]
mod property_tests;

#[cfg(test)]
mod e2e_tests;

#[cfg(test)]
mod session_tests;
