//! 配置校验模块
//!
//! 规则：
//! - 容差和保留时长非负
//! - `max_speed` 和 `sampling_period_ms` 为正
//! - `normal_rate_min <= normal_rate_max`
//! - 会话周期和队列容量为正

use contracts::{ContractError, EngineConfig, SessionConfig, TrackerConfig};

/// 校验 TrackerConfig
///
/// 返回遇到的第一个错误，或 Ok(())。
pub fn validate(config: &TrackerConfig) -> Result<(), ContractError> {
    validate_engine(&config.engine)?;
    validate_session(&config.session)?;
    Ok(())
}

/// 校验会话是否有可获取元数据的地址
pub fn validate_runnable(config: &TrackerConfig) -> Result<(), ContractError> {
    let has_url = |u: &Option<String>| u.as_deref().is_some_and(|s| !s.trim().is_empty());
    if !has_url(&config.session.media_url) && !has_url(&config.session.metadata_url) {
        return Err(ContractError::config_validation(
            "session.media_url",
            "either media_url or metadata_url must be set",
        ));
    }
    Ok(())
}

fn validate_engine(engine: &EngineConfig) -> Result<(), ContractError> {
    let non_negative = [
        ("end_tolerance_ms", engine.end_tolerance_ms),
        ("min_dispatch_window_ms", engine.min_dispatch_window_ms),
        ("pre_roll_tolerance_ms", engine.pre_roll_tolerance_ms),
        ("secondary_tolerance_ms", engine.secondary_tolerance_ms),
        ("retention_ms", engine.retention_ms),
        ("played_retention_ms", engine.played_retention_ms),
        ("early_fetch_ms", engine.early_fetch_ms),
        ("time_jump_reset_ms", engine.time_jump_reset_ms),
        ("time_jump_start_tolerance_ms", engine.time_jump_start_tolerance_ms),
    ];
    for (field, value) in non_negative {
        if !(value >= 0.0) {
            return Err(ContractError::config_validation(
                format!("engine.{field}"),
                format!("must be >= 0, got {value}"),
            ));
        }
    }

    if !(engine.max_speed > 0.0) {
        return Err(ContractError::config_validation(
            "engine.max_speed",
            format!("must be > 0, got {}", engine.max_speed),
        ));
    }

    if !(engine.sampling_period_ms > 0.0) {
        return Err(ContractError::config_validation(
            "engine.sampling_period_ms",
            format!("must be > 0, got {}", engine.sampling_period_ms),
        ));
    }

    if engine.normal_rate_min > engine.normal_rate_max {
        return Err(ContractError::config_validation(
            "engine.normal_rate_min",
            format!(
                "normal_rate_min ({}) > normal_rate_max ({})",
                engine.normal_rate_min, engine.normal_rate_max
            ),
        ));
    }

    Ok(())
}

fn validate_session(session: &SessionConfig) -> Result<(), ContractError> {
    let positive = [
        ("refresh_interval_ms", session.refresh_interval_ms),
        ("tick_interval_ms", session.tick_interval_ms),
        ("sample_interval_ms", session.sample_interval_ms),
        ("request_timeout_ms", session.request_timeout_ms),
    ];
    for (field, value) in positive {
        if value == 0 {
            return Err(ContractError::config_validation(
                format!("session.{field}"),
                "must be > 0",
            ));
        }
    }

    if session.report_queue_capacity == 0 {
        return Err(ContractError::config_validation(
            "session.report_queue_capacity",
            "must be > 0",
        ));
    }

    Ok(())
}
