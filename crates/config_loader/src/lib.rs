//! # Config Loader
//!
//! 加载并校验追踪器配置。
//!
//! 职责：
//! - 解析 TOML/JSON 配置文件
//! - 校验容差、周期和速率区间
//! - 生成 `TrackerConfig`
//!
//! # 示例
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_path(Path::new("tracker.toml")).unwrap();
//! println!("max speed: {}", config.engine.max_speed);
//! ```

mod parser;
mod validator;

pub use contracts::TrackerConfig;
pub use parser::ConfigFormat;
pub use validator::validate_runnable;

use contracts::ContractError;
use std::path::Path;

/// 配置加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 从文件路径加载配置
    ///
    /// 根据扩展名 (.toml / .json) 判断格式。
    ///
    /// # Errors
    /// - 文件读取失败
    /// - 格式不支持
    /// - 解析失败
    /// - 校验失败
    pub fn load_from_path(path: &Path) -> Result<TrackerConfig, ContractError> {
        let format = Self::detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content, format)
    }

    /// 从字符串加载配置
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<TrackerConfig, ContractError> {
        let config = parser::parse(content, format)?;
        validator::validate(&config)?;
        Ok(config)
    }

    /// 将 TrackerConfig 序列化为 TOML 字符串
    pub fn to_toml(config: &TrackerConfig) -> Result<String, ContractError> {
        toml::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// 将 TrackerConfig 序列化为 JSON 字符串
    pub fn to_json(config: &TrackerConfig) -> Result<String, ContractError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }

    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }
}
