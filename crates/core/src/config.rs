use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SchedulerError};

/// 租户扇出并行度的上限
pub const MAX_PARALLELISM_CEILING: usize = 8;

/// 调度器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// 两次调度之间的最大等待时间（秒）
    pub polling_seconds: u64,
    /// 两次调度之间的最小等待时间（秒），也是启动阶段的轮询间隔
    pub min_idle_seconds: u64,
    /// 租户扇出的最大并行度
    pub max_parallelism: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            polling_seconds: 60,
            min_idle_seconds: 10,
            max_parallelism: default_parallelism(),
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.polling_seconds == 0 {
            return Err(SchedulerError::Configuration(
                "scheduler.polling_seconds 必须大于0".to_string(),
            ));
        }
        if self.min_idle_seconds > self.polling_seconds {
            return Err(SchedulerError::Configuration(format!(
                "scheduler.min_idle_seconds ({}) 不能超过 polling_seconds ({})",
                self.min_idle_seconds, self.polling_seconds
            )));
        }
        if self.max_parallelism == 0 || self.max_parallelism > MAX_PARALLELISM_CEILING {
            return Err(SchedulerError::Configuration(format!(
                "scheduler.max_parallelism 必须在 1..={MAX_PARALLELISM_CEILING} 范围内"
            )));
        }
        Ok(())
    }

    pub fn polling_time(&self) -> Duration {
        Duration::from_secs(self.polling_seconds)
    }

    pub fn min_idle_time(&self) -> Duration {
        Duration::from_secs(self.min_idle_seconds)
    }
}

/// 默认并行度：逻辑CPU数量，不超过上限
pub fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(MAX_PARALLELISM_CEILING)
}

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scheduler: SchedulerConfig,
}

impl AppConfig {
    /// 从TOML文件加载配置；文件不存在时使用默认值
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            let config = Self::default();
            config.scheduler.validate()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            SchedulerError::Configuration(format!("读取配置文件失败: {}: {e}", path.display()))
        })?;
        let config: AppConfig = toml::from_str(&content).map_err(|e| {
            SchedulerError::Configuration(format!("解析配置文件失败: {}: {e}", path.display()))
        })?;
        config.scheduler.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SchedulerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.polling_seconds, 60);
        assert_eq!(config.min_idle_seconds, 10);
        assert!(config.max_parallelism >= 1);
        assert!(config.max_parallelism <= MAX_PARALLELISM_CEILING);
    }

    #[test]
    fn test_validate_rejects_zero_polling() {
        let config = SchedulerConfig {
            polling_seconds: 0,
            ..SchedulerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_min_idle_above_polling() {
        let config = SchedulerConfig {
            polling_seconds: 10,
            min_idle_seconds: 30,
            ..SchedulerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_excessive_parallelism() {
        let config = SchedulerConfig {
            max_parallelism: MAX_PARALLELISM_CEILING + 1,
            ..SchedulerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = AppConfig::load("/nonexistent/scheduler.toml").unwrap();
        assert_eq!(config.scheduler.polling_seconds, 60);
    }

    #[test]
    fn test_parse_toml_section() {
        let config: AppConfig = toml::from_str(
            r#"
            [scheduler]
            polling_seconds = 30
            min_idle_seconds = 5
            max_parallelism = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.scheduler.polling_seconds, 30);
        assert_eq!(config.scheduler.min_idle_seconds, 5);
        assert_eq!(config.scheduler.max_parallelism, 4);
        assert!(config.scheduler.validate().is_ok());
    }
}
