//! 进程级配置
//!
//! 加载顺序：内置默认值 → TOML 配置文件 → `TASKMILL_*` 环境变量覆盖。
//! 另外兼容历史环境变量 `SERVER_PORT`（管理接口端口，默认 9999）。

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// 系统配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub log_store: LogStoreConfig,
    pub scheduler: SchedulerConfig,
    pub api: ApiConfig,
    pub observability: ObservabilityConfig,
}

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout_seconds: u64,
}

/// 日志存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogStoreConfig {
    /// 远端对象存储的 HTTP 入口
    pub endpoint: String,
    pub bucket: String,
    /// 远端重试耗尽后落盘的本地目录
    pub spill_dir: String,
    pub max_retries: u32,
    /// 指数退避基数（秒）：第 i 次失败后等待 base * 2^i
    pub retry_base_seconds: u64,
}

/// 执行引擎配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// 轮询数据库的固定间隔（秒）
    pub poll_interval_seconds: u64,
    pub worker_count: usize,
    /// 每个任务的最大尝试次数，必须 >= 1
    pub retry_limit: u32,
    /// 失败重试之间的固定等待（秒）
    pub retry_delay_seconds: u64,
    pub queue_capacity: usize,
}

/// 管理接口配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enabled: bool,
    pub bind_address: String,
}

/// 可观测性配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite:taskmill.db".to_string(),
                max_connections: 5,
                min_connections: 1,
                connection_timeout_seconds: 30,
            },
            log_store: LogStoreConfig {
                endpoint: "http://localhost:9000".to_string(),
                bucket: "taskmill-logs".to_string(),
                spill_dir: "local_logs".to_string(),
                max_retries: 3,
                retry_base_seconds: 1,
            },
            scheduler: SchedulerConfig {
                poll_interval_seconds: 10,
                worker_count: 5,
                retry_limit: 3,
                retry_delay_seconds: 2,
                queue_capacity: 100,
            },
            api: ApiConfig {
                enabled: true,
                bind_address: "0.0.0.0:9999".to_string(),
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                log_format: "pretty".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// 加载配置
    ///
    /// `config_path` 为空时依次探测常用路径；找不到文件就退回默认值。
    /// 环境变量前缀 `TASKMILL`，层级分隔符 `__`，
    /// 例如 `TASKMILL_SCHEDULER__WORKER_COUNT=8`。
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults = toml::to_string(&AppConfig::default())
            .context("序列化默认配置失败")?;

        let mut builder = ConfigBuilder::builder()
            .add_source(File::from_str(&defaults, FileFormat::Toml));

        if let Some(path) = config_path {
            if !Path::new(path).exists() {
                anyhow::bail!("配置文件不存在: {path}");
            }
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        } else {
            for path in ["config/taskmill.toml", "taskmill.toml"] {
                if Path::new(path).exists() {
                    builder = builder.add_source(File::new(path, FileFormat::Toml));
                    break;
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("TASKMILL")
                .separator("__")
                .try_parsing(true),
        );

        let mut app_config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        // 历史兼容：DATABASE_URL 与 SERVER_PORT 直接覆盖
        if let Ok(url) = env::var("DATABASE_URL") {
            app_config.database.url = url;
        }
        if let Ok(port) = env::var("SERVER_PORT") {
            app_config.api.bind_address = format!("0.0.0.0:{port}");
        }

        Ok(app_config)
    }

    /// 测试与嵌入场景使用的内存配置
    pub fn embedded_default() -> Self {
        let mut config = Self::default();
        config.database.url = "sqlite::memory:".to_string();
        config
    }

    /// 从 TOML 字符串解析
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).context("解析TOML配置失败")
    }

    /// 序列化为 TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    /// 校验配置
    ///
    /// `retry_limit = 0` 意味着任务永远不会被尝试，按配置错误拒绝。
    pub fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            anyhow::bail!("database.url 不能为空");
        }
        if self.database.max_connections == 0 {
            anyhow::bail!("database.max_connections 必须大于 0");
        }
        if self.scheduler.worker_count == 0 {
            anyhow::bail!("scheduler.worker_count 必须大于 0");
        }
        if self.scheduler.retry_limit == 0 {
            anyhow::bail!("scheduler.retry_limit 必须大于 0：0 次尝试的任务永远不会执行");
        }
        if self.scheduler.queue_capacity == 0 {
            anyhow::bail!("scheduler.queue_capacity 必须大于 0");
        }
        if self.scheduler.poll_interval_seconds == 0 {
            anyhow::bail!("scheduler.poll_interval_seconds 必须大于 0");
        }
        if self.log_store.bucket.is_empty() {
            anyhow::bail!("log_store.bucket 不能为空");
        }
        if self.log_store.spill_dir.is_empty() {
            anyhow::bail!("log_store.spill_dir 不能为空");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scheduler.worker_count, 5);
        assert_eq!(config.scheduler.retry_limit, 3);
        assert_eq!(config.scheduler.queue_capacity, 100);
        assert_eq!(config.api.bind_address, "0.0.0.0:9999");
    }

    #[test]
    fn test_embedded_default_uses_memory_database() {
        let config = AppConfig::embedded_default();
        assert_eq!(config.database.url, "sqlite::memory:");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_retry_limit_rejected() {
        let mut config = AppConfig::default();
        config.scheduler.retry_limit = 0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("retry_limit"));
    }

    #[test]
    fn test_zero_worker_count_rejected() {
        let mut config = AppConfig::default();
        config.scheduler.worker_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = AppConfig::default();
        let toml_str = config.to_toml().unwrap();
        let parsed = AppConfig::from_toml(&toml_str).unwrap();
        assert_eq!(parsed.database.url, config.database.url);
        assert_eq!(
            parsed.scheduler.poll_interval_seconds,
            config.scheduler.poll_interval_seconds
        );
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[scheduler]\nworker_count = 2\nretry_limit = 1\n\n[api]\nbind_address = \"127.0.0.1:8081\""
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path().to_str().unwrap())).unwrap();
        assert_eq!(config.scheduler.worker_count, 2);
        assert_eq!(config.scheduler.retry_limit, 1);
        assert_eq!(config.api.bind_address, "127.0.0.1:8081");
        // 未覆盖的字段保持默认
        assert_eq!(config.scheduler.queue_capacity, 100);
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(AppConfig::load(Some("/no/such/taskmill.toml")).is_err());
    }
}
