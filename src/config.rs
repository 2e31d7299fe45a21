//! 配置模块
//!
//! 支持从 JSON 文件加载系统配置，各阶段超时均在此显式配置

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{QuotationError, Result};

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,
    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
    /// 工作线程数（0 表示使用 CPU 核心数）
    #[serde(default)]
    pub workers: usize,
}

/// 上游报价 API 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// 上游报价地址
    #[serde(default = "default_upstream_url")]
    pub url: String,
    /// 响应中货币对的键
    #[serde(default = "default_pair_key")]
    pub pair_key: String,
    /// 获取超时（毫秒）
    #[serde(default = "default_upstream_timeout")]
    pub timeout_ms: u64,
    /// 连接超时（毫秒）
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

/// 存储后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Sqlite,
    Memory,
}

/// 存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
    /// SQLite 连接串
    #[serde(default = "default_storage_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// 保存超时（毫秒），必须明显小于获取超时
    #[serde(default = "default_save_timeout")]
    pub save_timeout_ms: u64,
}

/// 客户端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// 本地报价服务地址
    #[serde(default = "default_client_url")]
    pub url: String,
    /// 获取超时（毫秒）
    #[serde(default = "default_client_timeout")]
    pub timeout_ms: u64,
    /// 连接本地服务的超时（毫秒）
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    /// 输出文件路径
    #[serde(default = "default_output_path")]
    pub output_path: String,
}

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

// 默认值函数
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_upstream_url() -> String { "https://economia.awesomeapi.com.br/json/last/USD-BRL".to_string() }
fn default_pair_key() -> String { "USDBRL".to_string() }
fn default_upstream_timeout() -> u64 { 200 }
fn default_connect_timeout() -> u64 { 1000 }
fn default_backend() -> StorageBackend { StorageBackend::Sqlite }
fn default_storage_url() -> String { "sqlite://cotacao.db".to_string() }
fn default_max_connections() -> u32 { 5 }
fn default_save_timeout() -> u64 { 10 }
fn default_client_url() -> String { "http://localhost:8080/cotacao".to_string() }
fn default_client_timeout() -> u64 { 300 }
fn default_output_path() -> String { "cotacao.txt".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: 0,
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: default_upstream_url(),
            pair_key: default_pair_key(),
            timeout_ms: default_upstream_timeout(),
            connect_timeout_ms: default_connect_timeout(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: default_storage_url(),
            max_connections: default_max_connections(),
            save_timeout_ms: default_save_timeout(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: default_client_url(),
            timeout_ms: default_client_timeout(),
            connect_timeout_ms: default_connect_timeout(),
            output_path: default_output_path(),
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl StorageConfig {
    pub fn save_timeout(&self) -> Duration {
        Duration::from_millis(self.save_timeout_ms)
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl AppConfig {
    /// 从 JSON 文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// 加载配置，优先从文件，失败则使用默认值
    pub fn load() -> Self {
        let config_paths = ["config.json", "config/config.json"];

        for path in config_paths {
            if Path::new(path).exists() {
                match Self::from_file(path) {
                    Ok(config) => {
                        log::info!("从 {} 加载配置成功", path);
                        return config;
                    }
                    Err(e) => {
                        log::warn!("加载配置文件 {} 失败: {}", path, e);
                    }
                }
            }
        }

        log::info!("使用默认配置");
        Self::default()
    }

    /// 校验配置
    ///
    /// 地址必须可解析，超时不能为 0，且保存超时必须小于获取超时
    pub fn validate(&self) -> Result<()> {
        for (name, raw) in [("upstream.url", &self.upstream.url), ("client.url", &self.client.url)] {
            url::Url::parse(raw)
                .map_err(|e| QuotationError::Config(format!("{} 无效 ({}): {}", name, raw, e)))?;
        }

        if self.upstream.timeout_ms == 0 || self.storage.save_timeout_ms == 0 || self.client.timeout_ms == 0 {
            return Err(QuotationError::Config("超时时间必须大于 0".to_string()));
        }

        if self.upstream.connect_timeout_ms == 0 || self.client.connect_timeout_ms == 0 {
            return Err(QuotationError::Config("连接超时必须大于 0".to_string()));
        }

        if self.storage.save_timeout_ms >= self.upstream.timeout_ms {
            return Err(QuotationError::Config(format!(
                "storage.save_timeout_ms ({}) 必须小于 upstream.timeout_ms ({})",
                self.storage.save_timeout_ms, self.upstream.timeout_ms
            )));
        }

        Ok(())
    }

    /// 获取服务器绑定地址
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeouts_keep_save_tighter_than_fetch() {
        let config = AppConfig::default();
        assert_eq!(config.upstream.timeout(), Duration::from_millis(200));
        assert_eq!(config.storage.save_timeout(), Duration::from_millis(10));
        assert_eq!(config.client.timeout(), Duration::from_millis(300));
        assert!(config.storage.save_timeout() < config.upstream.timeout());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: AppConfig = serde_json::from_str(
            r#"{"server": {"port": 9090}, "storage": {"backend": "memory"}}"#,
        )
        .unwrap();

        assert_eq!(config.bind_addr(), "0.0.0.0:9090");
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.save_timeout_ms, 10);
        assert_eq!(config.upstream.pair_key, "USDBRL");
        assert_eq!(config.client.output_path, "cotacao.txt");
    }

    #[test]
    fn test_client_connect_timeout_is_independent_of_upstream() {
        let config: AppConfig = serde_json::from_str(
            r#"{"upstream": {"connect_timeout_ms": 50}, "client": {"connect_timeout_ms": 2500}}"#,
        )
        .unwrap();

        assert_eq!(config.upstream.connect_timeout(), Duration::from_millis(50));
        assert_eq!(config.client.connect_timeout(), Duration::from_millis(2500));
        assert_eq!(AppConfig::default().client.connect_timeout(), Duration::from_millis(1000));
        assert!(config.validate().is_ok());

        let mut config = config;
        config.client.connect_timeout_ms = 0;
        assert!(matches!(config.validate(), Err(QuotationError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_save_timeout_not_below_fetch() {
        let mut config = AppConfig::default();
        config.storage.save_timeout_ms = 500;

        let err = config.validate().unwrap_err();
        assert!(matches!(err, QuotationError::Config(_)));
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut config = AppConfig::default();
        config.client.url = "not a url".to_string();

        assert!(matches!(config.validate(), Err(QuotationError::Config(_))));
    }
}
