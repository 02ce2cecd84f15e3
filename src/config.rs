//! 配置管理模块
//! 支持从环境变量和配置文件加载配置

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::chain_config::ChainRegistry;
use crate::infrastructure::biometric::BiometricGateConfig;
use crate::infrastructure::rpc_client::RpcSettings;

/// 应用配置结构体
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub fees: FeesConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
}

/// 本地存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_url: String,
    /// 偏好文件（保存 selected_network）
    pub preferences_path: String,
}

/// RPC 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub commitment: String,
    /// 端点覆盖，键为 `<chain>.<network>`
    #[serde(default)]
    pub endpoint_overrides: HashMap<String, String>,
}

/// Solana 手续费配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeesConfig {
    /// 每个签名的基础费（lamports）
    pub base_fee_lamports: u64,
    pub compute_unit_limit: u32,
    /// 计算单元价格（micro-lamports）
    pub compute_unit_price_micro_lamports: u64,
}

/// 安全配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// 生物识别凭据有效期
    pub auth_token_ttl_secs: u64,
    /// 单次 cipher 有效期
    pub cipher_ttl_secs: u64,
    /// 单次验证内允许的未识别次数
    #[serde(default = "default_max_not_recognized")]
    pub max_not_recognized: u32,
}

fn default_max_not_recognized() -> u32 {
    5
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: std::env::var("WALLET_DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://ironvault.db?mode=rwc".into()),
            preferences_path: std::env::var("WALLET_PREFERENCES_PATH")
                .unwrap_or_else(|_| "./ironvault_prefs.json".into()),
        }
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: env_or("RPC_TIMEOUT_SECS", 30),
            connect_timeout_secs: env_or("RPC_CONNECT_TIMEOUT_SECS", 10),
            commitment: std::env::var("RPC_COMMITMENT").unwrap_or_else(|_| "confirmed".into()),
            endpoint_overrides: HashMap::new(),
        }
    }
}

impl Default for FeesConfig {
    fn default() -> Self {
        Self {
            base_fee_lamports: env_or("BASE_FEE_LAMPORTS", 5_000),
            compute_unit_limit: env_or("COMPUTE_UNIT_LIMIT", 200_000),
            compute_unit_price_micro_lamports: env_or("COMPUTE_UNIT_PRICE", 250_000),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            auth_token_ttl_secs: 30,
            cipher_ttl_secs: 30,
            max_not_recognized: default_max_not_recognized(),
        }
    }
}

impl RpcConfig {
    pub fn settings(&self) -> RpcSettings {
        RpcSettings {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            commitment: self.commitment.clone(),
        }
    }
}

impl SecurityConfig {
    pub fn gate_config(&self) -> BiometricGateConfig {
        BiometricGateConfig {
            token_ttl: Duration::from_secs(self.auth_token_ttl_secs),
            max_not_recognized: self.max_not_recognized,
        }
    }

    pub fn cipher_ttl(&self) -> Duration {
        Duration::from_secs(self.cipher_ttl_secs)
    }
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            logging: LoggingConfig::default(),
            storage: StorageConfig::default(),
            rpc: RpcConfig::default(),
            fees: FeesConfig::default(),
            security: SecurityConfig::default(),
        })
    }

    /// 从配置文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// 从环境变量和配置文件合并加载（配置文件优先级更高）
    ///
    /// 文件中缺失的段落回落到环境变量默认值。
    pub fn from_env_and_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut config = Self::from_env()?;

        if let Some(path) = path {
            if path.as_ref().exists() {
                config = Self::from_file(path)?;
            }
        }

        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        // 验证日志级别
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("LOG_LEVEL must be one of: {:?}", valid_levels);
        }

        // 验证日志格式
        if self.logging.format != "json" && self.logging.format != "text" {
            anyhow::bail!("LOG_FORMAT must be 'json' or 'text'");
        }

        // 验证数据库URL格式
        if !self.storage.database_url.starts_with("sqlite:") {
            anyhow::bail!("WALLET_DATABASE_URL must start with sqlite:");
        }

        if self.rpc.request_timeout_secs == 0 || self.rpc.connect_timeout_secs == 0 {
            anyhow::bail!("RPC timeouts must be greater than zero");
        }

        if self.fees.compute_unit_limit == 0 {
            anyhow::bail!("COMPUTE_UNIT_LIMIT must be greater than zero");
        }

        if self.security.auth_token_ttl_secs == 0 || self.security.cipher_ttl_secs == 0 {
            anyhow::bail!("Security TTLs must be greater than zero");
        }

        // 覆盖键必须指向已知的链和网络
        ChainRegistry::with_overrides(&self.rpc.endpoint_overrides)
            .context("Invalid rpc.endpoint_overrides")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_config_from_env() {
        let config = Config::from_env().unwrap();
        assert_eq!(config.security.cipher_ttl_secs, 30);
        assert!(config.rpc.endpoint_overrides.is_empty());
    }

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[logging]
level = "debug"
format = "json"

[storage]
database_url = "sqlite::memory:"
preferences_path = "/tmp/prefs.json"

[rpc]
request_timeout_secs = 5
connect_timeout_secs = 2
commitment = "finalized"

[rpc.endpoint_overrides]
"solana.devnet" = "http://127.0.0.1:8899"

[fees]
base_fee_lamports = 5000
compute_unit_limit = 300000
compute_unit_price_micro_lamports = 1000

[security]
auth_token_ttl_secs = 15
cipher_ttl_secs = 10
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.fees.compute_unit_limit, 300_000);
        assert_eq!(config.rpc.commitment, "finalized");
        assert_eq!(config.security.max_not_recognized, 5);
        assert_eq!(
            config.rpc.endpoint_overrides.get("solana.devnet").map(String::as_str),
            Some("http://127.0.0.1:8899")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::from_file_str_for_tests();
        assert!(config.validate().is_ok());

        config.logging.format = "xml".into();
        assert!(config.validate().is_err());

        let mut config = Config::from_file_str_for_tests();
        config.storage.database_url = "postgres://localhost/db".into();
        assert!(config.validate().is_err());

        let mut config = Config::from_file_str_for_tests();
        config
            .rpc
            .endpoint_overrides
            .insert("dogecoin.mainnet".into(), "http://x".into());
        assert!(config.validate().is_err());
    }

    impl Config {
        /// 不依赖环境变量的基准配置
        fn from_file_str_for_tests() -> Self {
            toml::from_str(
                r#"
[logging]
level = "info"
format = "text"

[storage]
database_url = "sqlite::memory:"
preferences_path = "prefs.json"

[rpc]
request_timeout_secs = 30
connect_timeout_secs = 10
commitment = "confirmed"

[fees]
base_fee_lamports = 5000
compute_unit_limit = 200000
compute_unit_price_micro_lamports = 250000

[security]
auth_token_ttl_secs = 30
cipher_ttl_secs = 30
"#,
            )
            .unwrap()
        }
    }
}
