//! 多链配置模块
//!
//! 定义所有支持的区块链、各网络环境下的 RPC 端点及 HD 派生参数。
//! 注册表是显式构造的对象，通过构造函数注入到需要查链的组件中。

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::network::NetworkEnvironment;
use crate::error::{WalletError, WalletResult};

/// 链类型标签（ChainWallet 上持久化的值）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainType {
    Solana,
    Ethereum,
    Bitcoin,
}

impl ChainType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Solana => "solana",
            Self::Ethereum => "ethereum",
            Self::Bitcoin => "bitcoin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "solana" => Some(Self::Solana),
            "ethereum" => Some(Self::Ethereum),
            "bitcoin" => Some(Self::Bitcoin),
            _ => None,
        }
    }
}

impl fmt::Display for ChainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 加密曲线类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveType {
    /// secp256k1 曲线 (Bitcoin, Ethereum)
    Secp256k1,
    /// ed25519 曲线 (Solana)
    Ed25519,
}

/// 地址编码格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFormat {
    /// 十六进制 0x... (Ethereum 系列)
    Hex,
    /// Bech32 编码 (Bitcoin native segwit)
    Bech32,
    /// Base58 编码 (Solana)
    SolanaBase58,
}

/// HD 派生标准
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DerivationStandard {
    /// BIP44: m/44'/coin_type'/account'/0/0
    BIP44,
    /// BIP84: m/84'/coin_type'/account'/0/0 (native segwit)
    BIP84,
    /// SLIP-0010: m/44'/coin_type'/account'/0'，全部为硬化派生
    SLIP0010,
}

/// 各网络环境的 RPC 端点
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkEndpoints {
    pub mainnet: String,
    pub devnet: String,
    pub testnet: String,
}

impl NetworkEndpoints {
    pub fn for_network(&self, network: NetworkEnvironment) -> &str {
        match network {
            NetworkEnvironment::Mainnet => &self.mainnet,
            NetworkEnvironment::Devnet => &self.devnet,
            NetworkEnvironment::Testnet => &self.testnet,
        }
    }

    fn set(&mut self, network: NetworkEnvironment, url: String) {
        match network {
            NetworkEnvironment::Mainnet => self.mainnet = url,
            NetworkEnvironment::Devnet => self.devnet = url,
            NetworkEnvironment::Testnet => self.testnet = url,
        }
    }
}

/// 链配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// 规范标识（小写）
    pub id: String,
    /// 链名称
    pub name: String,
    pub chain_type: ChainType,
    /// 原生代币符号 (SOL, ETH, BTC)
    pub native_symbol: String,
    /// 原生代币精度（最小单位的小数位数）
    pub decimals: u32,
    pub curve_type: CurveType,
    pub address_format: AddressFormat,
    pub derivation_standard: DerivationStandard,
    /// SLIP-44 coin type (用于派生路径)
    pub coin_type: u32,
    pub endpoints: NetworkEndpoints,
    /// 区块浏览器根地址
    pub explorer_base_url: String,
    pub icon: String,
    /// 查找别名（小写）
    pub aliases: Vec<String>,
}

impl ChainConfig {
    /// 生成派生路径
    pub fn derivation_path(&self, account: u32) -> String {
        match self.derivation_standard {
            DerivationStandard::BIP44 => format!("m/44'/{}'/{}'/0/0", self.coin_type, account),
            DerivationStandard::BIP84 => format!("m/84'/{}'/{}'/0/0", self.coin_type, account),
            DerivationStandard::SLIP0010 => format!("m/44'/{}'/{}'/0'", self.coin_type, account),
        }
    }

    pub fn endpoint(&self, network: NetworkEnvironment) -> &str {
        self.endpoints.for_network(network)
    }

    /// 交易在区块浏览器中的链接
    pub fn explorer_tx_url(&self, signature: &str, network: NetworkEnvironment) -> String {
        let base = self.explorer_base_url.trim_end_matches('/');
        match (self.chain_type, network) {
            (ChainType::Solana, NetworkEnvironment::Mainnet) => format!("{}/tx/{}", base, signature),
            (ChainType::Solana, env) => format!("{}/tx/{}?cluster={}", base, signature, env),
            _ => format!("{}/tx/{}", base, signature),
        }
    }
}

/// 链配置注册表
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    configs: HashMap<String, ChainConfig>,
    /// 别名 / 符号 → 规范 id
    alias_map: HashMap<String, String>,
}

/// 查找键标准化：去空白 + 小写
fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

impl ChainRegistry {
    /// 空注册表
    pub fn empty() -> Self {
        Self {
            configs: HashMap::new(),
            alias_map: HashMap::new(),
        }
    }

    /// 创建预配置的注册表
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_default_chains();
        registry
    }

    /// 预配置注册表 + 配置文件中的端点覆盖
    ///
    /// 覆盖键格式: `<chain>.<network>`，例如 `solana.devnet`
    pub fn with_overrides(overrides: &HashMap<String, String>) -> WalletResult<Self> {
        let mut registry = Self::new();
        for (key, url) in overrides {
            let (chain, network) = key
                .split_once('.')
                .ok_or_else(|| WalletError::Config(format!("Invalid endpoint override key: {}", key)))?;
            let network = NetworkEnvironment::parse(network)
                .ok_or_else(|| WalletError::Config(format!("Unknown network in override: {}", key)))?;
            let id = registry.get_chain(chain)?.id.clone();
            if let Some(config) = registry.configs.get_mut(&id) {
                config.endpoints.set(network, url.clone());
            }
        }
        Ok(registry)
    }

    /// 注册默认支持的链
    fn register_default_chains(&mut self) {
        // Solana
        self.register(ChainConfig {
            id: "solana".to_string(),
            name: "Solana".to_string(),
            chain_type: ChainType::Solana,
            native_symbol: "SOL".to_string(),
            decimals: 9,
            curve_type: CurveType::Ed25519,
            address_format: AddressFormat::SolanaBase58,
            derivation_standard: DerivationStandard::SLIP0010,
            coin_type: 501,
            endpoints: NetworkEndpoints {
                mainnet: "https://api.mainnet-beta.solana.com".to_string(),
                devnet: "https://api.devnet.solana.com".to_string(),
                testnet: "https://api.testnet.solana.com".to_string(),
            },
            explorer_base_url: "https://explorer.solana.com".to_string(),
            icon: "ic_chain_solana".to_string(),
            aliases: vec!["sol".to_string()],
        });

        // Ethereum（devnet 映射到 Sepolia，testnet 映射到 Holesky）
        self.register(ChainConfig {
            id: "ethereum".to_string(),
            name: "Ethereum".to_string(),
            chain_type: ChainType::Ethereum,
            native_symbol: "ETH".to_string(),
            decimals: 18,
            curve_type: CurveType::Secp256k1,
            address_format: AddressFormat::Hex,
            derivation_standard: DerivationStandard::BIP44,
            coin_type: 60,
            endpoints: NetworkEndpoints {
                mainnet: "https://ethereum-rpc.publicnode.com".to_string(),
                devnet: "https://ethereum-sepolia-rpc.publicnode.com".to_string(),
                testnet: "https://ethereum-holesky-rpc.publicnode.com".to_string(),
            },
            explorer_base_url: "https://etherscan.io".to_string(),
            icon: "ic_chain_ethereum".to_string(),
            aliases: vec!["eth".to_string()],
        });

        // Bitcoin (BIP84 - native segwit)
        self.register(ChainConfig {
            id: "bitcoin".to_string(),
            name: "Bitcoin".to_string(),
            chain_type: ChainType::Bitcoin,
            native_symbol: "BTC".to_string(),
            decimals: 8,
            curve_type: CurveType::Secp256k1,
            address_format: AddressFormat::Bech32,
            derivation_standard: DerivationStandard::BIP84,
            coin_type: 0,
            endpoints: NetworkEndpoints {
                mainnet: "https://blockstream.info/api".to_string(),
                devnet: "https://mempool.space/signet/api".to_string(),
                testnet: "https://blockstream.info/testnet/api".to_string(),
            },
            explorer_base_url: "https://mempool.space".to_string(),
            icon: "ic_chain_bitcoin".to_string(),
            aliases: vec!["btc".to_string()],
        });
    }

    /// 注册链配置
    pub fn register(&mut self, config: ChainConfig) {
        let id = normalize_key(&config.id);

        self.alias_map
            .insert(normalize_key(&config.native_symbol), id.clone());
        self.alias_map
            .insert(config.chain_type.as_str().to_string(), id.clone());
        for alias in &config.aliases {
            self.alias_map.insert(normalize_key(alias), id.clone());
        }
        self.alias_map.insert(id.clone(), id.clone());
        self.configs.insert(id, config);
    }

    /// 通过 id / 符号 / 别名获取配置
    ///
    /// 找不到时返回 `UnknownChain`，不存在默认回退。
    pub fn get_chain(&self, chain: &str) -> WalletResult<&ChainConfig> {
        self.alias_map
            .get(&normalize_key(chain))
            .and_then(|id| self.configs.get(id))
            .ok_or_else(|| WalletError::UnknownChain(chain.to_string()))
    }

    /// 通过链类型获取配置（每种链类型必须恰好对应一个配置）
    pub fn get_by_type(&self, chain_type: ChainType) -> WalletResult<&ChainConfig> {
        let mut matches = self.configs.values().filter(|c| c.chain_type == chain_type);
        match (matches.next(), matches.next()) {
            (Some(config), None) => Ok(config),
            (None, _) => Err(WalletError::UnknownChain(chain_type.to_string())),
            (Some(_), Some(_)) => Err(WalletError::Config(format!(
                "Chain type {} resolves to more than one chain config",
                chain_type
            ))),
        }
    }

    /// 列出所有支持的链（按 id 排序，保证输出稳定）
    pub fn list_all(&self) -> Vec<&ChainConfig> {
        let mut all: Vec<&ChainConfig> = self.configs.values().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// 验证链配置完整性
    pub fn validate_configs(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        for config in self.configs.values() {
            if config.name.is_empty() {
                errors.push(format!("Chain {} has empty name", config.id));
            }
            if config.native_symbol.is_empty() {
                errors.push(format!("Chain {} has empty symbol", config.id));
            }
            for env in NetworkEnvironment::ALL {
                if !config.endpoint(env).starts_with("http") {
                    errors.push(format!("Chain {} has invalid {} endpoint", config.id, env));
                }
            }

            // 曲线类型、地址格式、派生标准必须互相匹配
            match (
                config.curve_type,
                config.address_format,
                config.derivation_standard,
            ) {
                (CurveType::Secp256k1, AddressFormat::Hex, DerivationStandard::BIP44) => {}
                (CurveType::Secp256k1, AddressFormat::Bech32, DerivationStandard::BIP84) => {}
                (CurveType::Ed25519, AddressFormat::SolanaBase58, DerivationStandard::SLIP0010) => {}
                (curve, format, standard) => errors.push(format!(
                    "Chain {} has incompatible curve/format/standard: {:?} / {:?} / {:?}",
                    config.id, curve, format, standard
                )),
            }

            if self
                .configs
                .values()
                .filter(|c| c.chain_type == config.chain_type)
                .count()
                != 1
            {
                errors.push(format!(
                    "Chain type {} is registered more than once",
                    config.chain_type
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Default for ChainRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests;
