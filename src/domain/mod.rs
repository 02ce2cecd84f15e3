//! Domain 模块
//!
//! 包含核心业务逻辑和领域模型

pub mod chain_config;
pub mod derivation;
pub mod mnemonic;
pub mod network;
pub mod transaction_status;
pub mod wallet;

// 重新导出常用类型
pub use chain_config::{AddressFormat, ChainConfig, ChainRegistry, ChainType, CurveType};
pub use derivation::{DerivationStrategy, DerivationStrategyFactory, DerivedKeypair, KeyDerivationEngine};
pub use mnemonic::{MnemonicEngine, Seed};
pub use network::NetworkEnvironment;
pub use transaction_status::{TransactionRecord, TransactionStatus};
pub use wallet::{ChainWallet, Wallet, WalletSecrets};
