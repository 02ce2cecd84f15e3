//! IronVault - 多链钱包密钥托管与交易签名核心
//!
//! 助记词和种子只以硬件密钥加密后的密文落盘；每次解密都需要一次新的生物识别验证。

pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod repository;
pub mod service;
pub mod utils;

// 重新导出常用类型
pub use app_state::{AppState, PlatformServices};
pub use error::{WalletError, WalletResult};

pub mod prelude {
    pub use crate::{
        app_state::{AppState, PlatformServices},
        domain::{ChainConfig, ChainRegistry, ChainType, NetworkEnvironment, TransactionRecord, Wallet},
        error::{WalletError, WalletResult},
        infrastructure::biometric::{BiometricPlatform, PromptContext},
        service::{SendRequest, TransactionOrchestrator, WalletService},
    };
}
