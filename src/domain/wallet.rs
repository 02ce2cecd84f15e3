//! 钱包领域模型
//!
//! 领域实体只包含公开信息；私密材料以两个不透明密文的形式与之并存。

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::chain_config::ChainType;

/// 钱包
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: String,
    pub name: String,
    /// 派生路径中的账户索引
    pub account_index: u32,
    pub created_at: DateTime<Utc>,
    /// 全库同一时刻只有一个活跃钱包
    pub is_active: bool,
    pub chains: Vec<ChainWallet>,
}

impl Wallet {
    /// 硬件密钥别名（每个钱包一把）
    pub fn key_alias(&self) -> String {
        key_alias_for(&self.id)
    }

    /// 当前活跃链；首次使用前可能为空
    pub fn active_chain(&self) -> Option<&ChainWallet> {
        self.chains.iter().find(|c| c.is_active)
    }

    pub fn chain(&self, chain_id: &str) -> Option<&ChainWallet> {
        self.chains.iter().find(|c| c.chain_id == chain_id)
    }

    /// 活跃链数量不超过一个
    pub fn has_consistent_active_chain(&self) -> bool {
        self.chains.iter().filter(|c| c.is_active).count() <= 1
    }
}

pub fn key_alias_for(wallet_id: &str) -> String {
    format!("ironvault_wallet_{}", wallet_id)
}

/// 钱包在某条链上的账户
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainWallet {
    /// 注册表中的规范链 id
    pub chain_id: String,
    pub chain_type: ChainType,
    pub address: String,
    /// 公钥（hex）
    pub public_key: String,
    pub derivation_path: String,
    /// 最近一次查询到的余额（最小单位）
    pub balance: u64,
    pub is_active: bool,
}

/// 持久化的密文
///
/// 只由仓储层读写，由安全硬件管理器的单次 cipher 产生和解开。
#[derive(Clone, PartialEq, Eq)]
pub struct WalletSecrets {
    pub encrypted_seed: Vec<u8>,
    pub encrypted_mnemonic: Vec<u8>,
}

impl fmt::Debug for WalletSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletSecrets")
            .field("encrypted_seed", &format_args!("<{} bytes>", self.encrypted_seed.len()))
            .field(
                "encrypted_mnemonic",
                &format_args!("<{} bytes>", self.encrypted_mnemonic.len()),
            )
            .finish()
    }
}
