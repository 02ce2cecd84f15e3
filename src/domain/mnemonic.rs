//! 助记词引擎
//!
//! BIP39 英文词表：生成、校验助记词，并派生 64 字节种子。

use std::fmt;

use bip39::{Language, Mnemonic};
use rand::RngCore;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{WalletError, WalletResult};

/// BIP39 种子长度
pub const SEED_LEN: usize = 64;

/// 允许的助记词长度
const ALLOWED_WORD_COUNTS: [usize; 2] = [12, 24];

/// 派生出的原始种子，离开作用域时自动清零
#[derive(Clone)]
pub struct Seed(Zeroizing<[u8; SEED_LEN]>);

impl Seed {
    pub fn new(bytes: [u8; SEED_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// 从解密后的字节恢复种子
    ///
    /// 长度不符说明密文被篡改或属于其他数据，按加密操作失败处理。
    pub fn from_slice(bytes: &[u8]) -> WalletResult<Self> {
        if bytes.len() != SEED_LEN {
            return Err(WalletError::CryptoOperationFailed(format!(
                "Decrypted seed has invalid length: {}",
                bytes.len()
            )));
        }
        let mut buf = [0u8; SEED_LEN];
        buf.copy_from_slice(bytes);
        let seed = Self::new(buf);
        buf.zeroize();
        Ok(seed)
    }

    pub fn as_bytes(&self) -> &[u8; SEED_LEN] {
        &self.0
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Seed(<redacted>)")
    }
}

/// 助记词引擎
pub struct MnemonicEngine;

impl MnemonicEngine {
    /// 生成 12 个单词的随机助记词（128 位熵）
    pub fn generate() -> Zeroizing<String> {
        let mut entropy = Zeroizing::new([0u8; 16]);
        rand::thread_rng().fill_bytes(&mut entropy[..]);

        // 16 字节熵总是合法输入
        let phrase = Mnemonic::from_entropy_in(Language::English, &entropy[..])
            .map(|m| m.to_string())
            .unwrap_or_default();
        Zeroizing::new(phrase)
    }

    /// 校验词数（12/24）及词表/校验和，格式错误返回 false 而不是报错
    pub fn validate_phrase(phrase: &str) -> bool {
        let word_count = phrase.split_whitespace().count();
        if !ALLOWED_WORD_COUNTS.contains(&word_count) {
            return false;
        }
        Mnemonic::parse_in(Language::English, Self::normalize(phrase).as_str()).is_ok()
    }

    /// 确定性派生种子：相同助记词 + 口令总是得到相同字节
    pub fn derive(phrase: &str, passphrase: &str) -> WalletResult<Seed> {
        if !Self::validate_phrase(phrase) {
            return Err(WalletError::InvalidMnemonic);
        }
        let mnemonic = Mnemonic::parse_in(Language::English, Self::normalize(phrase).as_str())
            .map_err(|_| WalletError::InvalidMnemonic)?;
        Ok(Seed::new(mnemonic.to_seed(passphrase)))
    }

    /// 统一空白与大小写
    fn normalize(phrase: &str) -> Zeroizing<String> {
        Zeroizing::new(
            phrase
                .split_whitespace()
                .map(|w| w.to_lowercase())
                .collect::<Vec<_>>()
                .join(" "),
        )
    }
}
