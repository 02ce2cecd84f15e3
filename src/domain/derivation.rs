//! 钱包派生策略
//!
//! 为不同的加密曲线提供统一的密钥派生接口。
//! 相同的 (seed, coin_type, account) 必须总是得到相同的密钥对，钱包恢复依赖这一点。

use std::fmt;

use ed25519_dalek::Signer;
use hmac::{Hmac, Mac};
use sha2::Sha512;
use zeroize::{Zeroize, Zeroizing};

use crate::domain::chain_config::{AddressFormat, ChainConfig, ChainType, CurveType};
use crate::domain::mnemonic::Seed;
use crate::error::{WalletError, WalletResult};
use crate::utils::address_validator::{to_eip55_checksum, AddressValidator};

type HmacSha512 = Hmac<Sha512>;

/// BIP32 硬化索引起点；账户序号必须小于它
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// 派生结果
///
/// 私钥只在签名调用栈内存在，离开作用域自动清零。
pub struct DerivedKeypair {
    private_key: Zeroizing<[u8; 32]>,
    /// 公钥 (Solana 为 32 字节；secp256k1 为压缩/未压缩编码)
    pub public_key: Vec<u8>,
    pub address: String,
    pub chain_type: ChainType,
    pub derivation_path: String,
}

impl DerivedKeypair {
    pub fn curve(&self) -> CurveType {
        match self.chain_type {
            ChainType::Solana => CurveType::Ed25519,
            ChainType::Ethereum | ChainType::Bitcoin => CurveType::Secp256k1,
        }
    }

    /// Ed25519 签名（Solana 交易消息）
    pub fn sign_ed25519(&self, message: &[u8]) -> WalletResult<[u8; 64]> {
        if self.curve() != CurveType::Ed25519 {
            return Err(WalletError::ChainNotSupported(format!(
                "ed25519 signing requested for {}",
                self.chain_type
            )));
        }
        let signing_key = ed25519_dalek::SigningKey::from_bytes(&self.private_key);
        Ok(signing_key.sign(message).to_bytes())
    }
}

impl fmt::Debug for DerivedKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKeypair")
            .field("address", &self.address)
            .field("chain_type", &self.chain_type)
            .field("derivation_path", &self.derivation_path)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// 钱包派生策略 trait
pub trait DerivationStrategy: Send + Sync {
    fn derive_keypair(
        &self,
        seed: &Seed,
        chain_config: &ChainConfig,
        account: u32,
    ) -> WalletResult<DerivedKeypair>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Ed25519 策略 (Solana, SLIP-0010)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Ed25519Strategy;

impl Ed25519Strategy {
    /// SLIP-0010 master key seed constant
    const MASTER_SECRET: &'static [u8] = b"ed25519 seed";

    /// 解析全硬化路径，例如 m/44'/501'/0'/0'
    fn parse_hardened_path(path: &str) -> WalletResult<Vec<u32>> {
        let mut parts = path.split('/');
        if parts.next() != Some("m") {
            return Err(WalletError::CryptoOperationFailed(format!(
                "Invalid derivation path: {}",
                path
            )));
        }

        parts
            .map(|segment| {
                segment
                    .strip_suffix('\'')
                    .and_then(|index| index.parse::<u32>().ok())
                    .filter(|index| *index < HARDENED_OFFSET)
                    .ok_or_else(|| {
                        // ed25519 只支持硬化派生
                        WalletError::CryptoOperationFailed(format!(
                            "Non-hardened segment '{}' in ed25519 path {}",
                            segment, path
                        ))
                    })
            })
            .collect()
    }

    /// I = HMAC-SHA512(key, data)，拆分为 (IL, IR)
    fn hmac_split(key: &[u8], parts: &[&[u8]]) -> WalletResult<([u8; 32], [u8; 32])> {
        let mut mac = HmacSha512::new_from_slice(key).map_err(|e| {
            WalletError::CryptoOperationFailed(format!("HMAC init failed: {}", e))
        })?;
        for part in parts {
            mac.update(part);
        }
        let mut buf = [0u8; 64];
        buf.copy_from_slice(&mac.finalize().into_bytes());

        let mut left = [0u8; 32];
        let mut right = [0u8; 32];
        left.copy_from_slice(&buf[..32]);
        right.copy_from_slice(&buf[32..]);
        buf.zeroize();

        Ok((left, right))
    }

    /// 按 SLIP-0010 派生 32 字节私钥
    pub fn derive_private_key(seed: &[u8], path: &str) -> WalletResult<Zeroizing<[u8; 32]>> {
        let indices = Self::parse_hardened_path(path)?;

        let (mut key, mut chain_code) = Self::hmac_split(Self::MASTER_SECRET, &[seed])?;

        for index in indices {
            // Data = 0x00 || parent_key || ser32(index + 2^31)
            let hardened = (index | HARDENED_OFFSET).to_be_bytes();
            let (child_key, child_chain) =
                Self::hmac_split(&chain_code, &[&[0x00], &key, &hardened])?;
            key.zeroize();
            chain_code.zeroize();
            key = child_key;
            chain_code = child_chain;
        }
        chain_code.zeroize();

        let result = Zeroizing::new(key);
        key.zeroize();
        Ok(result)
    }
}

impl DerivationStrategy for Ed25519Strategy {
    fn derive_keypair(
        &self,
        seed: &Seed,
        chain_config: &ChainConfig,
        account: u32,
    ) -> WalletResult<DerivedKeypair> {
        let path = chain_config.derivation_path(account);
        let private_key = Self::derive_private_key(seed.as_bytes(), &path)?;

        let signing_key = ed25519_dalek::SigningKey::from_bytes(&private_key);
        let public_key = signing_key.verifying_key().to_bytes();

        // Solana 地址就是公钥的 Base58 编码
        let address = match chain_config.address_format {
            AddressFormat::SolanaBase58 => bs58::encode(public_key).into_string(),
            other => {
                return Err(WalletError::ChainNotSupported(format!(
                    "Unsupported address format for ed25519: {:?}",
                    other
                )))
            }
        };

        Ok(DerivedKeypair {
            private_key,
            public_key: public_key.to_vec(),
            address,
            chain_type: chain_config.chain_type,
            derivation_path: path,
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Secp256k1 策略 (Ethereum, Bitcoin, BIP32)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Secp256k1Strategy;

impl Secp256k1Strategy {
    fn derive_signing_key(seed: &[u8], path: &str) -> WalletResult<k256::ecdsa::SigningKey> {
        use coins_bip32::path::DerivationPath;
        use coins_bip32::prelude::*;

        let derivation_path = path.parse::<DerivationPath>().map_err(|e| {
            WalletError::CryptoOperationFailed(format!("Invalid derivation path: {}", e))
        })?;

        let master_key = XPriv::root_from_seed(seed, None).map_err(|e| {
            WalletError::CryptoOperationFailed(format!("Failed to derive master key: {}", e))
        })?;

        let derived_key = master_key.derive_path(&derivation_path).map_err(|e| {
            WalletError::CryptoOperationFailed(format!("Failed to derive key: {}", e))
        })?;

        // XPriv 实现 AsRef<SigningKey>
        let signing_key: &k256::ecdsa::SigningKey = derived_key.as_ref();
        Ok(signing_key.clone())
    }

    /// Ethereum 地址：Keccak256(未压缩公钥[1..]) 的后 20 字节，EIP-55 编码
    fn ethereum_address(signing_key: &k256::ecdsa::SigningKey) -> (Vec<u8>, String) {
        use sha3::{Digest, Keccak256};

        let encoded = signing_key.verifying_key().to_encoded_point(false);
        let public_key = &encoded.as_bytes()[1..];
        let hash = Keccak256::digest(public_key);

        (public_key.to_vec(), to_eip55_checksum(&hash[12..]))
    }

    /// Bitcoin P2WPKH (bc1q...) 地址
    fn bitcoin_address(signing_key: &k256::ecdsa::SigningKey) -> WalletResult<(Vec<u8>, String)> {
        use bitcoin::{
            secp256k1::PublicKey as Secp256k1PublicKey, Address, Network,
            PublicKey as BitcoinPublicKey,
        };

        let compressed = signing_key.verifying_key().to_encoded_point(true);
        let secp_pubkey = Secp256k1PublicKey::from_slice(compressed.as_bytes()).map_err(|e| {
            WalletError::CryptoOperationFailed(format!("Invalid secp256k1 public key: {}", e))
        })?;

        let address = Address::p2wpkh(&BitcoinPublicKey::new(secp_pubkey), Network::Bitcoin)
            .map_err(|e| {
                WalletError::CryptoOperationFailed(format!(
                    "Failed to create P2WPKH address: {}",
                    e
                ))
            })?
            .to_string();

        Ok((compressed.as_bytes().to_vec(), address))
    }
}

impl DerivationStrategy for Secp256k1Strategy {
    fn derive_keypair(
        &self,
        seed: &Seed,
        chain_config: &ChainConfig,
        account: u32,
    ) -> WalletResult<DerivedKeypair> {
        let path = chain_config.derivation_path(account);
        let signing_key = Self::derive_signing_key(seed.as_bytes(), &path)?;

        let (public_key, address) = match chain_config.address_format {
            AddressFormat::Hex => Self::ethereum_address(&signing_key),
            AddressFormat::Bech32 => Self::bitcoin_address(&signing_key)?,
            other => {
                return Err(WalletError::ChainNotSupported(format!(
                    "Unsupported address format for secp256k1: {:?}",
                    other
                )))
            }
        };

        let mut private_key = Zeroizing::new([0u8; 32]);
        private_key.copy_from_slice(&signing_key.to_bytes());

        Ok(DerivedKeypair {
            private_key,
            public_key,
            address,
            chain_type: chain_config.chain_type,
            derivation_path: path,
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 派生引擎
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 策略工厂
pub struct DerivationStrategyFactory;

impl DerivationStrategyFactory {
    pub fn create_strategy(curve_type: CurveType) -> Box<dyn DerivationStrategy> {
        match curve_type {
            CurveType::Secp256k1 => Box::new(Secp256k1Strategy),
            CurveType::Ed25519 => Box::new(Ed25519Strategy),
        }
    }
}

/// 密钥派生引擎
pub struct KeyDerivationEngine;

impl KeyDerivationEngine {
    /// 按链的 coin type 与账户索引派生签名密钥对
    pub fn derive_keypair(
        seed: &Seed,
        chain_config: &ChainConfig,
        account: u32,
    ) -> WalletResult<DerivedKeypair> {
        DerivationStrategyFactory::create_strategy(chain_config.curve_type).derive_keypair(
            seed,
            chain_config,
            account,
        )
    }

    /// 链相关的地址格式校验
    pub fn is_valid_address(chain_type: ChainType, address: &str) -> bool {
        AddressValidator::validate(chain_type, address)
    }
}
