//! 地址验证模块
//!
//! 统一的链地址格式校验，在任何资金操作开始前拒绝格式错误的收款地址。

use bitcoin::address::{Address, NetworkUnchecked};
use bitcoin::Network;

use crate::domain::chain_config::ChainType;

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// 地址验证器
pub struct AddressValidator;

impl AddressValidator {
    /// 验证地址格式，无效时返回 false
    pub fn validate(chain_type: ChainType, address: &str) -> bool {
        match chain_type {
            ChainType::Solana => Self::validate_solana_address(address),
            ChainType::Ethereum => Self::validate_evm_address(address),
            ChainType::Bitcoin => Self::validate_bitcoin_address(address),
        }
    }

    /// 验证Solana地址（Base58编码，32字节）
    fn validate_solana_address(address: &str) -> bool {
        // 典型长度：32-44个字符
        if address.len() < 32 || address.len() > 44 {
            return false;
        }

        if !address.chars().all(|c| BASE58_ALPHABET.contains(c)) {
            return false;
        }

        match bs58::decode(address).into_vec() {
            Ok(decoded) => decoded.len() == 32,
            Err(_) => false,
        }
    }

    /// 验证EVM地址（支持EIP-55 Checksum）
    fn validate_evm_address(address: &str) -> bool {
        let Some(hex_part) = address.strip_prefix("0x") else {
            return false;
        };

        if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return false;
        }

        // 全小写或全大写不带校验信息；混合大小写必须满足 EIP-55
        let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper {
            return Self::verify_eip55_checksum(hex_part);
        }

        true
    }

    /// 验证EIP-55 Checksum
    /// https://eips.ethereum.org/EIPS/eip-55
    fn verify_eip55_checksum(hex_part: &str) -> bool {
        use sha3::{Digest, Keccak256};

        let hash = Keccak256::digest(hex_part.to_lowercase().as_bytes());

        hex_part.chars().enumerate().all(|(i, ch)| {
            if !ch.is_ascii_alphabetic() {
                return true;
            }
            let hash_byte = hash[i / 2];
            let nibble = if i % 2 == 0 {
                hash_byte >> 4
            } else {
                hash_byte & 0x0f
            };
            ch.is_ascii_uppercase() == (nibble >= 8)
        })
    }

    /// 验证Bitcoin地址（主网或测试网/signet，含校验和）
    fn validate_bitcoin_address(address: &str) -> bool {
        match address.parse::<Address<NetworkUnchecked>>() {
            Ok(parsed) => {
                parsed.is_valid_for_network(Network::Bitcoin)
                    || parsed.is_valid_for_network(Network::Testnet)
                    || parsed.is_valid_for_network(Network::Signet)
            }
            Err(_) => false,
        }
    }
}

/// EIP-55 校验和编码
pub fn to_eip55_checksum(address_bytes: &[u8]) -> String {
    use sha3::{Digest, Keccak256};

    let lower = hex::encode(address_bytes);
    let hash = Keccak256::digest(lower.as_bytes());

    let checksummed: String = lower
        .chars()
        .enumerate()
        .map(|(i, ch)| {
            let nibble = if i % 2 == 0 {
                hash[i / 2] >> 4
            } else {
                hash[i / 2] & 0x0f
            };
            if ch.is_ascii_alphabetic() && nibble >= 8 {
                ch.to_ascii_uppercase()
            } else {
                ch
            }
        })
        .collect();

    format!("0x{}", checksummed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solana_addresses() {
        assert!(AddressValidator::validate(
            ChainType::Solana,
            "11111111111111111111111111111111"
        ));
        assert!(AddressValidator::validate(
            ChainType::Solana,
            "So11111111111111111111111111111111111111112"
        ));
        // 非 base58 字符
        assert!(!AddressValidator::validate(
            ChainType::Solana,
            "0OIl111111111111111111111111111111"
        ));
        assert!(!AddressValidator::validate(ChainType::Solana, "short"));
        assert!(!AddressValidator::validate(ChainType::Solana, ""));
    }

    #[test]
    fn test_evm_addresses() {
        assert!(AddressValidator::validate(
            ChainType::Ethereum,
            "0x9858EfFD232B4033E47d90003D41EC34EcaEda94"
        ));
        assert!(AddressValidator::validate(
            ChainType::Ethereum,
            "0x9858effd232b4033e47d90003d41ec34ecaeda94"
        ));
        // 错误的大小写校验
        assert!(!AddressValidator::validate(
            ChainType::Ethereum,
            "0x9858efFD232B4033E47d90003D41EC34EcaEda94"
        ));
        assert!(!AddressValidator::validate(ChainType::Ethereum, "0x1234"));
    }

    #[test]
    fn test_bitcoin_addresses() {
        assert!(AddressValidator::validate(
            ChainType::Bitcoin,
            "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu"
        ));
        assert!(!AddressValidator::validate(
            ChainType::Bitcoin,
            "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyv"
        ));
        assert!(!AddressValidator::validate(
            ChainType::Bitcoin,
            "0x9858EfFD232B4033E47d90003D41EC34EcaEda94"
        ));
    }

    #[test]
    fn test_eip55_encoding() {
        let bytes = hex::decode("9858effd232b4033e47d90003d41ec34ecaeda94").unwrap();
        assert_eq!(
            to_eip55_checksum(&bytes),
            "0x9858EfFD232B4033E47d90003D41EC34EcaEda94"
        );
    }
}
