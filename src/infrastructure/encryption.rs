//! AES-256-GCM 加密/解密模块
//! 软件密钥库用它实现"不可导出密钥"的加解密原语

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{WalletError, WalletResult};

const NONCE_LEN: usize = 12;

/// 加密数据
///
/// # Arguments
/// * `data` - 要加密的原始数据
/// * `key` - 32字节加密密钥
/// * `aad` - 附加认证数据（密钥别名），防止密文在别名之间互换
///
/// # Returns
/// 返回加密后的数据（nonce + ciphertext）
pub fn encrypt_data(data: &[u8], key: &EncryptionKey, aad: &[u8]) -> WalletResult<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.as_slice())
        .map_err(|e| WalletError::CryptoOperationFailed(format!("Invalid key: {}", e)))?;

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, Payload { msg: data, aad })
        .map_err(|e| WalletError::CryptoOperationFailed(format!("Encryption failed: {}", e)))?;

    // 将 nonce (12字节) 和 ciphertext 组合
    let mut result = nonce.to_vec();
    result.extend_from_slice(&ciphertext);

    Ok(result)
}

/// 解密数据
///
/// # Arguments
/// * `encrypted` - 加密的数据（nonce + ciphertext）
/// * `key` - 32字节加密密钥
/// * `aad` - 加密时使用的附加认证数据
///
/// # Returns
/// 返回解密后的原始数据，离开作用域自动清零
pub fn decrypt_data(
    encrypted: &[u8],
    key: &EncryptionKey,
    aad: &[u8],
) -> WalletResult<Zeroizing<Vec<u8>>> {
    if encrypted.len() < NONCE_LEN {
        return Err(WalletError::CryptoOperationFailed(
            "Encrypted data too short".to_string(),
        ));
    }

    let cipher = Aes256Gcm::new_from_slice(key.as_slice())
        .map_err(|e| WalletError::CryptoOperationFailed(format!("Invalid key: {}", e)))?;

    // 提取 nonce（前12字节）
    let nonce = Nonce::from_slice(&encrypted[..NONCE_LEN]);
    let ciphertext = &encrypted[NONCE_LEN..];

    let plaintext = cipher
        .decrypt(nonce, Payload { msg: ciphertext, aad })
        .map_err(|e| WalletError::CryptoOperationFailed(format!("Decryption failed: {}", e)))?;

    Ok(Zeroizing::new(plaintext))
}

/// 加密密钥（使用Zeroize保护）
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    key: [u8; 32],
}

impl EncryptionKey {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// 随机生成新密钥
    pub fn generate() -> Self {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        let generated = Self::new(key);
        key.zeroize();
        generated
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.key
    }
}
