//! 安全硬件管理器
//!
//! 每个钱包别名对应一把不可导出的对称密钥。进程其余部分只能拿到绑定密钥的
//! 单次 cipher，且 cipher 只能凭 [`AuthToken`] 创建。

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;
use zeroize::Zeroizing;

use crate::error::{WalletError, WalletResult};
use crate::infrastructure::biometric::AuthToken;
use crate::infrastructure::encryption::{decrypt_data, encrypt_data, EncryptionKey};

/// 硬件密钥句柄
///
/// `generation` 在密钥被重新创建时变化，旧句柄随之失效。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyHandle {
    pub alias: String,
    pub generation: u64,
}

/// 硬件密钥库接口
///
/// 实现方保证密钥字节永远不离开存储。
#[async_trait]
pub trait HardwareKeyStore: Send + Sync {
    /// 获取别名对应的密钥，不存在则创建
    async fn get_or_create_key(&self, alias: &str) -> WalletResult<KeyHandle>;

    async fn encrypt(&self, handle: &KeyHandle, plaintext: &[u8]) -> WalletResult<Vec<u8>>;

    async fn decrypt(
        &self,
        handle: &KeyHandle,
        ciphertext: &[u8],
    ) -> WalletResult<Zeroizing<Vec<u8>>>;

    async fn delete_key(&self, alias: &str) -> WalletResult<()>;
}

struct StoredKey {
    generation: u64,
    key: EncryptionKey,
}

/// 软件实现的密钥库（AES-256-GCM，密钥只在进程内存中）
///
/// 用于桌面/测试环境；`invalidate_all` 模拟生物识别录入变更导致的密钥失效。
pub struct SoftwareKeyStore {
    keys: RwLock<HashMap<String, StoredKey>>,
    next_generation: AtomicU64,
}

impl SoftwareKeyStore {
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
        }
    }

    /// 使所有密钥失效
    pub async fn invalidate_all(&self) {
        let mut keys = self.keys.write().await;
        tracing::warn!(count = keys.len(), "Invalidating all hardware-backed keys");
        keys.clear();
    }

    pub async fn contains(&self, alias: &str) -> bool {
        self.keys.read().await.contains_key(alias)
    }

    async fn with_key<T>(
        &self,
        handle: &KeyHandle,
        op: impl FnOnce(&EncryptionKey) -> WalletResult<T>,
    ) -> WalletResult<T> {
        let keys = self.keys.read().await;
        match keys.get(&handle.alias) {
            Some(stored) if stored.generation == handle.generation => op(&stored.key),
            _ => Err(WalletError::CryptoOperationFailed(format!(
                "Key for alias {} has been invalidated",
                handle.alias
            ))),
        }
    }
}

impl Default for SoftwareKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HardwareKeyStore for SoftwareKeyStore {
    async fn get_or_create_key(&self, alias: &str) -> WalletResult<KeyHandle> {
        let mut keys = self.keys.write().await;
        let stored = keys.entry(alias.to_string()).or_insert_with(|| {
            tracing::debug!(alias, "Creating hardware-backed key");
            StoredKey {
                generation: self.next_generation.fetch_add(1, Ordering::Relaxed),
                key: EncryptionKey::generate(),
            }
        });

        Ok(KeyHandle {
            alias: alias.to_string(),
            generation: stored.generation,
        })
    }

    async fn encrypt(&self, handle: &KeyHandle, plaintext: &[u8]) -> WalletResult<Vec<u8>> {
        self.with_key(handle, |key| {
            encrypt_data(plaintext, key, handle.alias.as_bytes())
        })
        .await
    }

    async fn decrypt(
        &self,
        handle: &KeyHandle,
        ciphertext: &[u8],
    ) -> WalletResult<Zeroizing<Vec<u8>>> {
        self.with_key(handle, |key| {
            decrypt_data(ciphertext, key, handle.alias.as_bytes())
        })
        .await
    }

    async fn delete_key(&self, alias: &str) -> WalletResult<()> {
        self.keys.write().await.remove(alias);
        Ok(())
    }
}

/// 单次加密 cipher
pub struct EncryptCipher {
    handle: KeyHandle,
    expires_at: Instant,
}

/// 单次解密 cipher
pub struct DecryptCipher {
    handle: KeyHandle,
    expires_at: Instant,
}

impl fmt::Debug for EncryptCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptCipher")
            .field("alias", &self.handle.alias)
            .finish()
    }
}

impl fmt::Debug for DecryptCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptCipher")
            .field("alias", &self.handle.alias)
            .finish()
    }
}

fn ensure_not_expired(expires_at: Instant, alias: &str) -> WalletResult<()> {
    if Instant::now() > expires_at {
        return Err(WalletError::CryptoOperationFailed(format!(
            "Cipher for alias {} has expired",
            alias
        )));
    }
    Ok(())
}

/// 安全硬件管理器
pub struct SecureEnclaveManager {
    store: Arc<dyn HardwareKeyStore>,
    cipher_ttl: Duration,
}

impl SecureEnclaveManager {
    pub fn new(store: Arc<dyn HardwareKeyStore>, cipher_ttl: Duration) -> Self {
        Self { store, cipher_ttl }
    }

    async fn authorize(&self, alias: &str, token: &AuthToken) -> WalletResult<(KeyHandle, Instant)> {
        if token.is_expired() {
            return Err(WalletError::CryptoOperationFailed(
                "Authentication has expired, authenticate again".to_string(),
            ));
        }
        let handle = self.store.get_or_create_key(alias).await?;
        Ok((handle, Instant::now() + self.cipher_ttl))
    }

    /// 创建加密 cipher（必须持有刚完成的验证凭据）
    pub async fn create_encrypt_cipher(
        &self,
        alias: &str,
        token: &AuthToken,
    ) -> WalletResult<EncryptCipher> {
        let (handle, expires_at) = self.authorize(alias, token).await?;
        tracing::debug!(alias, attempt_id = token.attempt_id(), "Encrypt cipher created");
        Ok(EncryptCipher { handle, expires_at })
    }

    /// 创建解密 cipher（必须持有刚完成的验证凭据）
    pub async fn create_decrypt_cipher(
        &self,
        alias: &str,
        token: &AuthToken,
    ) -> WalletResult<DecryptCipher> {
        let (handle, expires_at) = self.authorize(alias, token).await?;
        tracing::debug!(alias, attempt_id = token.attempt_id(), "Decrypt cipher created");
        Ok(DecryptCipher { handle, expires_at })
    }

    /// 用 cipher 加密一份秘密，cipher 随之消耗
    pub async fn encrypt_seed_with_cipher(
        &self,
        cipher: EncryptCipher,
        plaintext: &[u8],
    ) -> WalletResult<Vec<u8>> {
        ensure_not_expired(cipher.expires_at, &cipher.handle.alias)?;
        self.store.encrypt(&cipher.handle, plaintext).await
    }

    /// 用 cipher 解密一份秘密，cipher 随之消耗
    pub async fn decrypt_with_cipher(
        &self,
        cipher: DecryptCipher,
        ciphertext: &[u8],
    ) -> WalletResult<Zeroizing<Vec<u8>>> {
        ensure_not_expired(cipher.expires_at, &cipher.handle.alias)?;
        self.store.decrypt(&cipher.handle, ciphertext).await
    }

    /// 删除钱包时移除对应密钥
    pub async fn delete_key(&self, alias: &str) -> WalletResult<()> {
        self.store.delete_key(alias).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> AuthToken {
        AuthToken::for_tests(Duration::from_secs(30))
    }

    #[tokio::test]
    async fn test_encrypt_then_decrypt() {
        let store = Arc::new(SoftwareKeyStore::new());
        let manager = SecureEnclaveManager::new(store.clone(), Duration::from_secs(30));
        let token = token();

        let cipher = manager.create_encrypt_cipher("w1", &token).await.unwrap();
        let ciphertext = manager
            .encrypt_seed_with_cipher(cipher, b"seed bytes")
            .await
            .unwrap();
        assert!(store.contains("w1").await);

        let cipher = manager.create_decrypt_cipher("w1", &token).await.unwrap();
        let plaintext = manager
            .decrypt_with_cipher(cipher, &ciphertext)
            .await
            .unwrap();
        assert_eq!(plaintext.as_slice(), b"seed bytes");
    }

    #[tokio::test]
    async fn test_ciphertext_bound_to_alias() {
        let manager = SecureEnclaveManager::new(
            Arc::new(SoftwareKeyStore::new()),
            Duration::from_secs(30),
        );
        let token = token();

        let cipher = manager.create_encrypt_cipher("w1", &token).await.unwrap();
        let ciphertext = manager.encrypt_seed_with_cipher(cipher, b"x").await.unwrap();

        let cipher = manager.create_decrypt_cipher("w2", &token).await.unwrap();
        assert!(matches!(
            manager.decrypt_with_cipher(cipher, &ciphertext).await,
            Err(WalletError::CryptoOperationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_invalidated_key_fails() {
        let store = Arc::new(SoftwareKeyStore::new());
        let manager = SecureEnclaveManager::new(store.clone(), Duration::from_secs(30));
        let token = token();

        let cipher = manager.create_encrypt_cipher("w1", &token).await.unwrap();
        let ciphertext = manager.encrypt_seed_with_cipher(cipher, b"x").await.unwrap();

        // 解密 cipher 先创建，然后录入变更
        let stale = manager.create_decrypt_cipher("w1", &token).await.unwrap();
        store.invalidate_all().await;
        assert!(matches!(
            manager.decrypt_with_cipher(stale, &ciphertext).await,
            Err(WalletError::CryptoOperationFailed(_))
        ));

        // 新密钥无法解开旧密文
        let fresh = manager.create_decrypt_cipher("w1", &token).await.unwrap();
        assert!(manager.decrypt_with_cipher(fresh, &ciphertext).await.is_err());
    }

    #[tokio::test]
    async fn test_expired_cipher_and_token() {
        let manager = SecureEnclaveManager::new(
            Arc::new(SoftwareKeyStore::new()),
            Duration::from_millis(0),
        );
        let token = token();

        let cipher = manager.create_encrypt_cipher("w1", &token).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(matches!(
            manager.encrypt_seed_with_cipher(cipher, b"x").await,
            Err(WalletError::CryptoOperationFailed(_))
        ));

        let expired = AuthToken::for_tests(Duration::from_secs(0));
        std::thread::sleep(Duration::from_millis(2));
        assert!(manager.create_decrypt_cipher("w1", &expired).await.is_err());
    }
}
