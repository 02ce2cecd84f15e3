//! 钱包服务
//!
//! 创建 / 导入 / 切换 / 删除钱包，选择活跃链，刷新余额，查看助记词。
//! 种子和助记词只在生物识别验证后的续延中加密或解密。

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::domain::chain_config::ChainRegistry;
use crate::domain::derivation::{KeyDerivationEngine, HARDENED_OFFSET};
use crate::domain::mnemonic::{MnemonicEngine, Seed};
use crate::domain::wallet::{key_alias_for, ChainWallet, Wallet, WalletSecrets};
use crate::error::{WalletError, WalletResult};
use crate::infrastructure::biometric::{BiometricGate, PromptConfig, PromptContext};
use crate::infrastructure::log_redact::redact_address;
use crate::infrastructure::rpc_client::RpcClientFactory;
use crate::infrastructure::secure_enclave::SecureEnclaveManager;
use crate::repository::WalletRepository;

/// 新建钱包的结果（助记词只用于展示备份）
pub struct CreatedWallet {
    pub wallet: Wallet,
    pub mnemonic: Zeroizing<String>,
}

impl fmt::Debug for CreatedWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreatedWallet")
            .field("wallet", &self.wallet)
            .field("mnemonic", &"<redacted>")
            .finish()
    }
}

/// 在任何验证提示之前检查名称和账户序号，返回去掉首尾空白的名称
fn validate_new_wallet(name: &str, account_index: u32) -> WalletResult<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(WalletError::InvalidInput(
            "Wallet name must not be empty".to_string(),
        ));
    }
    if account_index >= HARDENED_OFFSET {
        return Err(WalletError::InvalidInput(format!(
            "Account index {} must be below {}",
            account_index, HARDENED_OFFSET
        )));
    }
    Ok(name)
}

pub struct WalletService {
    registry: Arc<ChainRegistry>,
    wallets: Arc<dyn WalletRepository>,
    rpc_factory: Arc<dyn RpcClientFactory>,
    gate: Arc<BiometricGate>,
    enclave: Arc<SecureEnclaveManager>,
}

impl WalletService {
    pub fn new(
        registry: Arc<ChainRegistry>,
        wallets: Arc<dyn WalletRepository>,
        rpc_factory: Arc<dyn RpcClientFactory>,
        gate: Arc<BiometricGate>,
        enclave: Arc<SecureEnclaveManager>,
    ) -> Self {
        Self {
            registry,
            wallets,
            rpc_factory,
            gate,
            enclave,
        }
    }

    /// 生成新助记词并创建钱包
    pub async fn create_wallet(
        &self,
        name: &str,
        account_index: u32,
        context: &PromptContext,
    ) -> WalletResult<CreatedWallet> {
        let name = validate_new_wallet(name, account_index)?;
        let mnemonic = MnemonicEngine::generate();
        let wallet = self
            .persist_new_wallet(name, &mnemonic, account_index, context)
            .await?;
        Ok(CreatedWallet { wallet, mnemonic })
    }

    /// 从已有助记词导入钱包
    pub async fn import_wallet(
        &self,
        name: &str,
        phrase: &str,
        account_index: u32,
        context: &PromptContext,
    ) -> WalletResult<Wallet> {
        let name = validate_new_wallet(name, account_index)?;
        let normalized = Zeroizing::new(
            phrase
                .split_whitespace()
                .map(str::to_lowercase)
                .collect::<Vec<_>>()
                .join(" "),
        );
        if !MnemonicEngine::validate_phrase(&normalized) {
            return Err(WalletError::InvalidMnemonic);
        }
        self.persist_new_wallet(name, &normalized, account_index, context)
            .await
    }

    async fn persist_new_wallet(
        &self,
        name: &str,
        phrase: &str,
        account_index: u32,
        context: &PromptContext,
    ) -> WalletResult<Wallet> {
        let seed = MnemonicEngine::derive(phrase, "")?;
        let chains = self.derive_chain_wallets(&seed, account_index)?;

        let id = Uuid::new_v4().to_string();
        let alias = key_alias_for(&id);

        // 一次验证，两个单次 cipher：种子和助记词分别加密
        let enclave = &self.enclave;
        let secrets = self
            .gate
            .authenticate_with(context, &PromptConfig::protect_wallet(), |token| {
                let alias = alias.as_str();
                let seed = &seed;
                async move {
                    let seed_cipher = enclave.create_encrypt_cipher(alias, &token).await?;
                    let encrypted_seed = enclave
                        .encrypt_seed_with_cipher(seed_cipher, seed.as_bytes())
                        .await?;

                    let mnemonic_cipher = enclave.create_encrypt_cipher(alias, &token).await?;
                    let encrypted_mnemonic = enclave
                        .encrypt_seed_with_cipher(mnemonic_cipher, phrase.as_bytes())
                        .await?;

                    Ok(WalletSecrets {
                        encrypted_seed,
                        encrypted_mnemonic,
                    })
                }
            })
            .await?;
        drop(seed);

        // 第一个钱包自动成为活跃钱包
        let is_active = self.wallets.find_active().await?.is_none();

        let wallet = Wallet {
            id,
            name: name.to_string(),
            account_index,
            created_at: Utc::now(),
            is_active,
            chains,
        };

        if let Err(e) = self.wallets.insert(&wallet, &secrets).await {
            // 没有落库的钱包不应留下硬件密钥
            if let Err(cleanup) = self.enclave.delete_key(&alias).await {
                tracing::warn!(alias = %alias, error = %cleanup, "Failed to remove orphaned key");
            }
            return Err(e);
        }

        tracing::info!(
            wallet_id = %wallet.id,
            chains = wallet.chains.len(),
            is_active,
            "Wallet created"
        );
        Ok(wallet)
    }

    /// 为注册表中的每条链派生一个账户；首次使用前没有活跃链
    fn derive_chain_wallets(&self, seed: &Seed, account_index: u32) -> WalletResult<Vec<ChainWallet>> {
        self.registry
            .list_all()
            .into_iter()
            .map(|config| {
                let keypair = KeyDerivationEngine::derive_keypair(seed, config, account_index)?;
                tracing::debug!(
                    chain = %config.id,
                    address = %redact_address(&keypair.address),
                    "Derived chain account"
                );
                Ok(ChainWallet {
                    chain_id: config.id.clone(),
                    chain_type: config.chain_type,
                    address: keypair.address.clone(),
                    public_key: hex::encode(&keypair.public_key),
                    derivation_path: keypair.derivation_path.clone(),
                    balance: 0,
                    is_active: false,
                })
            })
            .collect()
    }

    pub async fn list_wallets(&self) -> WalletResult<Vec<Wallet>> {
        self.wallets.list().await
    }

    pub async fn active_wallet(&self) -> WalletResult<Option<Wallet>> {
        self.wallets.find_active().await
    }

    /// 切换活跃钱包
    pub async fn switch_wallet(&self, wallet_id: &str) -> WalletResult<Wallet> {
        self.wallets.set_active(wallet_id).await?;
        tracing::info!(wallet_id, "Active wallet switched");
        self.require_wallet(wallet_id).await
    }

    /// 选择活跃链（接受 id / 符号 / 别名）
    pub async fn select_chain(&self, wallet_id: &str, chain: &str) -> WalletResult<Wallet> {
        let config = self.registry.get_chain(chain)?;
        self.wallets.set_active_chain(wallet_id, &config.id).await?;
        tracing::info!(wallet_id, chain = %config.id, "Active chain selected");
        self.require_wallet(wallet_id).await
    }

    /// 刷新钱包所有可查询链的余额
    ///
    /// 没有 RPC 客户端的链保留旧余额；网络错误立即返回。
    pub async fn refresh_balances(&self, wallet_id: &str) -> WalletResult<Wallet> {
        let wallet = self.require_wallet(wallet_id).await?;

        for chain in &wallet.chains {
            let client = match self.rpc_factory.create_client(&chain.chain_id).await {
                Ok(client) => client,
                Err(WalletError::ChainNotSupported(_)) => {
                    tracing::debug!(chain = %chain.chain_id, "Balance refresh skipped");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let balance = client.get_balance(&chain.address).await?;
            self.wallets
                .update_balance(wallet_id, &chain.chain_id, balance)
                .await?;
            tracing::debug!(chain = %chain.chain_id, balance, "Balance refreshed");
        }

        self.require_wallet(wallet_id).await
    }

    /// 验证后解密并返回助记词
    pub async fn reveal_mnemonic(
        &self,
        wallet_id: &str,
        context: &PromptContext,
    ) -> WalletResult<Zeroizing<String>> {
        let wallet = self.require_wallet(wallet_id).await?;
        let alias = wallet.key_alias();
        let enclave = &self.enclave;
        let wallets = &self.wallets;

        let plaintext = self
            .gate
            .authenticate_with(context, &PromptConfig::reveal_mnemonic(), |token| async move {
                let cipher = enclave.create_decrypt_cipher(&alias, &token).await?;
                let secrets = wallets.load_secrets(wallet_id).await?;
                enclave
                    .decrypt_with_cipher(cipher, &secrets.encrypted_mnemonic)
                    .await
            })
            .await?;

        let phrase = std::str::from_utf8(&plaintext)
            .map_err(|_| {
                WalletError::CryptoOperationFailed("Stored mnemonic is not valid UTF-8".to_string())
            })?
            .to_string();

        tracing::info!(wallet_id, "Mnemonic revealed");
        Ok(Zeroizing::new(phrase))
    }

    /// 删除钱包及其硬件密钥
    ///
    /// 删除的是活跃钱包时，最近创建的剩余钱包成为活跃钱包。
    pub async fn delete_wallet(&self, wallet_id: &str) -> WalletResult<()> {
        let wallet = self.require_wallet(wallet_id).await?;

        if !self.wallets.delete(wallet_id).await? {
            return Err(WalletError::WalletNotFound(wallet_id.to_string()));
        }
        self.enclave.delete_key(&wallet.key_alias()).await?;

        if wallet.is_active {
            let remaining = self.wallets.list().await?;
            if let Some(next) = remaining.iter().max_by_key(|w| w.created_at) {
                self.wallets.set_active(&next.id).await?;
                tracing::info!(wallet_id = %next.id, "Active wallet reassigned");
            }
        }

        tracing::info!(wallet_id, "Wallet deleted");
        Ok(())
    }

    async fn require_wallet(&self, wallet_id: &str) -> WalletResult<Wallet> {
        self.wallets
            .find_by_id(wallet_id)
            .await?
            .ok_or_else(|| WalletError::WalletNotFound(wallet_id.to_string()))
    }
}
