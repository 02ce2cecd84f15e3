//! 发送流水线（交易编排器）
//!
//! 严格顺序、遇错即停：
//! 1. 校验收款地址  2. 解析活跃钱包与活跃链  3. 构造 RPC 客户端
//! 4. 余额检查（在任何验证提示之前）  5. 生物识别验证
//! 6. 验证后创建 cipher 解密种子并派生签名密钥  7. 获取最新 blockhash
//! 8. 构建交易  9. 签名并序列化  10. 模拟  11. 提交并保存 Pending 记录  12. 返回记录
//!
//! 任何步骤都不自动重试；同一钱包的第 4-11 步由发送锁串行化。

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::chain_config::{ChainConfig, ChainRegistry};
use crate::domain::derivation::{DerivedKeypair, KeyDerivationEngine};
use crate::domain::mnemonic::Seed;
use crate::domain::transaction_status::{TransactionRecord, TransactionStatus};
use crate::domain::wallet::{ChainWallet, Wallet};
use crate::error::{WalletError, WalletResult};
use crate::infrastructure::biometric::{BiometricGate, PromptConfig, PromptContext};
use crate::infrastructure::log_redact::{redact_address, redact_signature, SensitiveRedact};
use crate::infrastructure::network_manager::NetworkManager;
use crate::infrastructure::rpc_client::{ChainRpcClient, RpcClientFactory};
use crate::infrastructure::secure_enclave::SecureEnclaveManager;
use crate::infrastructure::send_lock::WalletSendLocks;
use crate::repository::{TransactionRepository, WalletRepository};
use crate::service::fee_service::FeeService;
use crate::service::transaction_builder::{SolanaTransactionBuilder, SolanaTransfer};
use crate::utils::amount::to_base_units;

/// 转账请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendRequest {
    /// 链 id / 符号 / 别名
    pub chain_id: String,
    pub recipient: String,
    /// 原生单位金额（例如 1.5 SOL）
    pub amount: Decimal,
}

/// 第 1-2 步解析出的上下文
struct ResolvedSend<'a> {
    config: &'a ChainConfig,
    wallet: Wallet,
    sender: ChainWallet,
    lamports: u64,
}

/// 第 11 步的全部输入（自持所有权，可移入独立任务）
struct Submission {
    wire: Vec<u8>,
    local_signature: Option<String>,
    draft: TransactionRecord,
}

impl Submission {
    async fn run(
        self,
        client: Arc<dyn ChainRpcClient>,
        transactions: Arc<dyn TransactionRepository>,
    ) -> WalletResult<TransactionRecord> {
        let signature = client.send_transaction(&self.wire).await?;

        if self.local_signature.as_deref() != Some(signature.as_str()) {
            tracing::warn!(
                local = ?self.local_signature.as_deref().map(redact_signature),
                network = %redact_signature(&signature),
                "Network returned a different transaction signature"
            );
        }

        let record = TransactionRecord {
            signature: Some(signature.clone()),
            ..self.draft
        };

        tracing::info!(
            tx_id = %record.id,
            signature = %redact_signature(&signature),
            from = %redact_address(&record.from_address),
            to = %redact_address(&record.to_address),
            amount = %record.amount,
            fee = record.total_fee(),
            "Transaction submitted"
        );

        // 交易已在链上传播，本地记录写入失败不能让调用方误以为可以重发
        if let Err(e) = transactions.insert(&record).await {
            tracing::error!(
                tx_id = %record.id,
                signature = %signature,
                error = %e,
                "Failed to persist submitted transaction"
            );
        }

        Ok(record)
    }
}

pub struct TransactionOrchestrator {
    registry: Arc<ChainRegistry>,
    network: Arc<NetworkManager>,
    rpc_factory: Arc<dyn RpcClientFactory>,
    gate: Arc<BiometricGate>,
    enclave: Arc<SecureEnclaveManager>,
    wallets: Arc<dyn WalletRepository>,
    transactions: Arc<dyn TransactionRepository>,
    fees: Arc<FeeService>,
    locks: Arc<WalletSendLocks>,
}

impl TransactionOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<ChainRegistry>,
        network: Arc<NetworkManager>,
        rpc_factory: Arc<dyn RpcClientFactory>,
        gate: Arc<BiometricGate>,
        enclave: Arc<SecureEnclaveManager>,
        wallets: Arc<dyn WalletRepository>,
        transactions: Arc<dyn TransactionRepository>,
        fees: Arc<FeeService>,
        locks: Arc<WalletSendLocks>,
    ) -> Self {
        Self {
            registry,
            network,
            rpc_factory,
            gate,
            enclave,
            wallets,
            transactions,
            fees,
            locks,
        }
    }

    /// 执行一次发送
    ///
    /// 丢弃返回的 future 会在提交前干净地中止（包括关闭正在显示的验证提示）；
    /// 进入第 11 步后提交和记录写入会在后台完成。
    pub async fn send(
        &self,
        request: SendRequest,
        context: &PromptContext,
    ) -> WalletResult<TransactionRecord> {
        tracing::debug!(request = %request.redact(), "Send requested");

        let result = self.run_pipeline(&request, context).await;

        if let Err(e) = &result {
            tracing::warn!(
                code = e.code(),
                retryable = e.is_retryable(),
                chain = %request.chain_id,
                error = %e,
                "Send failed"
            );
        }
        result
    }

    /// 已提交交易的浏览器链接（按当前网络）
    pub fn explorer_url(&self, record: &TransactionRecord) -> WalletResult<Option<String>> {
        let config = self.registry.get_chain(&record.chain_id)?;
        Ok(record
            .signature
            .as_deref()
            .map(|sig| config.explorer_tx_url(sig, self.network.current_network())))
    }

    async fn run_pipeline(
        &self,
        request: &SendRequest,
        context: &PromptContext,
    ) -> WalletResult<TransactionRecord> {
        // 1-2
        let resolved = self.resolve(request).await?;
        let config = resolved.config;

        // 3. 每次发送都重新构造客户端
        tracing::debug!(step = 3, chain = %config.id, "Creating RPC client");
        let client = self.rpc_factory.create_client(&config.id).await?;

        // 4-11 期间持有钱包发送锁
        let _send_guard = self.locks.acquire(&resolved.wallet.id).await;

        // 4. 余额检查必须在验证提示之前
        tracing::debug!(step = 4, endpoint = %client.endpoint(), "Checking balance");
        let balance = client.get_balance(&resolved.sender.address).await?;
        let fee = self.fees.estimate(1);
        let required = self.fees.required_balance(resolved.lamports, &fee)?;
        if balance < required {
            return Err(WalletError::InsufficientBalance {
                required,
                available: balance,
            });
        }

        // 5-6. 验证成功后才在续延中创建 cipher 并解密
        tracing::debug!(step = 5, "Requesting biometric authentication");
        let keypair = self
            .unlock_signing_key(&resolved, context)
            .await?;

        // 7
        tracing::debug!(step = 7, "Fetching recent blockhash");
        let recent_blockhash = client.get_latest_blockhash().await?;

        // 8
        let message = SolanaTransactionBuilder::build_transfer(
            &SolanaTransfer {
                from: &resolved.sender.address,
                to: &request.recipient,
                lamports: resolved.lamports,
                recent_blockhash: &recent_blockhash,
            },
            &fee,
        )?;

        // 9. 签名后立即丢弃私钥
        tracing::debug!(step = 9, "Signing transaction");
        let signed = SolanaTransactionBuilder::sign(&message, &keypair);
        drop(keypair);
        let signed = signed?;
        let wire = signed.serialize()?;

        // 10. 模拟失败不提交
        tracing::debug!(step = 10, bytes = wire.len(), "Simulating transaction");
        let simulation = client.simulate_transaction(&wire).await?;
        if !simulation.will_succeed {
            return Err(WalletError::SimulationFailed(
                simulation
                    .error_message
                    .unwrap_or_else(|| "Transaction simulation failed".to_string()),
            ));
        }

        // 11. 提交与落库在独立任务中完成，调用方中途放弃也会写入记录
        tracing::debug!(step = 11, "Submitting transaction");
        let submission = Submission {
            wire,
            local_signature: signed.transaction_id(),
            draft: TransactionRecord {
                id: Uuid::new_v4().to_string(),
                wallet_id: resolved.wallet.id.clone(),
                chain_id: config.id.clone(),
                from_address: resolved.sender.address.clone(),
                to_address: request.recipient.clone(),
                amount: request.amount,
                base_fee: fee.base_fee,
                priority_fee: fee.priority_fee,
                signature: None,
                status: TransactionStatus::Pending,
                created_at: Utc::now(),
            },
        };
        let task = tokio::spawn(submission.run(client, self.transactions.clone()));

        // 12
        task.await
            .map_err(|e| WalletError::Storage(format!("Submission task aborted: {}", e)))?
    }

    /// 第 1-2 步
    async fn resolve(&self, request: &SendRequest) -> WalletResult<ResolvedSend<'_>> {
        // 1. 校验收款地址
        let config = self.registry.get_chain(&request.chain_id)?;
        if !KeyDerivationEngine::is_valid_address(config.chain_type, &request.recipient) {
            return Err(WalletError::InvalidAddress {
                chain: config.id.clone(),
                address: request.recipient.clone(),
            });
        }
        let lamports = to_base_units(request.amount, config.decimals)?;

        // 2. 活跃钱包与活跃链
        let wallet = self
            .wallets
            .find_active()
            .await?
            .ok_or(WalletError::NoActiveWallet)?;

        let sender = wallet
            .active_chain()
            .filter(|chain| chain.chain_id == config.id)
            .cloned()
            .ok_or(WalletError::NoActiveChain)?;

        // 活跃链必须恰好解析到一个配置
        let sender_config = self.registry.get_chain(&sender.chain_id)?;
        if sender_config.chain_type != sender.chain_type {
            return Err(WalletError::Config(format!(
                "Chain wallet {} is tagged {} but registry says {}",
                sender.chain_id, sender.chain_type, sender_config.chain_type
            )));
        }

        tracing::debug!(
            step = 2,
            wallet_id = %wallet.id,
            chain = %config.id,
            from = %redact_address(&sender.address),
            "Resolved active wallet"
        );

        Ok(ResolvedSend {
            config,
            wallet,
            sender,
            lamports,
        })
    }

    /// 第 5-6 步：验证 → 创建解密 cipher → 解密种子 → 派生签名密钥
    async fn unlock_signing_key(
        &self,
        resolved: &ResolvedSend<'_>,
        context: &PromptContext,
    ) -> WalletResult<DerivedKeypair> {
        let alias = resolved.wallet.key_alias();
        let enclave = &self.enclave;
        let wallets = &self.wallets;
        let wallet_id = resolved.wallet.id.as_str();

        let seed = self
            .gate
            .authenticate_with(context, &PromptConfig::confirm_transaction(), |token| async move {
                tracing::debug!(step = 6, "Decrypting seed");
                let cipher = enclave.create_decrypt_cipher(&alias, &token).await?;
                let secrets = wallets.load_secrets(wallet_id).await?;
                let plaintext = enclave
                    .decrypt_with_cipher(cipher, &secrets.encrypted_seed)
                    .await?;
                Seed::from_slice(&plaintext)
            })
            .await?;

        let keypair = KeyDerivationEngine::derive_keypair(
            &seed,
            resolved.config,
            resolved.wallet.account_index,
        )?;
        drop(seed);

        // 派生结果必须与钱包记录一致，否则绝不签名
        if keypair.address != resolved.sender.address {
            return Err(WalletError::CryptoOperationFailed(
                "Derived key does not match the wallet address".to_string(),
            ));
        }

        Ok(keypair)
    }
}
