//! 测试辅助模块
//! 提供测试替身（生物识别平台、链 RPC、密钥库）和组装好的测试环境

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use zeroize::Zeroizing;

use ironvault::config::FeesConfig;
use ironvault::domain::chain_config::{ChainRegistry, ChainType};
use ironvault::domain::{TransactionRecord, TransactionStatus, Wallet};
use ironvault::error::{WalletError, WalletResult};
use ironvault::infrastructure::biometric::{
    BiometricAvailability, BiometricGate, BiometricGateConfig, BiometricPlatform, PlatformEvent,
    PromptConfig, PromptContext, PromptSession,
};
use ironvault::infrastructure::db::init_pool;
use ironvault::infrastructure::network_manager::NetworkManager;
use ironvault::infrastructure::preferences::MemoryPreferenceStore;
use ironvault::infrastructure::rpc_client::{ChainRpcClient, RpcClientFactory, SimulationResult};
use ironvault::infrastructure::secure_enclave::{
    HardwareKeyStore, KeyHandle, SecureEnclaveManager, SoftwareKeyStore,
};
use ironvault::infrastructure::send_lock::WalletSendLocks;
use ironvault::repository::{
    SqliteTransactionRepository, SqliteWalletRepository, TransactionRepository, WalletRepository,
};
use ironvault::service::{FeeService, SendRequest, TransactionOrchestrator, WalletService};

pub const TEST_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
pub const RECIPIENT: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 生物识别平台
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 一次提示框的脚本
#[derive(Debug, Clone)]
pub enum PromptScript {
    /// 依次回放事件
    Respond(Vec<PlatformEvent>),
    /// 用户一直不响应
    Hang,
}

/// 按脚本响应的平台；脚本用完后默认识别成功
pub struct ScriptedBiometric {
    availability: Mutex<BiometricAvailability>,
    scripts: Mutex<VecDeque<PromptScript>>,
    prompts: AtomicUsize,
    dismissed: Arc<AtomicUsize>,
    held: Mutex<Vec<mpsc::UnboundedSender<PlatformEvent>>>,
}

struct ScriptedSession(Arc<AtomicUsize>);

impl PromptSession for ScriptedSession {
    fn dismiss(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

impl ScriptedBiometric {
    pub fn new() -> Self {
        Self {
            availability: Mutex::new(BiometricAvailability::Available),
            scripts: Mutex::new(VecDeque::new()),
            prompts: AtomicUsize::new(0),
            dismissed: Arc::new(AtomicUsize::new(0)),
            held: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, script: PromptScript) {
        self.scripts.lock().unwrap().push_back(script);
    }

    pub fn set_availability(&self, availability: BiometricAvailability) {
        *self.availability.lock().unwrap() = availability;
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    pub fn dismissed(&self) -> usize {
        self.dismissed.load(Ordering::SeqCst)
    }
}

impl BiometricPlatform for ScriptedBiometric {
    fn availability(&self) -> BiometricAvailability {
        *self.availability.lock().unwrap()
    }

    fn show_prompt(
        &self,
        _context: &PromptContext,
        _config: &PromptConfig,
        events: mpsc::UnboundedSender<PlatformEvent>,
    ) -> WalletResult<Box<dyn PromptSession>> {
        self.prompts.fetch_add(1, Ordering::SeqCst);

        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| PromptScript::Respond(vec![PlatformEvent::Recognized]));

        match script {
            PromptScript::Respond(script) => {
                for event in script {
                    let _ = events.send(event);
                }
            }
            PromptScript::Hang => {}
        }
        self.held.lock().unwrap().push(events);

        Ok(Box::new(ScriptedSession(self.dismissed.clone())))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 链 RPC
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 所有模拟客户端共享的链状态
pub struct MockChain {
    pub balance: AtomicU64,
    pub blockhash: Mutex<String>,
    pub simulation: Mutex<SimulationResult>,
    pub balance_calls: AtomicUsize,
    pub blockhash_calls: AtomicUsize,
    pub simulate_calls: AtomicUsize,
    pub sent: Mutex<Vec<Vec<u8>>>,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            balance: AtomicU64::new(0),
            blockhash: Mutex::new(bs58::encode([9u8; 32]).into_string()),
            simulation: Mutex::new(SimulationResult::success()),
            balance_calls: AtomicUsize::new(0),
            blockhash_calls: AtomicUsize::new(0),
            simulate_calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn set_balance(&self, lamports: u64) {
        self.balance.store(lamports, Ordering::SeqCst);
    }

    pub fn set_simulation(&self, result: SimulationResult) {
        *self.simulation.lock().unwrap() = result;
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }
}

pub struct MockRpcClient {
    endpoint: String,
    chain: Arc<MockChain>,
}

#[async_trait]
impl ChainRpcClient for MockRpcClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn get_balance(&self, _address: &str) -> WalletResult<u64> {
        self.chain.balance_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.chain.balance.load(Ordering::SeqCst))
    }

    async fn get_latest_blockhash(&self) -> WalletResult<String> {
        self.chain.blockhash_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.chain.blockhash.lock().unwrap().clone())
    }

    async fn simulate_transaction(&self, _serialized: &[u8]) -> WalletResult<SimulationResult> {
        self.chain.simulate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.chain.simulation.lock().unwrap().clone())
    }

    async fn send_transaction(&self, serialized: &[u8]) -> WalletResult<String> {
        self.chain.sent.lock().unwrap().push(serialized.to_vec());
        // 网络返回第一个签名
        Ok(bs58::encode(&serialized[1..65]).into_string())
    }
}

/// 每次调用都按当前网络构造客户端，并记录端点
pub struct RecordingRpcFactory {
    registry: Arc<ChainRegistry>,
    network: Arc<NetworkManager>,
    chain: Arc<MockChain>,
    endpoints: Mutex<Vec<String>>,
}

impl RecordingRpcFactory {
    pub fn endpoints(&self) -> Vec<String> {
        self.endpoints.lock().unwrap().clone()
    }
}

#[async_trait]
impl RpcClientFactory for RecordingRpcFactory {
    async fn create_client(&self, chain_id: &str) -> WalletResult<Arc<dyn ChainRpcClient>> {
        let config = self.registry.get_chain(chain_id)?;
        if config.chain_type != ChainType::Solana {
            return Err(WalletError::ChainNotSupported(config.id.clone()));
        }

        let endpoint = config.endpoint(self.network.current_network()).to_string();
        self.endpoints.lock().unwrap().push(endpoint.clone());

        Ok(Arc::new(MockRpcClient {
            endpoint,
            chain: self.chain.clone(),
        }))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 密钥库
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 统计加解密次数的软件密钥库
pub struct CountingKeyStore {
    pub inner: SoftwareKeyStore,
    pub encrypts: AtomicUsize,
    pub decrypts: AtomicUsize,
}

impl CountingKeyStore {
    pub fn new() -> Self {
        Self {
            inner: SoftwareKeyStore::new(),
            encrypts: AtomicUsize::new(0),
            decrypts: AtomicUsize::new(0),
        }
    }

    pub fn decrypts(&self) -> usize {
        self.decrypts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HardwareKeyStore for CountingKeyStore {
    async fn get_or_create_key(&self, alias: &str) -> WalletResult<KeyHandle> {
        self.inner.get_or_create_key(alias).await
    }

    async fn encrypt(&self, handle: &KeyHandle, plaintext: &[u8]) -> WalletResult<Vec<u8>> {
        self.encrypts.fetch_add(1, Ordering::SeqCst);
        self.inner.encrypt(handle, plaintext).await
    }

    async fn decrypt(
        &self,
        handle: &KeyHandle,
        ciphertext: &[u8],
    ) -> WalletResult<Zeroizing<Vec<u8>>> {
        self.decrypts.fetch_add(1, Ordering::SeqCst);
        self.inner.decrypt(handle, ciphertext).await
    }

    async fn delete_key(&self, alias: &str) -> WalletResult<()> {
        self.inner.delete_key(alias).await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 交易存储
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 写入前可以人为延迟的交易存储
pub struct DelayedTransactionStore {
    inner: SqliteTransactionRepository,
    delay: Mutex<Duration>,
    pub inserts_started: AtomicUsize,
}

impl DelayedTransactionStore {
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn inserts_started(&self) -> usize {
        self.inserts_started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransactionRepository for DelayedTransactionStore {
    async fn insert(&self, record: &TransactionRecord) -> WalletResult<()> {
        self.inserts_started.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        tokio::time::sleep(delay).await;
        self.inner.insert(record).await
    }

    async fn find_by_id(&self, tx_id: &str) -> WalletResult<Option<TransactionRecord>> {
        self.inner.find_by_id(tx_id).await
    }

    async fn find_by_signature(&self, signature: &str) -> WalletResult<Option<TransactionRecord>> {
        self.inner.find_by_signature(signature).await
    }

    async fn list_by_address(
        &self,
        address: &str,
        limit: i64,
        offset: i64,
    ) -> WalletResult<Vec<TransactionRecord>> {
        self.inner.list_by_address(address, limit, offset).await
    }

    async fn update_status(&self, tx_id: &str, status: TransactionStatus) -> WalletResult<()> {
        self.inner.update_status(tx_id, status).await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 测试环境
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct TestHarness {
    pub registry: Arc<ChainRegistry>,
    pub network: Arc<NetworkManager>,
    pub biometric: Arc<ScriptedBiometric>,
    pub key_store: Arc<CountingKeyStore>,
    pub chain: Arc<MockChain>,
    pub rpc_factory: Arc<RecordingRpcFactory>,
    pub wallets: Arc<dyn WalletRepository>,
    pub transactions: Arc<dyn TransactionRepository>,
    pub transaction_store: Arc<DelayedTransactionStore>,
    pub locks: Arc<WalletSendLocks>,
    pub wallet_service: WalletService,
    pub orchestrator: Arc<TransactionOrchestrator>,
}

impl TestHarness {
    pub async fn new() -> Self {
        let pool = init_pool("sqlite::memory:").await.unwrap();
        let registry = Arc::new(ChainRegistry::new());
        let network = Arc::new(
            NetworkManager::load(Arc::new(MemoryPreferenceStore::new()))
                .await
                .unwrap(),
        );

        let biometric = Arc::new(ScriptedBiometric::new());
        let key_store = Arc::new(CountingKeyStore::new());
        let chain = Arc::new(MockChain::new());
        let rpc_factory = Arc::new(RecordingRpcFactory {
            registry: registry.clone(),
            network: network.clone(),
            chain: chain.clone(),
            endpoints: Mutex::new(Vec::new()),
        });

        let wallets: Arc<dyn WalletRepository> =
            Arc::new(SqliteWalletRepository::new(pool.clone()));
        let transaction_store = Arc::new(DelayedTransactionStore {
            inner: SqliteTransactionRepository::new(pool),
            delay: Mutex::new(Duration::ZERO),
            inserts_started: AtomicUsize::new(0),
        });
        let transactions: Arc<dyn TransactionRepository> = transaction_store.clone();

        let gate = Arc::new(BiometricGate::new(
            biometric.clone(),
            BiometricGateConfig::default(),
        ));
        let enclave = Arc::new(SecureEnclaveManager::new(
            key_store.clone(),
            std::time::Duration::from_secs(30),
        ));
        let locks = Arc::new(WalletSendLocks::new());

        let wallet_service = WalletService::new(
            registry.clone(),
            wallets.clone(),
            rpc_factory.clone(),
            gate.clone(),
            enclave.clone(),
        );

        let orchestrator = Arc::new(TransactionOrchestrator::new(
            registry.clone(),
            network.clone(),
            rpc_factory.clone(),
            gate,
            enclave,
            wallets.clone(),
            transactions.clone(),
            Arc::new(FeeService::new(FeesConfig {
                base_fee_lamports: 5_000,
                compute_unit_limit: 200_000,
                compute_unit_price_micro_lamports: 250_000,
            })),
            locks.clone(),
        ));

        Self {
            registry,
            network,
            biometric,
            key_store,
            chain,
            rpc_factory,
            wallets,
            transactions,
            transaction_store,
            locks,
            wallet_service,
            orchestrator,
        }
    }

    /// 导入测试助记词，选择 Solana 为活跃链并设置链上余额
    pub async fn funded_solana_wallet(&self, lamports: u64) -> Wallet {
        let wallet = self
            .wallet_service
            .import_wallet("Main", TEST_MNEMONIC, 0, &ctx())
            .await
            .unwrap();
        let wallet = self
            .wallet_service
            .select_chain(&wallet.id, "solana")
            .await
            .unwrap();
        self.chain.set_balance(lamports);
        wallet
    }
}

pub fn ctx() -> PromptContext {
    PromptContext::new("send_screen")
}

pub fn sol(amount: &str) -> Decimal {
    amount.parse().unwrap()
}

pub fn send_request(amount: &str) -> SendRequest {
    SendRequest {
        chain_id: "solana".to_string(),
        recipient: RECIPIENT.to_string(),
        amount: sol(amount),
    }
}
