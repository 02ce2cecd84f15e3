use std::sync::Arc;

use anyhow::Context;

use crate::{
    config::Config,
    domain::chain_config::ChainRegistry,
    infrastructure::{
        biometric::{BiometricGate, BiometricPlatform},
        db::{init_pool, DbPool},
        network_manager::NetworkManager,
        preferences::PreferenceStore,
        rpc_client::{HttpRpcClientFactory, RpcClientFactory},
        secure_enclave::{HardwareKeyStore, SecureEnclaveManager},
        send_lock::WalletSendLocks,
    },
    repository::{
        SqliteTransactionRepository, SqliteWalletRepository, TransactionRepository,
        WalletRepository,
    },
    service::{fee_service::FeeService, TransactionOrchestrator, WalletService},
};

/// 宿主平台提供的能力
#[derive(Clone)]
pub struct PlatformServices {
    pub biometric: Arc<dyn BiometricPlatform>,
    pub key_store: Arc<dyn HardwareKeyStore>,
    pub preferences: Arc<dyn PreferenceStore>,
}

/// 应用状态
/// 包含所有共享资源
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<Config>,
    pub registry: Arc<ChainRegistry>,
    pub network: Arc<NetworkManager>,
    pub wallets: Arc<dyn WalletRepository>,
    pub transactions: Arc<dyn TransactionRepository>,
    pub wallet_service: Arc<WalletService>,
    pub orchestrator: Arc<TransactionOrchestrator>,
}

impl AppState {
    /// 创建新的应用状态（打开数据库并使用 HTTP RPC 工厂）
    pub async fn new(config: Config, platform: PlatformServices) -> anyhow::Result<Self> {
        let pool = init_pool(&config.storage.database_url)
            .await
            .context("Failed to open wallet database")?;
        tracing::info!("Wallet database ready");

        let registry = Arc::new(
            ChainRegistry::with_overrides(&config.rpc.endpoint_overrides)
                .context("Invalid RPC endpoint overrides")?,
        );

        let network = Arc::new(
            NetworkManager::load(platform.preferences.clone())
                .await
                .context("Failed to load network preference")?,
        );

        let rpc_factory: Arc<dyn RpcClientFactory> = Arc::new(
            HttpRpcClientFactory::new(registry.clone(), network.clone(), config.rpc.settings())
                .context("Failed to build RPC factory")?,
        );

        Ok(Self::assemble(
            pool,
            config,
            registry,
            network,
            rpc_factory,
            platform,
        ))
    }

    /// 用已有组件组装状态
    pub fn assemble(
        pool: DbPool,
        config: Config,
        registry: Arc<ChainRegistry>,
        network: Arc<NetworkManager>,
        rpc_factory: Arc<dyn RpcClientFactory>,
        platform: PlatformServices,
    ) -> Self {
        let wallets: Arc<dyn WalletRepository> =
            Arc::new(SqliteWalletRepository::new(pool.clone()));
        let transactions: Arc<dyn TransactionRepository> =
            Arc::new(SqliteTransactionRepository::new(pool.clone()));

        let gate = Arc::new(BiometricGate::new(
            platform.biometric,
            config.security.gate_config(),
        ));
        let enclave = Arc::new(SecureEnclaveManager::new(
            platform.key_store,
            config.security.cipher_ttl(),
        ));

        let wallet_service = Arc::new(WalletService::new(
            registry.clone(),
            wallets.clone(),
            rpc_factory.clone(),
            gate.clone(),
            enclave.clone(),
        ));

        let orchestrator = Arc::new(TransactionOrchestrator::new(
            registry.clone(),
            network.clone(),
            rpc_factory,
            gate,
            enclave,
            wallets.clone(),
            transactions.clone(),
            Arc::new(FeeService::new(config.fees.clone())),
            Arc::new(WalletSendLocks::new()),
        ));

        Self {
            pool,
            config: Arc::new(config),
            registry,
            network,
            wallets,
            transactions,
            wallet_service,
            orchestrator,
        }
    }
}
