//! IronVault 主入口
//! 本地钱包库的运维工具：检查配置、查看钱包、切换网络
//!
//! 用法：
//!   ironvault status
//!   ironvault network <mainnet|devnet|testnet>

use std::sync::Arc;

use anyhow::{Context, Result};
use ironvault::{
    config::Config,
    domain::{ChainRegistry, NetworkEnvironment},
    infrastructure::{
        db::init_pool,
        logging::init_logging,
        network_manager::NetworkManager,
        preferences::FilePreferenceStore,
    },
    repository::{SqliteWalletRepository, WalletRepository},
    utils::from_base_units,
};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 加载环境变量与配置文件
    dotenvy::dotenv().ok();
    let config_path = std::env::var("CONFIG_PATH").ok();
    let config = Config::from_env_and_file(config_path.as_deref())?;
    config.validate()?;

    // 2. 初始化日志
    init_logging(&config.logging)?;
    tracing::info!("Starting IronVault");

    // 3. 链注册表
    let registry = ChainRegistry::with_overrides(&config.rpc.endpoint_overrides)
        .context("Invalid RPC endpoint overrides")?;
    if let Err(problems) = registry.validate_configs() {
        for problem in &problems {
            tracing::error!(problem = %problem, "Invalid chain configuration");
        }
        anyhow::bail!("{} chain configuration problem(s)", problems.len());
    }

    // 4. 网络偏好
    let prefs = Arc::new(
        FilePreferenceStore::open(&config.storage.preferences_path)
            .await
            .context("Failed to open preference store")?,
    );
    let network = NetworkManager::load(prefs).await?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("network") => {
            let name = args.get(1).context("Usage: ironvault network <mainnet|devnet|testnet>")?;
            let target = NetworkEnvironment::parse(name)
                .with_context(|| format!("Unknown network: {}", name))?;
            network.switch_network(target).await?;
            tracing::info!(network = %target, "Network switched");
        }
        Some("status") | None => {
            let pool = init_pool(&config.storage.database_url)
                .await
                .context("Failed to open wallet database")?;
            let wallets = SqliteWalletRepository::new(pool).list().await?;

            let current = network.current_network();
            for chain in registry.list_all() {
                tracing::info!(
                    chain = %chain.id,
                    symbol = %chain.native_symbol,
                    endpoint = %chain.endpoint(current),
                    "Chain configured"
                );
            }
            for wallet in &wallets {
                tracing::info!(
                    wallet_id = %wallet.id,
                    name = %wallet.name,
                    active = wallet.is_active,
                    active_chain = wallet.active_chain().map(|c| c.chain_id.as_str()).unwrap_or("-"),
                    "Wallet"
                );
                for chain in &wallet.chains {
                    let decimals = registry.get_chain(&chain.chain_id)?.decimals;
                    tracing::info!(
                        wallet_id = %wallet.id,
                        chain = %chain.chain_id,
                        balance = %from_base_units(chain.balance, decimals),
                        "Cached balance"
                    );
                }
            }
            tracing::info!(network = %current, wallets = wallets.len(), "Status");
        }
        Some(other) => anyhow::bail!("Unknown command: {}", other),
    }

    Ok(())
}
