//! 钱包数据访问 Repository
//!
//! 独占钱包记录及其密文。任意时刻全库只有一个活跃钱包，每个钱包最多一条活跃链。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use crate::domain::chain_config::ChainType;
use crate::domain::wallet::{ChainWallet, Wallet, WalletSecrets};
use crate::error::{WalletError, WalletResult};
use crate::infrastructure::db::DbPool;

// ============ Repository Trait ============

#[async_trait]
pub trait WalletRepository: Send + Sync {
    /// 保存新钱包（含各链账户与密文）；活跃钱包会取消其他钱包的活跃状态
    async fn insert(&self, wallet: &Wallet, secrets: &WalletSecrets) -> WalletResult<()>;

    async fn find_by_id(&self, wallet_id: &str) -> WalletResult<Option<Wallet>>;

    /// 当前活跃钱包
    async fn find_active(&self) -> WalletResult<Option<Wallet>>;

    /// 所有钱包（按创建时间升序）
    async fn list(&self) -> WalletResult<Vec<Wallet>>;

    /// 设为唯一活跃钱包
    async fn set_active(&self, wallet_id: &str) -> WalletResult<()>;

    /// 设为钱包的唯一活跃链
    async fn set_active_chain(&self, wallet_id: &str, chain_id: &str) -> WalletResult<()>;

    async fn update_balance(&self, wallet_id: &str, chain_id: &str, balance: u64)
        -> WalletResult<()>;

    /// 读取密文（只在单次签名/查看调用栈内使用）
    async fn load_secrets(&self, wallet_id: &str) -> WalletResult<WalletSecrets>;

    /// 删除钱包，返回是否存在
    async fn delete(&self, wallet_id: &str) -> WalletResult<bool>;
}

// ============ SQLite 实现 ============

pub struct SqliteWalletRepository {
    pool: DbPool,
}

impl SqliteWalletRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn map_chain_row(row: &SqliteRow) -> WalletResult<ChainWallet> {
        let chain_type: String = row.try_get("chain_type")?;
        let balance: String = row.try_get("balance")?;

        Ok(ChainWallet {
            chain_id: row.try_get("chain_id")?,
            chain_type: ChainType::parse(&chain_type).ok_or_else(|| {
                // 存储中的链类型必须能解析，否则属于配置错误
                WalletError::UnknownChain(chain_type.clone())
            })?,
            address: row.try_get("address")?,
            public_key: row.try_get("public_key")?,
            derivation_path: row.try_get("derivation_path")?,
            balance: balance
                .parse()
                .map_err(|_| WalletError::Storage(format!("Corrupt balance value: {}", balance)))?,
            is_active: row.try_get("is_active")?,
        })
    }

    async fn load_chains(&self, wallet_id: &str) -> WalletResult<Vec<ChainWallet>> {
        let rows = sqlx::query(
            r#"
            SELECT chain_id, chain_type, address, public_key, derivation_path, balance, is_active
            FROM chain_wallets
            WHERE wallet_id = ?
            ORDER BY chain_id
            "#,
        )
        .bind(wallet_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::map_chain_row).collect()
    }

    async fn map_wallet_row(&self, row: &SqliteRow) -> WalletResult<Wallet> {
        let id: String = row.try_get("id")?;
        let account_index: i64 = row.try_get("account_index")?;
        let created_at: DateTime<Utc> = row.try_get("created_at")?;
        let chains = self.load_chains(&id).await?;

        Ok(Wallet {
            name: row.try_get("name")?,
            account_index: u32::try_from(account_index).map_err(|_| {
                WalletError::Storage(format!("Corrupt account index: {}", account_index))
            })?,
            created_at,
            is_active: row.try_get("is_active")?,
            chains,
            id,
        })
    }
}

#[async_trait]
impl WalletRepository for SqliteWalletRepository {
    async fn insert(&self, wallet: &Wallet, secrets: &WalletSecrets) -> WalletResult<()> {
        let mut tx = self.pool.begin().await?;

        if wallet.is_active {
            sqlx::query("UPDATE wallets SET is_active = 0")
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO wallets (id, name, account_index, encrypted_seed, encrypted_mnemonic, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&wallet.id)
        .bind(&wallet.name)
        .bind(i64::from(wallet.account_index))
        .bind(&secrets.encrypted_seed)
        .bind(&secrets.encrypted_mnemonic)
        .bind(wallet.is_active)
        .bind(wallet.created_at)
        .execute(&mut *tx)
        .await?;

        for chain in &wallet.chains {
            sqlx::query(
                r#"
                INSERT INTO chain_wallets (wallet_id, chain_id, chain_type, address, public_key, derivation_path, balance, is_active)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&wallet.id)
            .bind(&chain.chain_id)
            .bind(chain.chain_type.as_str())
            .bind(&chain.address)
            .bind(&chain.public_key)
            .bind(&chain.derivation_path)
            .bind(chain.balance.to_string())
            .bind(chain.is_active)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(wallet_id = %wallet.id, chains = wallet.chains.len(), "Wallet persisted");
        Ok(())
    }

    async fn find_by_id(&self, wallet_id: &str) -> WalletResult<Option<Wallet>> {
        let row = sqlx::query(
            "SELECT id, name, account_index, is_active, created_at FROM wallets WHERE id = ?",
        )
        .bind(wallet_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.map_wallet_row(&row).await?)),
            None => Ok(None),
        }
    }

    async fn find_active(&self) -> WalletResult<Option<Wallet>> {
        let row = sqlx::query(
            "SELECT id, name, account_index, is_active, created_at FROM wallets WHERE is_active = 1 LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.map_wallet_row(&row).await?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> WalletResult<Vec<Wallet>> {
        let rows = sqlx::query(
            "SELECT id, name, account_index, is_active, created_at FROM wallets ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut wallets = Vec::with_capacity(rows.len());
        for row in &rows {
            wallets.push(self.map_wallet_row(row).await?);
        }
        Ok(wallets)
    }

    async fn set_active(&self, wallet_id: &str) -> WalletResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE wallets SET is_active = 0")
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("UPDATE wallets SET is_active = 1 WHERE id = ?")
            .bind(wallet_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            // 回滚，保持原活跃钱包
            tx.rollback().await?;
            return Err(WalletError::WalletNotFound(wallet_id.to_string()));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn set_active_chain(&self, wallet_id: &str, chain_id: &str) -> WalletResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE chain_wallets SET is_active = 0 WHERE wallet_id = ?")
            .bind(wallet_id)
            .execute(&mut *tx)
            .await?;
        let result =
            sqlx::query("UPDATE chain_wallets SET is_active = 1 WHERE wallet_id = ? AND chain_id = ?")
                .bind(wallet_id)
                .bind(chain_id)
                .execute(&mut *tx)
                .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(WalletError::UnknownChain(chain_id.to_string()));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn update_balance(
        &self,
        wallet_id: &str,
        chain_id: &str,
        balance: u64,
    ) -> WalletResult<()> {
        sqlx::query("UPDATE chain_wallets SET balance = ? WHERE wallet_id = ? AND chain_id = ?")
            .bind(balance.to_string())
            .bind(wallet_id)
            .bind(chain_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn load_secrets(&self, wallet_id: &str) -> WalletResult<WalletSecrets> {
        let row = sqlx::query("SELECT encrypted_seed, encrypted_mnemonic FROM wallets WHERE id = ?")
            .bind(wallet_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| WalletError::WalletNotFound(wallet_id.to_string()))?;

        Ok(WalletSecrets {
            encrypted_seed: row.try_get("encrypted_seed")?,
            encrypted_mnemonic: row.try_get("encrypted_mnemonic")?,
        })
    }

    async fn delete(&self, wallet_id: &str) -> WalletResult<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chain_wallets WHERE wallet_id = ?")
            .bind(wallet_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM wallets WHERE id = ?")
            .bind(wallet_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}
