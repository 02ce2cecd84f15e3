// 交易数据访问 Repository

use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row};

use crate::domain::transaction_status::{TransactionRecord, TransactionStatus};
use crate::error::{WalletError, WalletResult};
use crate::infrastructure::db::DbPool;

// ============ Repository Trait ============

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// 追加交易记录
    async fn insert(&self, record: &TransactionRecord) -> WalletResult<()>;

    /// 根据 ID 查询交易
    async fn find_by_id(&self, tx_id: &str) -> WalletResult<Option<TransactionRecord>>;

    /// 根据网络签名查询
    async fn find_by_signature(&self, signature: &str) -> WalletResult<Option<TransactionRecord>>;

    /// 地址相关的交易（发送或接收），按时间倒序
    async fn list_by_address(
        &self,
        address: &str,
        limit: i64,
        offset: i64,
    ) -> WalletResult<Vec<TransactionRecord>>;

    /// 更新交易状态（确认轮询使用）
    async fn update_status(&self, tx_id: &str, status: TransactionStatus) -> WalletResult<()>;
}

// ============ SQLite 实现 ============

pub struct SqliteTransactionRepository {
    pool: DbPool,
}

impl SqliteTransactionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &SqliteRow) -> WalletResult<TransactionRecord> {
        let amount: String = row.try_get("amount")?;
        let status: String = row.try_get("status")?;
        let base_fee: i64 = row.try_get("base_fee")?;
        let priority_fee: i64 = row.try_get("priority_fee")?;

        Ok(TransactionRecord {
            id: row.try_get("id")?,
            wallet_id: row.try_get("wallet_id")?,
            chain_id: row.try_get("chain_id")?,
            from_address: row.try_get("from_address")?,
            to_address: row.try_get("to_address")?,
            amount: Decimal::from_str(&amount)
                .map_err(|_| WalletError::Storage(format!("Corrupt amount: {}", amount)))?,
            base_fee: u64::try_from(base_fee)
                .map_err(|_| WalletError::Storage(format!("Corrupt base fee: {}", base_fee)))?,
            priority_fee: u64::try_from(priority_fee).map_err(|_| {
                WalletError::Storage(format!("Corrupt priority fee: {}", priority_fee))
            })?,
            signature: row.try_get("signature")?,
            status: TransactionStatus::parse(&status)
                .ok_or_else(|| WalletError::Storage(format!("Corrupt status: {}", status)))?,
            created_at: row.try_get("created_at")?,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT id, wallet_id, chain_id, from_address, to_address, amount, base_fee, priority_fee, signature, status, created_at FROM transactions";

fn fee_to_i64(fee: u64) -> WalletResult<i64> {
    i64::try_from(fee).map_err(|_| WalletError::InvalidAmount(format!("Fee out of range: {}", fee)))
}

#[async_trait]
impl TransactionRepository for SqliteTransactionRepository {
    async fn insert(&self, record: &TransactionRecord) -> WalletResult<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions
                (id, wallet_id, chain_id, from_address, to_address, amount, base_fee, priority_fee, signature, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.wallet_id)
        .bind(&record.chain_id)
        .bind(&record.from_address)
        .bind(&record.to_address)
        .bind(record.amount.to_string())
        .bind(fee_to_i64(record.base_fee)?)
        .bind(fee_to_i64(record.priority_fee)?)
        .bind(&record.signature)
        .bind(record.status.as_str())
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, tx_id: &str) -> WalletResult<Option<TransactionRecord>> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(tx_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn find_by_signature(&self, signature: &str) -> WalletResult<Option<TransactionRecord>> {
        let row = sqlx::query(&format!("{} WHERE signature = ?", SELECT_COLUMNS))
            .bind(signature)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn list_by_address(
        &self,
        address: &str,
        limit: i64,
        offset: i64,
    ) -> WalletResult<Vec<TransactionRecord>> {
        let rows = sqlx::query(&format!(
            "{} WHERE from_address = ? OR to_address = ? ORDER BY created_at DESC, id LIMIT ? OFFSET ?",
            SELECT_COLUMNS
        ))
        .bind(address)
        .bind(address)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn update_status(&self, tx_id: &str, status: TransactionStatus) -> WalletResult<()> {
        let current = self
            .find_by_id(tx_id)
            .await?
            .ok_or_else(|| WalletError::Storage(format!("Transaction not found: {}", tx_id)))?;

        if !current.status.can_transition_to(&status) {
            return Err(WalletError::Storage(format!(
                "Invalid status transition {} -> {} for {}",
                current.status, status, tx_id
            )));
        }

        sqlx::query("UPDATE transactions SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(tx_id)
            .execute(&self.pool)
            .await?;

        tracing::debug!(tx_id, from = %current.status, to = %status, "Transaction status updated");
        Ok(())
    }
}
