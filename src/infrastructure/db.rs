//! SQLx SQLite 连接池初始化与表结构
//!
//! 用法：
//! let pool = init_pool(&config.storage.database_url).await?;
//! health_check(&pool).await?;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

pub type DbPool = sqlx::SqlitePool;

/// 初始化连接池并建表
///
/// `sqlite::memory:` 每个连接都是独立的数据库，因此内存库只保留一个连接。
pub async fn init_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let in_memory = database_url.contains(":memory:");

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(if in_memory { 1 } else { 8 })
        .acquire_timeout(Duration::from_secs(5))
        // 内存库的连接一旦回收，数据就丢了
        .idle_timeout(if in_memory { None } else { Some(Duration::from_secs(300)) })
        .max_lifetime(if in_memory { None } else { Some(Duration::from_secs(1800)) })
        .connect_with(options)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to open wallet database");
            e
        })?;

    init_schema(&pool).await?;
    health_check(&pool).await?;

    Ok(pool)
}

/// 建表（幂等）
pub async fn init_schema(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS wallets (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            account_index INTEGER NOT NULL,
            encrypted_seed BLOB NOT NULL,
            encrypted_mnemonic BLOB NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chain_wallets (
            wallet_id TEXT NOT NULL REFERENCES wallets(id) ON DELETE CASCADE,
            chain_id TEXT NOT NULL,
            chain_type TEXT NOT NULL,
            address TEXT NOT NULL,
            public_key TEXT NOT NULL,
            derivation_path TEXT NOT NULL,
            balance TEXT NOT NULL DEFAULT '0',
            is_active INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (wallet_id, chain_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            wallet_id TEXT NOT NULL,
            chain_id TEXT NOT NULL,
            from_address TEXT NOT NULL,
            to_address TEXT NOT NULL,
            amount TEXT NOT NULL,
            base_fee INTEGER NOT NULL,
            priority_fee INTEGER NOT NULL,
            signature TEXT,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_transactions_from ON transactions(from_address)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_transactions_to ON transactions(to_address)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_transactions_signature ON transactions(signature)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// 健康检查：执行 SELECT 1
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_pool_initializes_schema() {
        let pool = init_pool("sqlite::memory:").await.unwrap();
        // 重复建表不报错
        init_schema(&pool).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM wallets")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
