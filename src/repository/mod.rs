// Repository 抽象层
pub mod transaction_repository;
pub mod wallet_repository;

pub use transaction_repository::{SqliteTransactionRepository, TransactionRepository};
pub use wallet_repository::{SqliteWalletRepository, WalletRepository};
