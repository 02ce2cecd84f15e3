pub mod fee_service;
pub mod send_service;
pub mod transaction_builder;
pub mod wallet_service;

pub use fee_service::{FeeEstimate, FeeService};
pub use send_service::{SendRequest, TransactionOrchestrator};
pub use transaction_builder::{SignedTransaction, SolanaTransactionBuilder};
pub use wallet_service::{CreatedWallet, WalletService};
