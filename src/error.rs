//! 统一错误定义
//!
//! 发送流水线的每一步都返回 `WalletResult`，错误在本层被分类，
//! UI 根据 `code()` / `is_retryable()` 决定是否提供重试入口。

use thiserror::Error;

use crate::infrastructure::biometric::BiometricAvailability;

pub type WalletResult<T> = Result<T, WalletError>;

#[derive(Debug, Clone, Error)]
pub enum WalletError {
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 发送流水线错误
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    #[error("Invalid {chain} address: {address}")]
    InvalidAddress { chain: String, address: String },

    #[error("No active wallet")]
    NoActiveWallet,

    #[error("Active wallet has no active chain for this operation")]
    NoActiveChain,

    #[error("Unknown chain: {0}")]
    UnknownChain(String),

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: u64, available: u64 },

    #[error("Authentication canceled")]
    AuthenticationCanceled,

    #[error("Authentication locked out")]
    AuthenticationLockout,

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Crypto operation failed: {0}")]
    CryptoOperationFailed(String),

    #[error("Simulation failed: {0}")]
    SimulationFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 钱包生命周期 / 基础设施错误
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    #[error("Invalid mnemonic phrase")]
    InvalidMnemonic,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Chain does not support native transfers yet: {0}")]
    ChainNotSupported(String),

    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    #[error("Biometric authentication unavailable: {0:?}")]
    BiometricUnavailable(BiometricAvailability),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl WalletError {
    /// 稳定的错误码（用于 UI / 日志聚合）
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidAddress { .. } => "invalid_address",
            Self::NoActiveWallet => "no_active_wallet",
            Self::NoActiveChain => "no_active_chain",
            Self::UnknownChain(_) => "unknown_chain",
            Self::InsufficientBalance { .. } => "insufficient_balance",
            Self::AuthenticationCanceled => "authentication_canceled",
            Self::AuthenticationLockout => "authentication_lockout",
            Self::AuthenticationFailed(_) => "authentication_failed",
            Self::CryptoOperationFailed(_) => "crypto_operation_failed",
            Self::SimulationFailed(_) => "simulation_failed",
            Self::NetworkError(_) => "network_error",
            Self::InvalidMnemonic => "invalid_mnemonic",
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidAmount(_) => "invalid_amount",
            Self::ChainNotSupported(_) => "chain_not_supported",
            Self::WalletNotFound(_) => "wallet_not_found",
            Self::BiometricUnavailable(_) => "biometric_unavailable",
            Self::Storage(_) => "storage_error",
            Self::Config(_) => "config_error",
        }
    }

    /// 用户可以直接重新发起整个流程的错误
    ///
    /// `AuthenticationLockout` 与 `CryptoOperationFailed` 不可在同一次尝试中重试。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed(_) | Self::NetworkError(_) | Self::SimulationFailed(_)
        )
    }

    /// 生物识别相关错误是用户/设备状态，不是程序错误
    pub fn is_authentication_error(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationCanceled
                | Self::AuthenticationLockout
                | Self::AuthenticationFailed(_)
                | Self::BiometricUnavailable(_)
        )
    }

    /// 面向用户的提示文案
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidAddress { .. } => "收款地址格式不正确，请检查后重试".to_string(),
            Self::NoActiveWallet => "请先创建或导入钱包".to_string(),
            Self::NoActiveChain => "请先选择要使用的链".to_string(),
            Self::InvalidInput(msg) => format!("输入有误：{}", msg),
            Self::InsufficientBalance { .. } => "余额不足以支付转账金额和网络手续费".to_string(),
            Self::AuthenticationCanceled => "已取消身份验证".to_string(),
            Self::AuthenticationLockout => "验证失败次数过多，生物识别已被锁定".to_string(),
            Self::AuthenticationFailed(_) => "身份验证失败，请重试".to_string(),
            Self::CryptoOperationFailed(_) => {
                "安全密钥不可用，请重新验证身份后再试".to_string()
            }
            // 网络返回的信息直接透传给用户
            Self::SimulationFailed(msg) | Self::NetworkError(msg) if !msg.is_empty() => {
                msg.clone()
            }
            Self::SimulationFailed(_) => "交易模拟失败".to_string(),
            Self::NetworkError(_) => "网络错误，请检查网络连接后重试".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<sqlx::Error> for WalletError {
    fn from(e: sqlx::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<reqwest::Error> for WalletError {
    fn from(e: reqwest::Error) -> Self {
        Self::NetworkError(e.to_string())
    }
}
