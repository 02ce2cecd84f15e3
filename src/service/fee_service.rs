//! 手续费计算
//!
//! Solana 费用 = 基础费（每个签名）+ 优先费（计算单元上限 × 单价 / 10^6，向上取整）

use serde::{Deserialize, Serialize};

use crate::config::FeesConfig;
use crate::error::{WalletError, WalletResult};

const MICRO_LAMPORTS_PER_LAMPORT: u128 = 1_000_000;

/// 单笔交易的费用预算
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeEstimate {
    pub base_fee: u64,
    pub priority_fee: u64,
    pub compute_unit_limit: u32,
    pub compute_unit_price_micro_lamports: u64,
}

impl FeeEstimate {
    pub fn total(&self) -> u64 {
        self.base_fee.saturating_add(self.priority_fee)
    }
}

pub struct FeeService {
    config: FeesConfig,
}

impl FeeService {
    pub fn new(config: FeesConfig) -> Self {
        Self { config }
    }

    /// 估算费用
    pub fn estimate(&self, signatures: u32) -> FeeEstimate {
        let priority = (u128::from(self.config.compute_unit_limit)
            * u128::from(self.config.compute_unit_price_micro_lamports))
        .div_ceil(MICRO_LAMPORTS_PER_LAMPORT);

        FeeEstimate {
            base_fee: self
                .config
                .base_fee_lamports
                .saturating_mul(u64::from(signatures)),
            priority_fee: u64::try_from(priority).unwrap_or(u64::MAX),
            compute_unit_limit: self.config.compute_unit_limit,
            compute_unit_price_micro_lamports: self.config.compute_unit_price_micro_lamports,
        }
    }

    /// 转账所需余额 = 金额 + 全部费用
    pub fn required_balance(&self, amount: u64, fee: &FeeEstimate) -> WalletResult<u64> {
        amount
            .checked_add(fee.base_fee)
            .and_then(|v| v.checked_add(fee.priority_fee))
            .ok_or_else(|| WalletError::InvalidAmount(format!("Amount overflows: {}", amount)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_fees() -> FeesConfig {
        FeesConfig {
            base_fee_lamports: 5_000,
            compute_unit_limit: 200_000,
            compute_unit_price_micro_lamports: 250_000,
        }
    }

    #[test]
    fn test_default_policy() {
        let service = FeeService::new(default_fees());
        let fee = service.estimate(1);

        assert_eq!(fee.base_fee, 5_000);
        assert_eq!(fee.priority_fee, 50_000);
        assert_eq!(
            service.required_balance(1_500_000_000, &fee).unwrap(),
            1_500_055_000
        );
    }

    #[test]
    fn test_priority_fee_rounds_up() {
        let service = FeeService::new(FeesConfig {
            base_fee_lamports: 5_000,
            compute_unit_limit: 3,
            compute_unit_price_micro_lamports: 1,
        });
        assert_eq!(service.estimate(1).priority_fee, 1);
        assert_eq!(service.estimate(2).base_fee, 10_000);
    }

    #[test]
    fn test_required_balance_overflow() {
        let service = FeeService::new(default_fees());
        let fee = service.estimate(1);
        assert!(matches!(
            service.required_balance(u64::MAX, &fee),
            Err(WalletError::InvalidAmount(_))
        ));
    }
}
