//! 金额换算
//!
//! 原生单位（SOL / ETH / BTC）与最小单位（lamports / wei / sats）之间的精确换算。

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::{WalletError, WalletResult};

/// 原生单位 → 最小单位
///
/// 拒绝零、负数以及超出链精度的小数位。
pub fn to_base_units(amount: Decimal, decimals: u32) -> WalletResult<u64> {
    if amount <= Decimal::ZERO {
        return Err(WalletError::InvalidAmount(format!(
            "Amount must be positive: {}",
            amount
        )));
    }

    if amount.normalize().scale() > decimals {
        return Err(WalletError::InvalidAmount(format!(
            "Amount {} exceeds {} decimal places",
            amount, decimals
        )));
    }

    let factor = 10u64
        .checked_pow(decimals)
        .map(Decimal::from)
        .ok_or_else(|| WalletError::InvalidAmount(format!("Unsupported decimals: {}", decimals)))?;

    amount
        .checked_mul(factor)
        .and_then(|units| units.to_u64())
        .ok_or_else(|| WalletError::InvalidAmount(format!("Amount too large: {}", amount)))
}

/// 最小单位 → 原生单位
pub fn from_base_units(units: u64, decimals: u32) -> Decimal {
    Decimal::from_i128_with_scale(units as i128, decimals).normalize()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_sol_to_lamports() {
        let amount = Decimal::from_str("1.5").unwrap();
        assert_eq!(to_base_units(amount, 9).unwrap(), 1_500_000_000);

        let amount = Decimal::from_str("0.000000001").unwrap();
        assert_eq!(to_base_units(amount, 9).unwrap(), 1);
    }

    #[test]
    fn test_rejects_invalid_amounts() {
        assert!(to_base_units(Decimal::ZERO, 9).is_err());
        assert!(to_base_units(Decimal::from_str("-1").unwrap(), 9).is_err());
        assert!(to_base_units(Decimal::from_str("0.0000000001").unwrap(), 9).is_err());
    }

    #[test]
    fn test_trailing_zeros_are_not_precision() {
        let amount = Decimal::from_str("1.50000000000").unwrap();
        assert_eq!(to_base_units(amount, 9).unwrap(), 1_500_000_000);
    }

    #[test]
    fn test_from_base_units() {
        assert_eq!(
            from_base_units(2_000_000_000, 9),
            Decimal::from_str("2").unwrap()
        );
        assert_eq!(
            from_base_units(1_234, 8),
            Decimal::from_str("0.00001234").unwrap()
        );
    }
}
