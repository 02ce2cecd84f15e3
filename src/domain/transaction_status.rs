//! 交易状态与交易记录

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 交易状态机
///
/// 提交成功时创建为 `Pending`，之后只由确认轮询流程推进。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// 交易已广播到节点，等待上链
    Pending,

    /// 交易已确认
    Confirmed,

    /// 交易失败（链上执行失败或过期）
    Failed,
}

impl TransactionStatus {
    /// 获取状态描述
    pub fn description(&self) -> &'static str {
        match self {
            Self::Pending => "交易待确认",
            Self::Confirmed => "交易已确认",
            Self::Failed => "交易失败",
        }
    }

    /// 是否为最终状态（不可再转换）
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }

    /// 验证状态转换合法性
    pub fn can_transition_to(&self, target: &Self) -> bool {
        use TransactionStatus::*;

        match (self, target) {
            (Pending, Confirmed) | (Pending, Failed) => true,
            // 相同状态（幂等）
            (a, b) if a == b => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 已提交交易的记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: String,
    pub wallet_id: String,
    pub chain_id: String,
    pub from_address: String,
    pub to_address: String,
    /// 原生单位金额（例如 SOL）
    pub amount: Decimal,
    /// 基础手续费（最小单位）
    pub base_fee: u64,
    /// 优先费（最小单位）
    pub priority_fee: u64,
    /// 网络返回的交易签名
    pub signature: Option<String>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn total_fee(&self) -> u64 {
        self.base_fee.saturating_add(self.priority_fee)
    }
}
