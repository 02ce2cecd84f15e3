//! 网络环境定义

use std::fmt;

use serde::{Deserialize, Serialize};

/// 网络环境（主网 / 开发网 / 测试网）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkEnvironment {
    Mainnet,
    #[default]
    Devnet,
    Testnet,
}

impl NetworkEnvironment {
    pub const ALL: [NetworkEnvironment; 3] = [Self::Mainnet, Self::Devnet, Self::Testnet];

    /// 偏好存储中使用的字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Devnet => "devnet",
            Self::Testnet => "testnet",
        }
    }

    /// 严格解析，无法识别返回 None
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "mainnet" => Some(Self::Mainnet),
            "devnet" => Some(Self::Devnet),
            "testnet" => Some(Self::Testnet),
            _ => None,
        }
    }

    /// 从持久化偏好加载：缺失或无法识别时回落到 devnet
    pub fn from_preference(value: Option<&str>) -> Self {
        value.and_then(Self::parse).unwrap_or_default()
    }
}

impl fmt::Display for NetworkEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
