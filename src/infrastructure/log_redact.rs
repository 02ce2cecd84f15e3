//! 日志脱敏
//! 地址、签名只显示前后缀；种子、助记词、私钥、密文从不进入日志

use serde::Serialize;

use crate::service::send_service::SendRequest;

/// 可脱敏trait
pub trait SensitiveRedact {
    fn redact(&self) -> String;
}

/// 脱敏十六进制字符串（显示前缀和后缀）
pub fn redact_hex_string(hex: &str, show_chars: usize) -> String {
    if hex.len() <= show_chars * 2 {
        return "*".repeat(hex.len());
    }

    let prefix = &hex[..show_chars];
    let suffix = &hex[hex.len() - show_chars..];
    format!("{}...{}", prefix, suffix)
}

/// 脱敏地址（显示前6位和后4位）
pub fn redact_address(address: &str) -> String {
    if address.len() < 10 || !address.is_ascii() {
        return "*".repeat(address.chars().count());
    }

    let prefix = &address[..6];
    let suffix = &address[address.len() - 4..];
    format!("{}...{}", prefix, suffix)
}

/// 脱敏交易签名（base58，前后各 8 位）
pub fn redact_signature(signature: &str) -> String {
    if !signature.is_ascii() {
        return "***".to_string();
    }
    redact_hex_string(signature, 8)
}

/// 发送请求脱敏
#[derive(Debug, Serialize)]
struct RedactedSendRequest<'a> {
    chain_id: &'a str,
    recipient: String,
    amount: String,
}

impl SensitiveRedact for SendRequest {
    fn redact(&self) -> String {
        serde_json::to_string(&RedactedSendRequest {
            chain_id: &self.chain_id,
            recipient: redact_address(&self.recipient),
            amount: self.amount.to_string(),
        })
        .unwrap_or_else(|_| "{ redacted }".to_string())
    }
}
