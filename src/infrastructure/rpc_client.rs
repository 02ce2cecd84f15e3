//! 链 RPC 客户端与工厂
//!
//! 工厂每次调用都重新读取当前网络并构造新的客户端，不做跨调用缓存，
//! 切换网络后下一笔交易立即使用新端点。已构造的客户端绑定固定 URL。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::chain_config::{ChainRegistry, ChainType};
use crate::error::{WalletError, WalletResult};
use crate::infrastructure::network_manager::NetworkManager;

/// 交易模拟结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub will_succeed: bool,
    pub error_message: Option<String>,
    pub logs: Vec<String>,
}

impl SimulationResult {
    pub fn success() -> Self {
        Self {
            will_succeed: true,
            error_message: None,
            logs: Vec::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            will_succeed: false,
            error_message: Some(message.into()),
            logs: Vec::new(),
        }
    }
}

/// 每条链客户端需要提供的 RPC 能力
#[async_trait]
pub trait ChainRpcClient: Send + Sync {
    /// 客户端绑定的端点
    fn endpoint(&self) -> &str;

    /// 余额（最小单位）
    async fn get_balance(&self, address: &str) -> WalletResult<u64>;

    /// 交易新鲜度锚点
    async fn get_latest_blockhash(&self) -> WalletResult<String>;

    async fn simulate_transaction(&self, serialized: &[u8]) -> WalletResult<SimulationResult>;

    /// 提交交易，返回网络签名
    async fn send_transaction(&self, serialized: &[u8]) -> WalletResult<String>;
}

/// RPC 客户端工厂
#[async_trait]
pub trait RpcClientFactory: Send + Sync {
    /// 按链 id 在当前网络上构造客户端
    async fn create_client(&self, chain_id: &str) -> WalletResult<Arc<dyn ChainRpcClient>>;
}

/// RPC 传输设置
#[derive(Debug, Clone)]
pub struct RpcSettings {
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub commitment: String,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            commitment: "confirmed".to_string(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Solana JSON-RPC 客户端
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct SolanaRpcClient {
    http_client: reqwest::Client,
    url: String,
    commitment: String,
}

impl SolanaRpcClient {
    pub fn new(http_client: reqwest::Client, url: impl Into<String>, commitment: impl Into<String>) -> Self {
        Self {
            http_client,
            url: url.into(),
            commitment: commitment.into(),
        }
    }

    async fn call(&self, method: &str, params: Value) -> WalletResult<Value> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        tracing::debug!(method, endpoint = %self.url, "Solana RPC request");

        let response = self
            .http_client
            .post(&self.url)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(WalletError::NetworkError(format!(
                "Solana RPC {} returned HTTP {}",
                method, status
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            WalletError::NetworkError(format!("Failed to parse Solana RPC response: {}", e))
        })?;

        parse_rpc_result(method, body)
    }

    fn encode(serialized: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(serialized)
    }
}

/// 拆出 JSON-RPC 的 result，error 字段转为网络错误并保留原消息
fn parse_rpc_result(method: &str, mut body: Value) -> WalletResult<Value> {
    if let Some(error) = body.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(WalletError::NetworkError(message));
    }

    match body.get_mut("result") {
        Some(result) => Ok(result.take()),
        None => Err(WalletError::NetworkError(format!(
            "Missing result in Solana RPC response for {}",
            method
        ))),
    }
}

/// 把模拟返回的 `err` 字段转成可读文本
///
/// 字符串原样返回；结构化错误优先取最后一条 "Program log" 日志。
fn describe_simulation_error(err: &Value, logs: &[String]) -> String {
    if let Some(text) = err.as_str() {
        return text.to_string();
    }
    logs.iter()
        .rev()
        .find_map(|line| line.strip_prefix("Program log: "))
        .map(str::to_string)
        .unwrap_or_else(|| err.to_string())
}

fn parse_simulation(result: &Value) -> WalletResult<SimulationResult> {
    let value = result.get("value").ok_or_else(|| {
        WalletError::NetworkError("Missing value in simulateTransaction response".to_string())
    })?;

    let logs: Vec<String> = value
        .get("logs")
        .and_then(Value::as_array)
        .map(|lines| {
            lines
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    match value.get("err") {
        None | Some(Value::Null) => Ok(SimulationResult {
            will_succeed: true,
            error_message: None,
            logs,
        }),
        Some(err) => Ok(SimulationResult {
            will_succeed: false,
            error_message: Some(describe_simulation_error(err, &logs)),
            logs,
        }),
    }
}

#[async_trait]
impl ChainRpcClient for SolanaRpcClient {
    fn endpoint(&self) -> &str {
        &self.url
    }

    async fn get_balance(&self, address: &str) -> WalletResult<u64> {
        let result = self
            .call(
                "getBalance",
                json!([address, { "commitment": self.commitment }]),
            )
            .await?;

        result
            .get("value")
            .and_then(Value::as_u64)
            .ok_or_else(|| WalletError::NetworkError("Invalid getBalance response".to_string()))
    }

    async fn get_latest_blockhash(&self) -> WalletResult<String> {
        let result = self
            .call(
                "getLatestBlockhash",
                json!([{ "commitment": self.commitment }]),
            )
            .await?;

        result
            .get("value")
            .and_then(|v| v.get("blockhash"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                WalletError::NetworkError("Invalid getLatestBlockhash response".to_string())
            })
    }

    async fn simulate_transaction(&self, serialized: &[u8]) -> WalletResult<SimulationResult> {
        let result = self
            .call(
                "simulateTransaction",
                json!([
                    Self::encode(serialized),
                    {
                        "encoding": "base64",
                        "commitment": self.commitment,
                        "sigVerify": true,
                    }
                ]),
            )
            .await?;

        parse_simulation(&result)
    }

    async fn send_transaction(&self, serialized: &[u8]) -> WalletResult<String> {
        let result = self
            .call(
                "sendTransaction",
                json!([
                    Self::encode(serialized),
                    {
                        "encoding": "base64",
                        "skipPreflight": false,
                        "preflightCommitment": self.commitment,
                    }
                ]),
            )
            .await?;

        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| WalletError::NetworkError("Invalid sendTransaction response".to_string()))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HTTP 工厂
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct HttpRpcClientFactory {
    registry: Arc<ChainRegistry>,
    network: Arc<NetworkManager>,
    http_client: reqwest::Client,
    settings: RpcSettings,
}

impl HttpRpcClientFactory {
    pub fn new(
        registry: Arc<ChainRegistry>,
        network: Arc<NetworkManager>,
        settings: RpcSettings,
    ) -> WalletResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .connect_timeout(settings.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| WalletError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            registry,
            network,
            http_client,
            settings,
        })
    }
}

#[async_trait]
impl RpcClientFactory for HttpRpcClientFactory {
    async fn create_client(&self, chain_id: &str) -> WalletResult<Arc<dyn ChainRpcClient>> {
        let config = self.registry.get_chain(chain_id)?;
        // 每次构造时读取，不缓存
        let network = self.network.current_network();
        let url = config.endpoint(network).to_string();

        tracing::debug!(chain = %config.id, network = %network, endpoint = %url, "Creating RPC client");

        match config.chain_type {
            ChainType::Solana => Ok(Arc::new(SolanaRpcClient::new(
                self.http_client.clone(),
                url,
                self.settings.commitment.clone(),
            ))),
            ChainType::Ethereum | ChainType::Bitcoin => {
                Err(WalletError::ChainNotSupported(config.id.clone()))
            }
        }
    }
}
