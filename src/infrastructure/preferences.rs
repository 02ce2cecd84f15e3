//! 偏好设置存储
//!
//! 键值对偏好（例如 `selected_network`），文件实现以 JSON 持久化。

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{WalletError, WalletResult};

/// 当前网络环境的偏好键
pub const SELECTED_NETWORK_KEY: &str = "selected_network";

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get(&self, key: &str) -> WalletResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> WalletResult<()>;
}

/// JSON 文件偏好存储
pub struct FilePreferenceStore {
    path: PathBuf,
    cache: RwLock<HashMap<String, String>>,
}

impl FilePreferenceStore {
    /// 打开偏好文件；文件不存在时视为空
    ///
    /// 文件损坏同样视为空，所有键回到默认值。
    pub async fn open(path: impl AsRef<Path>) -> WalletResult<Self> {
        let path = path.as_ref().to_path_buf();

        let values = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Preferences file is corrupt, ignoring");
                HashMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(WalletError::Storage(format!(
                    "Failed to read preferences {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        Ok(Self {
            path,
            cache: RwLock::new(values),
        })
    }
}

#[async_trait]
impl PreferenceStore for FilePreferenceStore {
    async fn get(&self, key: &str) -> WalletResult<Option<String>> {
        Ok(self.cache.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> WalletResult<()> {
        let mut cache = self.cache.write().await;

        let mut updated = cache.clone();
        updated.insert(key.to_string(), value.to_string());

        let bytes = serde_json::to_vec_pretty(&updated)
            .map_err(|e| WalletError::Storage(format!("Failed to encode preferences: {}", e)))?;

        // 先写临时文件再重命名，避免写一半的文件
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| WalletError::Storage(format!("Failed to write preferences: {}", e)))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| WalletError::Storage(format!("Failed to write preferences: {}", e)))?;

        // 持久化成功后才更新内存
        *cache = updated;
        Ok(())
    }
}

/// 内存偏好存储
#[derive(Default)]
pub struct MemoryPreferenceStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(key: &str, value: &str) -> Self {
        let mut values = HashMap::new();
        values.insert(key.to_string(), value.to_string());
        Self {
            values: RwLock::new(values),
        }
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn get(&self, key: &str) -> WalletResult<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> WalletResult<()> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
