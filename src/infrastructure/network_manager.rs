//! 网络环境管理
//!
//! 进程级当前网络：启动时从偏好加载一次，只能通过 `switch_network` 修改。
//! 订阅者通过 watch 通道获得当前值与变更通知。

use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use crate::domain::network::NetworkEnvironment;
use crate::error::WalletResult;
use crate::infrastructure::preferences::{PreferenceStore, SELECTED_NETWORK_KEY};

pub struct NetworkManager {
    prefs: Arc<dyn PreferenceStore>,
    current: watch::Sender<NetworkEnvironment>,
    /// 串行化切换，保证持久化顺序与内存顺序一致
    switch_lock: Mutex<()>,
}

impl NetworkManager {
    /// 从偏好加载当前网络（缺失或无法识别时为 devnet）
    pub async fn load(prefs: Arc<dyn PreferenceStore>) -> WalletResult<Self> {
        let stored = prefs.get(SELECTED_NETWORK_KEY).await?;
        let network = NetworkEnvironment::from_preference(stored.as_deref());

        tracing::info!(
            network = %network,
            stored = ?stored,
            "Network environment loaded"
        );

        let (current, _) = watch::channel(network);
        Ok(Self {
            prefs,
            current,
            switch_lock: Mutex::new(()),
        })
    }

    /// 当前网络（每次构造 RPC 客户端时读取）
    pub fn current_network(&self) -> NetworkEnvironment {
        *self.current.borrow()
    }

    /// 订阅网络变更
    pub fn subscribe(&self) -> watch::Receiver<NetworkEnvironment> {
        self.current.subscribe()
    }

    /// 切换网络：先持久化，成功后再更新内存并通知订阅者
    ///
    /// 已构造的客户端不受影响，下一次构造时生效。
    pub async fn switch_network(&self, network: NetworkEnvironment) -> WalletResult<()> {
        let _guard = self.switch_lock.lock().await;

        let previous = self.current_network();
        self.prefs
            .set(SELECTED_NETWORK_KEY, network.as_str())
            .await?;

        self.current.send_replace(network);

        tracing::info!(from = %previous, to = %network, "Network environment switched");
        Ok(())
    }
}
