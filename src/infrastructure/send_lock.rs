//! 按钱包串行化发送
//!
//! 同一钱包的两次发送（例如双击发送按钮）不能并发读取余额和 blockhash。
//! 每个钱包 id 对应一把异步互斥锁，后来者排队等待。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// 发送锁守卫（超出作用域自动释放）
pub struct SendLockGuard {
    wallet_id: String,
    acquired_at: Instant,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for SendLockGuard {
    fn drop(&mut self) {
        tracing::debug!(
            wallet_id = %self.wallet_id,
            held_ms = self.acquired_at.elapsed().as_millis() as u64,
            "Released send lock"
        );
    }
}

#[derive(Default)]
pub struct WalletSendLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl WalletSendLocks {
    pub fn new() -> Self {
        Self::default()
    }

    async fn lock_for(&self, wallet_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        // 清理没有持有者的锁，防止表无限增长
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry(wallet_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// 获取钱包的发送锁（等待直到前一次发送结束）
    pub async fn acquire(&self, wallet_id: &str) -> SendLockGuard {
        let lock = self.lock_for(wallet_id).await;
        let start = Instant::now();
        let guard = lock.lock_owned().await;

        tracing::debug!(
            wallet_id = %wallet_id,
            waited_ms = start.elapsed().as_millis() as u64,
            "Acquired send lock"
        );

        SendLockGuard {
            wallet_id: wallet_id.to_string(),
            acquired_at: Instant::now(),
            _guard: guard,
        }
    }

    /// 非阻塞获取；已有发送进行中时返回 None
    pub async fn try_acquire(&self, wallet_id: &str) -> Option<SendLockGuard> {
        let lock = self.lock_for(wallet_id).await;
        let guard = lock.try_lock_owned().ok()?;
        Some(SendLockGuard {
            wallet_id: wallet_id.to_string(),
            acquired_at: Instant::now(),
            _guard: guard,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_same_wallet_is_exclusive() {
        let locks = WalletSendLocks::new();

        let guard = locks.acquire("w1").await;
        assert!(locks.try_acquire("w1").await.is_none());
        // 其他钱包不受影响
        assert!(locks.try_acquire("w2").await.is_some());

        drop(guard);
        assert!(locks.try_acquire("w1").await.is_some());
    }

    #[tokio::test]
    async fn test_waiter_proceeds_after_release() {
        let locks = Arc::new(WalletSendLocks::new());
        let guard = locks.acquire("w1").await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire("w1").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
