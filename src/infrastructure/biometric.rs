//! 生物识别门禁
//!
//! 把平台的回调式用户在场验证桥接为可取消的异步操作。
//!
//! 每次验证的状态机：
//! `Idle → Prompted → {Succeeded | Canceled | Lockout | Failed}`，
//! 未识别（`NotRecognized`）回到 `Prompted` 继续等待用户重试。
//!
//! 成功验证后签发 [`AuthToken`]，这是创建加解密 cipher 的唯一凭据；
//! 令牌只能由本模块构造，因此 cipher 在结构上不可能先于验证成功被创建。

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{WalletError, WalletResult};

/// 设备生物识别能力
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BiometricAvailability {
    Available,
    NoHardware,
    HardwareUnavailable,
    NotEnrolled,
    SecurityUpdateRequired,
    Unknown,
}

impl BiometricAvailability {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }
}

/// 提示框配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptConfig {
    pub title: String,
    pub subtitle: Option<String>,
    pub negative_button_text: String,
}

impl PromptConfig {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: None,
            negative_button_text: "取消".to_string(),
        }
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    pub fn confirm_transaction() -> Self {
        Self::new("确认交易").with_subtitle("验证身份以签名并发送交易")
    }

    pub fn protect_wallet() -> Self {
        Self::new("保护钱包").with_subtitle("验证身份以加密保存助记词")
    }

    pub fn reveal_mnemonic() -> Self {
        Self::new("查看助记词").with_subtitle("验证身份以显示助记词")
    }
}

/// 前台界面上下文
///
/// 每次需要弹出提示时显式传入，组件上不保存"当前界面"。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContext {
    pub surface_id: String,
}

impl PromptContext {
    pub fn new(surface_id: impl Into<String>) -> Self {
        Self {
            surface_id: surface_id.into(),
        }
    }
}

/// 平台回调事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    /// 识别成功
    Recognized,
    /// 未识别（提示框仍在，用户可以重试）
    NotRecognized,
    /// 用户或系统取消
    Canceled,
    /// 失败次数过多被锁定
    Lockout,
    /// 其他平台错误（提示框已关闭）
    Error(String),
}

/// 一个正在显示的平台提示框
pub trait PromptSession: Send {
    /// 同步关闭提示框
    fn dismiss(&mut self);
}

/// 平台生物识别接口
pub trait BiometricPlatform: Send + Sync {
    /// 纯能力查询
    fn availability(&self) -> BiometricAvailability;

    /// 在给定界面上弹出提示框，事件通过 `events` 回调
    fn show_prompt(
        &self,
        context: &PromptContext,
        config: &PromptConfig,
        events: mpsc::UnboundedSender<PlatformEvent>,
    ) -> WalletResult<Box<dyn PromptSession>>;
}

/// 单次验证的状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Idle,
    Prompted,
    Succeeded,
    Canceled,
    Lockout,
    Failed(String),
}

impl AuthState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Canceled | Self::Lockout | Self::Failed(_)
        )
    }

    /// 状态转移
    ///
    /// `NotRecognized` 只在 `Prompted` 内循环；终态不再接受事件。
    pub fn on_event(self, event: &PlatformEvent) -> AuthState {
        match (self, event) {
            (Self::Prompted, PlatformEvent::Recognized) => Self::Succeeded,
            (Self::Prompted, PlatformEvent::NotRecognized) => Self::Prompted,
            (Self::Prompted, PlatformEvent::Canceled) => Self::Canceled,
            (Self::Prompted, PlatformEvent::Lockout) => Self::Lockout,
            (Self::Prompted, PlatformEvent::Error(msg)) => Self::Failed(msg.clone()),
            (state, _) => state,
        }
    }
}

/// 验证结果
#[derive(Debug)]
pub enum AuthOutcome {
    Succeeded(AuthToken),
    Canceled,
    Lockout,
    /// 可重试的失败
    Failed(String),
}

impl AuthOutcome {
    /// 转为流水线错误类型
    pub fn into_token(self) -> WalletResult<AuthToken> {
        match self {
            Self::Succeeded(token) => Ok(token),
            Self::Canceled => Err(WalletError::AuthenticationCanceled),
            Self::Lockout => Err(WalletError::AuthenticationLockout),
            Self::Failed(reason) => Err(WalletError::AuthenticationFailed(reason)),
        }
    }
}

/// 验证成功凭据
///
/// 不可克隆、不可在本模块外构造，并带有效期。
pub struct AuthToken {
    attempt_id: u64,
    issued_at: Instant,
    ttl: Duration,
}

impl AuthToken {
    fn issue(attempt_id: u64, ttl: Duration) -> Self {
        Self {
            attempt_id,
            issued_at: Instant::now(),
            ttl,
        }
    }

    pub fn attempt_id(&self) -> u64 {
        self.attempt_id
    }

    pub fn is_expired(&self) -> bool {
        self.issued_at.elapsed() > self.ttl
    }

    #[cfg(test)]
    pub(crate) fn for_tests(ttl: Duration) -> Self {
        Self::issue(0, ttl)
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("attempt_id", &self.attempt_id)
            .field("expired", &self.is_expired())
            .finish()
    }
}

/// 任务被取消（future 被丢弃）时关闭仍在显示的提示框
struct PromptGuard {
    session: Box<dyn PromptSession>,
    live: bool,
}

impl PromptGuard {
    /// 平台已自行关闭提示框
    fn closed_by_platform(&mut self) {
        self.live = false;
    }
}

impl Drop for PromptGuard {
    fn drop(&mut self) {
        if self.live {
            self.session.dismiss();
        }
    }
}

/// 生物识别门禁配置
#[derive(Debug, Clone)]
pub struct BiometricGateConfig {
    /// 验证成功后凭据的有效期
    pub token_ttl: Duration,
    /// 单次验证内允许的未识别次数
    pub max_not_recognized: u32,
}

impl Default for BiometricGateConfig {
    fn default() -> Self {
        Self {
            token_ttl: Duration::from_secs(30),
            max_not_recognized: 5,
        }
    }
}

/// 生物识别门禁
pub struct BiometricGate {
    platform: Arc<dyn BiometricPlatform>,
    config: BiometricGateConfig,
    next_attempt: AtomicU64,
}

impl BiometricGate {
    pub fn new(platform: Arc<dyn BiometricPlatform>, config: BiometricGateConfig) -> Self {
        Self {
            platform,
            config,
            next_attempt: AtomicU64::new(1),
        }
    }

    /// 能力查询，无副作用
    pub fn check_availability(&self) -> BiometricAvailability {
        self.platform.availability()
    }

    /// 发起一次验证
    ///
    /// 调用方挂起直到用户响应；丢弃返回的 future 会立即关闭提示框。
    pub async fn authenticate(
        &self,
        context: &PromptContext,
        config: &PromptConfig,
    ) -> WalletResult<AuthOutcome> {
        let availability = self.check_availability();
        if !availability.is_available() {
            tracing::warn!(?availability, "Biometric authentication unavailable");
            return Err(WalletError::BiometricUnavailable(availability));
        }

        let attempt_id = self.next_attempt.fetch_add(1, Ordering::Relaxed);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let session = self.platform.show_prompt(context, config, tx)?;
        let mut guard = PromptGuard {
            session,
            live: true,
        };
        let mut state = AuthState::Prompted;
        let mut not_recognized = 0u32;

        tracing::debug!(
            attempt_id,
            surface = %context.surface_id,
            "Biometric prompt shown"
        );

        while !state.is_terminal() {
            let Some(event) = rx.recv().await else {
                // 平台丢失了回调通道
                guard.closed_by_platform();
                state = AuthState::Failed("Biometric prompt closed unexpectedly".to_string());
                break;
            };

            if event == PlatformEvent::NotRecognized {
                not_recognized += 1;
                tracing::debug!(attempt_id, not_recognized, "Biometric not recognized");
                if not_recognized >= self.config.max_not_recognized {
                    // 由 guard 关闭提示框
                    state = AuthState::Failed("Biometric not recognized".to_string());
                    break;
                }
            } else {
                guard.closed_by_platform();
            }

            state = state.on_event(&event);
        }
        drop(guard);

        tracing::info!(attempt_id, state = ?state, "Biometric authentication finished");

        Ok(match state {
            AuthState::Succeeded => {
                AuthOutcome::Succeeded(AuthToken::issue(attempt_id, self.config.token_ttl))
            }
            AuthState::Canceled => AuthOutcome::Canceled,
            AuthState::Lockout => AuthOutcome::Lockout,
            AuthState::Failed(reason) => AuthOutcome::Failed(reason),
            // 循环只在终态退出
            AuthState::Idle | AuthState::Prompted => {
                AuthOutcome::Failed("Biometric prompt ended without result".to_string())
            }
        })
    }

    /// 验证成功后在续延中执行受保护操作
    ///
    /// 凭据只在成功分支中被移交给 `on_success`，因此 cipher 只能在这里创建。
    pub async fn authenticate_with<T, F, Fut>(
        &self,
        context: &PromptContext,
        config: &PromptConfig,
        on_success: F,
    ) -> WalletResult<T>
    where
        F: FnOnce(AuthToken) -> Fut,
        Fut: std::future::Future<Output = WalletResult<T>>,
    {
        let token = self.authenticate(context, config).await?.into_token()?;
        on_success(token).await
    }
}
