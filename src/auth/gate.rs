//! 会话门控：静默恢复 → 交互式登录的认证状态机
//!
//! SessionGate 是「当前是否已登录」的唯一真相来源：状态放在 watch 通道里，只有门控自己写，
//! 访问门控与 QueryOrchestrator 通过 `subscribe()` 只读。
//!
//! - `activate()`：仅在 Unknown 时进入 SilentlyAuthenticating 并调用静默登录，重入时为 no-op
//! - `login()`：Unauthenticated 下的交互式登录，失败原样返回，状态不变；同一时刻只弹一次登录
//! - `logout()`：无论提供方是否成功都回到 Unauthenticated

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::auth::{IdentityProvider, Session};
use crate::core::{AuthError, AuthState, Readiness};

/// 一次状态迁移（供进度展示 / 测试观察，watch 只保留最新值）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthTransition {
    pub from: AuthState,
    pub to: AuthState,
}

pub struct SessionGate {
    provider: Arc<dyn IdentityProvider>,
    state_tx: watch::Sender<AuthState>,
    event_tx: Option<mpsc::UnboundedSender<AuthTransition>>,
    login_in_flight: AtomicBool,
}

/// 交互式登录进行中标记；login 结束（或 future 被丢弃）时释放
struct LoginGuard<'a>(&'a AtomicBool);

impl Drop for LoginGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SessionGate {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        let (state_tx, _) = watch::channel(AuthState::Unknown);
        Self {
            provider,
            state_tx,
            event_tx: None,
            login_in_flight: AtomicBool::new(false),
        }
    }

    /// 附加状态迁移事件通道
    pub fn with_events(mut self, event_tx: mpsc::UnboundedSender<AuthTransition>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// 只读订阅当前认证状态
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> AuthState {
        self.state_tx.borrow().clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.state_tx.borrow().session().cloned()
    }

    /// 受保护功能是否可用（Ready 才放行）
    pub fn readiness(&self) -> Readiness {
        self.state_tx.borrow().readiness()
    }

    /// 激活：未缓存会话时尝试静默登录。失败只记日志，门控落到 Unauthenticated。
    pub async fn activate(&self) {
        let mut previous = AuthState::Unknown;
        let started = self.state_tx.send_if_modified(|state| {
            if *state == AuthState::Unknown {
                previous = std::mem::replace(state, AuthState::SilentlyAuthenticating);
                true
            } else {
                false
            }
        });
        if !started {
            tracing::debug!(
                "Activation ignored, auth state is {}",
                self.state_tx.borrow().label()
            );
            return;
        }
        self.emit(previous, AuthState::SilentlyAuthenticating);
        tracing::info!("Attempting silent authentication");

        let next = match self.provider.try_silent_auth().await {
            Ok(Some(session)) => {
                tracing::info!(user_id = %session.user_id, "Silent authentication successful");
                AuthState::Authenticated(session)
            }
            Ok(None) => {
                tracing::info!("No session to recover, user will need to login manually");
                AuthState::Unauthenticated
            }
            Err(e) => {
                tracing::info!(
                    "Silent authentication failed, user will need to login manually: {}",
                    e
                );
                AuthState::Unauthenticated
            }
        };
        self.transition(next);
    }

    /// 交互式登录（用户显式操作触发）
    pub async fn login(&self) -> Result<Session, AuthError> {
        match self.state() {
            AuthState::Authenticated(session) => return Ok(session),
            AuthState::Unauthenticated => {}
            AuthState::Unknown | AuthState::SilentlyAuthenticating => {
                return Err(AuthError::NotReady)
            }
        }

        if self
            .login_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Login ignored, another interactive login is in progress");
            return Err(AuthError::LoginInProgress);
        }
        let _guard = LoginGuard(&self.login_in_flight);

        match self.provider.interactive_auth().await {
            Ok(session) => {
                tracing::info!(user_id = %session.user_id, "Interactive login successful");
                self.transition(AuthState::Authenticated(session.clone()));
                Ok(session)
            }
            Err(e) => {
                tracing::warn!("Interactive login failed: {}", e);
                Err(e)
            }
        }
    }

    /// 登出；提供方失败也要清掉本地状态，避免卡在过期的已登录用户上
    pub async fn logout(&self) {
        if !self.state_tx.borrow().is_authenticated() {
            tracing::debug!("Logout ignored, not authenticated");
            return;
        }
        if let Err(e) = self.provider.logout().await {
            tracing::warn!("Identity provider logout failed: {}", e);
        }
        self.transition(AuthState::Unauthenticated);
        tracing::info!("Logged out");
    }

    /// 外部通知会话失效
    pub fn invalidate(&self, reason: &str) {
        if !self.state_tx.borrow().is_authenticated() {
            return;
        }
        tracing::warn!("Session invalidated: {}", reason);
        self.transition(AuthState::Unauthenticated);
    }

    /// 与提供方核对：提供方已无会话时视为外部失效
    pub fn sync_with_provider(&self) {
        if self.state_tx.borrow().is_authenticated() && self.provider.current_session().is_none() {
            self.invalidate("identity provider reports no active session");
        }
    }

    fn transition(&self, next: AuthState) {
        let previous = self.state_tx.send_replace(next.clone());
        tracing::debug!("Auth state {} -> {}", previous.label(), next.label());
        self.emit(previous, next);
    }

    fn emit(&self, from: AuthState, to: AuthState) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(AuthTransition { from, to });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MockIdentityProvider;
    use tokio::sync::Notify;

    fn alice() -> Session {
        Session::new("u-alice", "Alice", "alice@example.com")
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<AuthTransition>) -> Vec<AuthTransition> {
        let mut out = Vec::new();
        while let Ok(t) = rx.try_recv() {
            out.push(t);
        }
        out
    }

    #[tokio::test]
    async fn test_silent_success_never_requires_login() {
        let provider = Arc::new(MockIdentityProvider::new().with_silent_session(alice()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let gate = SessionGate::new(provider.clone()).with_events(tx);

        assert_eq!(gate.readiness(), Readiness::Pending);
        gate.activate().await;

        assert_eq!(gate.readiness(), Readiness::Ready);
        assert_eq!(gate.state(), AuthState::Authenticated(alice()));
        assert_eq!(provider.interactive_call_count(), 0);
        let transitions = drain(&mut rx);
        assert_eq!(transitions.len(), 2);
        assert!(transitions
            .iter()
            .all(|t| t.to != AuthState::Unauthenticated));
    }

    #[tokio::test]
    async fn test_silent_failure_then_interactive_login() {
        let provider = Arc::new(
            MockIdentityProvider::new()
                .with_silent_error(AuthError::InteractionRequired("consent".into()))
                .push_interactive(Ok(alice())),
        );
        let gate = SessionGate::new(provider.clone());

        gate.activate().await;
        assert_eq!(gate.state(), AuthState::Unauthenticated);

        let session = gate.login().await.unwrap();
        assert_eq!(session, alice());
        assert_eq!(gate.state(), AuthState::Authenticated(alice()));
        assert_eq!(provider.interactive_call_count(), 1);
    }

    #[tokio::test]
    async fn test_silent_returns_none() {
        let provider = Arc::new(MockIdentityProvider::new());
        let gate = SessionGate::new(provider);
        gate.activate().await;
        assert_eq!(gate.state(), AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_interactive_failure_is_recoverable() {
        let provider = Arc::new(
            MockIdentityProvider::new()
                .push_interactive(Err(AuthError::UserCancelled))
                .push_interactive(Ok(alice())),
        );
        let gate = SessionGate::new(provider);
        gate.activate().await;

        assert_eq!(gate.login().await, Err(AuthError::UserCancelled));
        assert_eq!(gate.state(), AuthState::Unauthenticated);

        assert!(gate.login().await.is_ok());
        assert!(gate.state().is_authenticated());
    }

    #[tokio::test]
    async fn test_login_before_activation_is_not_ready() {
        let provider = Arc::new(MockIdentityProvider::new().push_interactive(Ok(alice())));
        let gate = SessionGate::new(provider.clone());
        assert_eq!(gate.login().await, Err(AuthError::NotReady));
        assert_eq!(provider.interactive_call_count(), 0);
    }

    #[tokio::test]
    async fn test_reentrant_activation_is_noop() {
        let release = Arc::new(Notify::new());
        let provider = Arc::new(
            MockIdentityProvider::new()
                .with_silent_session(alice())
                .hold_silent_until(release.clone()),
        );
        let gate = Arc::new(SessionGate::new(provider.clone()));

        let first = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.activate().await })
        };
        tokio::task::yield_now().await;
        assert_eq!(gate.state(), AuthState::SilentlyAuthenticating);

        gate.activate().await;
        assert_eq!(provider.silent_call_count(), 1);

        release.notify_one();
        first.await.unwrap();
        assert!(gate.state().is_authenticated());

        gate.activate().await;
        assert_eq!(provider.silent_call_count(), 1);
    }

    #[tokio::test]
    async fn test_overlapping_login_prompts_once() {
        let release = Arc::new(Notify::new());
        let provider = Arc::new(
            MockIdentityProvider::new()
                .push_interactive(Ok(alice()))
                .hold_interactive_until(release.clone()),
        );
        let gate = Arc::new(SessionGate::new(provider.clone()));
        gate.activate().await;
        assert_eq!(gate.state(), AuthState::Unauthenticated);

        let first = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.login().await })
        };
        tokio::task::yield_now().await;
        assert_eq!(provider.interactive_call_count(), 1);

        assert_eq!(gate.login().await, Err(AuthError::LoginInProgress));
        assert_eq!(provider.interactive_call_count(), 1);

        release.notify_one();
        assert_eq!(first.await.unwrap(), Ok(alice()));
        assert_eq!(gate.state(), AuthState::Authenticated(alice()));

        // 守卫已释放：已登录时直接返回当前会话
        assert_eq!(gate.login().await, Ok(alice()));
        assert_eq!(provider.interactive_call_count(), 1);
    }

    #[tokio::test]
    async fn test_logout_is_unconditional() {
        let provider = Arc::new(
            MockIdentityProvider::new()
                .with_silent_session(alice())
                .with_logout_error(AuthError::Provider("network down".into())),
        );
        let gate = SessionGate::new(provider.clone());
        gate.activate().await;
        assert!(gate.state().is_authenticated());

        gate.logout().await;
        assert_eq!(gate.state(), AuthState::Unauthenticated);
        assert_eq!(provider.logout_call_count(), 1);
        assert!(gate.session().is_none());
    }

    #[tokio::test]
    async fn test_external_invalidation() {
        let provider = Arc::new(MockIdentityProvider::new().with_silent_session(alice()));
        let gate = SessionGate::new(provider.clone());
        gate.activate().await;

        gate.sync_with_provider();
        assert!(gate.state().is_authenticated());

        provider.expire_current();
        gate.sync_with_provider();
        assert_eq!(gate.state(), AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_subscribers_see_latest_state() {
        let provider = Arc::new(MockIdentityProvider::new().with_silent_session(alice()));
        let gate = SessionGate::new(provider);
        let rx = gate.subscribe();
        assert_eq!(*rx.borrow(), AuthState::Unknown);
        gate.activate().await;
        assert!(rx.borrow().is_authenticated());
    }
}
