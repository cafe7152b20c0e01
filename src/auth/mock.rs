//! Mock 身份提供方（用于测试，无需真实 IdP）
//!
//! 静默 / 交互式登录的结果按脚本返回，并统计调用次数；可选地把静默登录挂起，直到测试放行。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::auth::{IdentityProvider, Session};
use crate::core::AuthError;

#[derive(Debug, Default)]
pub struct MockIdentityProvider {
    silent: Mutex<Option<Result<Option<Session>, AuthError>>>,
    interactive: Mutex<VecDeque<Result<Session, AuthError>>>,
    logout_error: Mutex<Option<AuthError>>,
    current: Mutex<Option<Session>>,
    hold_silent: Option<Arc<Notify>>,
    hold_interactive: Option<Arc<Notify>>,
    pub silent_calls: AtomicUsize,
    pub interactive_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// 静默登录返回给定会话
    pub fn with_silent_session(self, session: Session) -> Self {
        *lock(&self.silent) = Some(Ok(Some(session)));
        self
    }

    pub fn with_silent_error(self, err: AuthError) -> Self {
        *lock(&self.silent) = Some(Err(err));
        self
    }

    /// 追加一次交互式登录的结果（按调用顺序消费）
    pub fn push_interactive(self, result: Result<Session, AuthError>) -> Self {
        lock(&self.interactive).push_back(result);
        self
    }

    pub fn with_logout_error(self, err: AuthError) -> Self {
        *lock(&self.logout_error) = Some(err);
        self
    }

    /// 静默登录在 `notify` 被唤醒前一直挂起
    pub fn hold_silent_until(mut self, notify: Arc<Notify>) -> Self {
        self.hold_silent = Some(notify);
        self
    }

    /// 交互式登录在 `notify` 被唤醒前一直挂起
    pub fn hold_interactive_until(mut self, notify: Arc<Notify>) -> Self {
        self.hold_interactive = Some(notify);
        self
    }

    /// 模拟 IdP 侧会话失效
    pub fn expire_current(&self) {
        *lock(&self.current) = None;
    }

    pub fn silent_call_count(&self) -> usize {
        self.silent_calls.load(Ordering::SeqCst)
    }

    pub fn interactive_call_count(&self) -> usize {
        self.interactive_calls.load(Ordering::SeqCst)
    }

    pub fn logout_call_count(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn try_silent_auth(&self) -> Result<Option<Session>, AuthError> {
        self.silent_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(notify) = &self.hold_silent {
            notify.notified().await;
        }
        let result = lock(&self.silent).clone().unwrap_or(Ok(None));
        if let Ok(Some(session)) = &result {
            *lock(&self.current) = Some(session.clone());
        }
        result
    }

    async fn interactive_auth(&self) -> Result<Session, AuthError> {
        self.interactive_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(notify) = &self.hold_interactive {
            notify.notified().await;
        }
        let result = lock(&self.interactive)
            .pop_front()
            .unwrap_or(Err(AuthError::UserCancelled));
        if let Ok(session) = &result {
            *lock(&self.current) = Some(session.clone());
        }
        result
    }

    async fn logout(&self) -> Result<(), AuthError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.current) = None;
        match lock(&self.logout_error).clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn current_session(&self) -> Option<Session> {
        lock(&self.current).clone()
    }
}
