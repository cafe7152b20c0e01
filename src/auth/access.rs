//! 受保护访问门控：SessionGate 状态的纯投影
//!
//! 除「只触发一次激活」的标记外不持有任何状态。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::auth::{Session, SessionGate};
use crate::core::{AuthError, Readiness};

/// render 的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", content = "content", rename_all = "snake_case")]
pub enum AccessView<T> {
    /// 中性占位，不展示登录入口
    Authenticating,
    /// 展示登录入口；调用 `AccessGate::login` 进入交互式登录
    LoginRequired,
    Granted(T),
}

pub struct AccessGate {
    gate: Arc<SessionGate>,
    activation_requested: AtomicBool,
}

impl AccessGate {
    pub fn new(gate: Arc<SessionGate>) -> Self {
        Self {
            gate,
            activation_requested: AtomicBool::new(false),
        }
    }

    /// 挂载：首次调用时激活 SessionGate（静默登录），之后为 no-op
    pub async fn mount(&self) {
        if self.activation_requested.swap(true, Ordering::SeqCst) {
            return;
        }
        self.gate.activate().await;
    }

    /// 根据当前认证状态投影视图；已登录时无条件放行 `children`
    pub fn render<T, F>(&self, children: F) -> AccessView<T>
    where
        F: FnOnce(&Session) -> T,
    {
        let state = self.gate.state();
        match (state.readiness(), state.session()) {
            (Readiness::Ready, Some(session)) => AccessView::Granted(children(session)),
            (Readiness::LoginRequired, _) => AccessView::LoginRequired,
            _ => AccessView::Authenticating,
        }
    }

    /// 登录入口
    pub async fn login(&self) -> Result<Session, AuthError> {
        self.gate.login().await
    }
}
