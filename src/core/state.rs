//! 状态定义：认证状态机与查询阶段
//!
//! AuthState 由 SessionGate 独占写入，其它组件通过 watch 订阅只读；
//! Readiness 是给访问门控用的三值投影（等待 / 需要登录 / 就绪）。

use serde::Serialize;

use crate::auth::Session;

/// SessionGate 的状态
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "session", rename_all = "snake_case")]
pub enum AuthState {
    /// 尚未激活
    #[default]
    Unknown,
    /// 正在尝试静默恢复会话；此时既不能用受保护功能，也不能展示登录入口
    SilentlyAuthenticating,
    Authenticated(Session),
    Unauthenticated,
}

impl AuthState {
    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthState::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }

    /// 折叠为三值就绪状态；不能折叠成 bool，否则静默登录期间会闪现登录提示
    pub fn readiness(&self) -> Readiness {
        match self {
            AuthState::Unknown | AuthState::SilentlyAuthenticating => Readiness::Pending,
            AuthState::Unauthenticated => Readiness::LoginRequired,
            AuthState::Authenticated(_) => Readiness::Ready,
        }
    }

    /// 日志用的简短名称（不含用户信息）
    pub fn label(&self) -> &'static str {
        match self {
            AuthState::Unknown => "unknown",
            AuthState::SilentlyAuthenticating => "silently_authenticating",
            AuthState::Authenticated(_) => "authenticated",
            AuthState::Unauthenticated => "unauthenticated",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Pending,
    LoginRequired,
    Ready,
}

/// 单次 execute 内部的阶段（用于事件与日志）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryPhase {
    Submitting,
    SubmitFailed,
    Polling,
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
}

impl QueryPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            QueryPhase::SubmitFailed
                | QueryPhase::Succeeded
                | QueryPhase::Failed
                | QueryPhase::TimedOut
                | QueryPhase::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readiness_projection() {
        assert_eq!(AuthState::Unknown.readiness(), Readiness::Pending);
        assert_eq!(AuthState::SilentlyAuthenticating.readiness(), Readiness::Pending);
        assert_eq!(AuthState::Unauthenticated.readiness(), Readiness::LoginRequired);
        let state = AuthState::Authenticated(Session::new("u1", "Alice", "alice@example.com"));
        assert_eq!(state.readiness(), Readiness::Ready);
        assert_eq!(state.session().map(|s| s.email.as_str()), Some("alice@example.com"));
    }

    #[test]
    fn test_default_auth_state_is_unknown() {
        assert_eq!(AuthState::default(), AuthState::Unknown);
    }

    #[test]
    fn test_terminal_phases() {
        assert!(!QueryPhase::Polling.is_terminal());
        assert!(!QueryPhase::Submitting.is_terminal());
        assert!(QueryPhase::TimedOut.is_terminal());
        assert!(QueryPhase::Cancelled.is_terminal());
    }
}
