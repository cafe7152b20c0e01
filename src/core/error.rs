//! 错误类型：认证、表单校验、远端服务、查询编排
//!
//! 认证门控的静默登录失败只记日志，不会走到这里的任何调用方；其余错误都以 Result 返回给调用方。

use thiserror::Error;

/// 身份提供方 / 认证门控相关错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// 本地没有可恢复的凭据（静默登录的常见失败原因）
    #[error("No cached credential")]
    NoCachedCredential,

    /// 需要用户交互（同意授权、MFA 等）
    #[error("Interaction required: {0}")]
    InteractionRequired(String),

    /// 用户关闭了登录窗口或主动放弃
    #[error("Login cancelled by user")]
    UserCancelled,

    #[error("Identity provider error: {0}")]
    Provider(String),

    /// 门控仍处于 Unknown / SilentlyAuthenticating，不接受交互式登录
    #[error("Authentication state not resolved yet")]
    NotReady,

    /// 已有一次交互式登录在进行
    #[error("Interactive login already in progress")]
    LoginInProgress,
}

/// 表单校验错误：只报告第一个失败的字段
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter a valid source IP address")]
    InvalidSourceIp,

    #[error("Please enter a valid destination IP address")]
    InvalidDestinationIp,

    #[error("Please enter a valid source port (1-65535)")]
    InvalidSourcePort,

    #[error("Please enter a valid destination port (1-65535)")]
    InvalidDestinationPort,

    #[error("Please enter a description")]
    EmptyDescription,
}

/// 远端查询服务调用错误（传输层 / HTTP 状态 / 响应体解析）
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("HTTP error! status: {0}")]
    Status(u16),

    #[error("Invalid response body: {0}")]
    Decode(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ServiceError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            ServiceError::Status(status.as_u16())
        } else {
            ServiceError::Transport(e.to_string())
        }
    }
}

/// execute 在进入提交/轮询之前就被拒绝的情况；进入之后的一切结局都是 QueryOutcome
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// 未登录时调用；不会发起任何网络请求
    #[error("Authentication required")]
    AuthRequired,

    /// 同一个 orchestrator 上已有未结束的查询
    #[error("A query is already in flight on this orchestrator")]
    Busy,
}
