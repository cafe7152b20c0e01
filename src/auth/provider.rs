//! 身份提供方抽象
//!
//! 所有后端（配置驱动 / Mock / 未来的 OIDC 实现）实现 IdentityProvider：
//! 静默登录、交互式登录、登出，以及读取当前会话。令牌存储与刷新由实现方自行负责。

use async_trait::async_trait;

use crate::auth::Session;
use crate::core::AuthError;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// 尝试在无用户交互的情况下恢复会话；`Ok(None)` 表示没有可恢复的会话
    async fn try_silent_auth(&self) -> Result<Option<Session>, AuthError>;

    /// 用户驱动的登录流程
    async fn interactive_auth(&self) -> Result<Session, AuthError>;

    async fn logout(&self) -> Result<(), AuthError>;

    /// 提供方当前认为有效的会话；用于发现外部失效
    fn current_session(&self) -> Option<Session>;
}
