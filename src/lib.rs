//! netquery - 需登录的网络查询客户端
//!
//! 模块划分：
//! - **auth**: 会话、身份提供方抽象、会话门控（静默 → 交互式登录）、受保护访问门控
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、认证 / 查询状态、关闭信号
//! - **observability**: 日志初始化
//! - **query**: 请求校验、远端查询服务（HTTP / Mock）、提交 + 有界指数退避轮询编排

pub mod auth;
pub mod config;
pub mod core;
pub mod observability;
pub mod query;

pub use auth::{AccessGate, AccessView, IdentityProvider, Session, SessionGate};
pub use query::{QueryOrchestrator, QueryOutcome};
