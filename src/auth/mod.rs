//! 认证层：会话、身份提供方抽象、会话门控、受保护访问门控

pub mod access;
pub mod configured;
pub mod gate;
pub mod mock;
pub mod provider;
pub mod session;

pub use access::{AccessGate, AccessView};
pub use configured::ConfiguredIdentityProvider;
pub use gate::{AuthTransition, SessionGate};
pub use mock::MockIdentityProvider;
pub use provider::IdentityProvider;
pub use session::Session;
