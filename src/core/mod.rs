//! 核心层：错误类型、状态定义、关闭信号

pub mod error;
pub mod shutdown;
pub mod state;

pub use error::{AuthError, QueryError, ServiceError, ValidationError};
pub use shutdown::{ShutdownManager, ShutdownReason};
pub use state::{AuthState, QueryPhase, Readiness};
