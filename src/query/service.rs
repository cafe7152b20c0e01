//! 远端查询服务抽象与线上报文
//!
//! 所有后端（HTTP / Mock）实现 QueryService：submit 提交查询拿到 sessionId，poll 按 sessionId 查询进度。

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::ServiceError;
use crate::query::QueryRequest;

/// 后端分配的会话句柄；只作关联标识，从不解析其结构
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 提交响应 `{ sessionId, status, message? }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl SubmitResponse {
    pub fn accepted(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            status: "accepted".to_string(),
            message: None,
        }
    }

    /// 后端在 2xx 响应里明确拒绝了提交
    pub fn is_rejected(&self) -> bool {
        matches!(
            self.status.to_ascii_lowercase().as_str(),
            "error" | "failed" | "rejected"
        )
    }

    /// 非空 sessionId
    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .map(SessionId::new)
    }
}

/// 轮询响应 `{ status, completed, result?, error? }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PollResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl PollResponse {
    pub fn pending() -> Self {
        Self {
            status: "running".to_string(),
            ..Self::default()
        }
    }

    pub fn completed(result: Value) -> Self {
        Self {
            status: "completed".to_string(),
            completed: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: "failed".to_string(),
            completed: true,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// 远端查询服务
#[async_trait]
pub trait QueryService: Send + Sync {
    /// 提交查询；非 2xx / 传输失败 / 响应体无法解析时返回 Err
    async fn submit(&self, request: &QueryRequest) -> Result<SubmitResponse, ServiceError>;

    /// 查询进度；`user_context` 为调用方邮箱（缺省时按 anonymous 上报）
    async fn poll(
        &self,
        session_id: &SessionId,
        user_context: Option<&str>,
    ) -> Result<PollResponse, ServiceError>;
}
