//! 查询过程事件：进度只通过事件通道对外可见，execute 本身只在终态时返回一次

use serde::Serialize;

use crate::core::QueryPhase;

/// 单步过程事件（可序列化为 JSON 供 CLI / 前端展示）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueryEvent {
    /// 阶段变化
    Phase { phase: QueryPhase },
    /// 提交成功，拿到会话句柄
    Submitted { session_id: String },
    /// 第几次轮询
    PollAttempt { attempt: u32, max_attempts: u32 },
    /// 后端尚未完成
    PollPending { attempt: u32, status: String },
    /// 轮询调用本身失败（计入尝试次数，会重试）
    PollFailed { attempt: u32, reason: String },
    /// 下一次轮询前的等待
    Backoff { attempt: u32, delay_ms: u64 },
}
