//! Mock 查询服务（用于测试与本地演示，无需后端）
//!
//! 提交与轮询结果按脚本依次返回；脚本耗尽后提交返回随机 sessionId，轮询返回「未完成」。
//! 记录每次调用的 sessionId 与时间（tokio 时钟，配合 `start_paused` 可精确断言退避间隔）。
//! 可选地把提交或轮询挂起，直到测试放行，用来观察调用进行中的取消。

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::core::ServiceError;
use crate::query::{PollResponse, QueryRequest, QueryService, SessionId, SubmitResponse};

/// 一次轮询调用的记录
#[derive(Debug, Clone)]
pub struct PollCall {
    pub session_id: SessionId,
    pub user_context: Option<String>,
    pub at: Instant,
}

#[derive(Debug, Default)]
pub struct ScriptedQueryService {
    submits: Mutex<VecDeque<Result<SubmitResponse, ServiceError>>>,
    polls: Mutex<VecDeque<Result<PollResponse, ServiceError>>>,
    submitted: Mutex<Vec<QueryRequest>>,
    poll_calls: Mutex<Vec<PollCall>>,
    hold_submit: Option<Arc<Notify>>,
    hold_poll: Option<Arc<Notify>>,
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl ScriptedQueryService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_submit(self, result: Result<SubmitResponse, ServiceError>) -> Self {
        lock(&self.submits).push_back(result);
        self
    }

    pub fn push_poll(self, result: Result<PollResponse, ServiceError>) -> Self {
        lock(&self.polls).push_back(result);
        self
    }

    /// 提交在 `notify` 被唤醒前一直挂起（调用已记录）
    pub fn hold_submit_until(mut self, notify: Arc<Notify>) -> Self {
        self.hold_submit = Some(notify);
        self
    }

    /// 每次轮询在 `notify` 被唤醒前一直挂起（调用已记录）
    pub fn hold_polls_until(mut self, notify: Arc<Notify>) -> Self {
        self.hold_poll = Some(notify);
        self
    }

    pub fn submit_count(&self) -> usize {
        lock(&self.submitted).len()
    }

    pub fn submitted(&self) -> Vec<QueryRequest> {
        lock(&self.submitted).clone()
    }

    pub fn poll_count(&self) -> usize {
        lock(&self.poll_calls).len()
    }

    pub fn poll_calls(&self) -> Vec<PollCall> {
        lock(&self.poll_calls).clone()
    }
}

#[async_trait]
impl QueryService for ScriptedQueryService {
    async fn submit(&self, request: &QueryRequest) -> Result<SubmitResponse, ServiceError> {
        lock(&self.submitted).push(request.clone());
        if let Some(notify) = &self.hold_submit {
            notify.notified().await;
        }
        lock(&self.submits)
            .pop_front()
            .unwrap_or_else(|| Ok(SubmitResponse::accepted(uuid::Uuid::new_v4().to_string())))
    }

    async fn poll(
        &self,
        session_id: &SessionId,
        user_context: Option<&str>,
    ) -> Result<PollResponse, ServiceError> {
        lock(&self.poll_calls).push(PollCall {
            session_id: session_id.clone(),
            user_context: user_context.map(String::from),
            at: Instant::now(),
        });
        if let Some(notify) = &self.hold_poll {
            notify.notified().await;
        }
        lock(&self.polls)
            .pop_front()
            .unwrap_or_else(|| Ok(PollResponse::pending()))
    }
}
