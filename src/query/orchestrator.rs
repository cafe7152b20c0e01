//! 查询编排：提交 → 拿到会话句柄 → 有界轮询直到终态
//!
//! 每次 execute 的内部阶段：Submitting → (SubmitFailed | Polling) → (Succeeded | Failed | TimedOut | Cancelled)。
//!
//! - 轮询是显式的有界循环：尝试计数 + `classify_poll` 分类，不做递归回调
//! - 轮询调用失败与「未完成」同样消耗一次尝试；后端明确返回 error 时立即失败
//! - 同一实例同一时刻只允许一个查询；取消在下一个挂起点生效，结局为 Cancelled（区别于 TimedOut）

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::core::{AuthState, QueryError, QueryPhase, ServiceError};
use crate::query::{
    PollPolicy, PollResponse, QueryEvent, QueryFields, QueryRequest, QueryService, SessionId,
};

/// 失败原因
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum QueryFailure {
    /// 提交时传输失败、非 2xx 或后端拒绝
    SubmitFailed(String),
    /// 提交返回 2xx 但没有 sessionId
    MissingSessionId,
    /// 轮询时后端明确返回的错误
    Remote(String),
}

impl QueryFailure {
    pub fn reason(&self) -> String {
        match self {
            QueryFailure::SubmitFailed(reason) | QueryFailure::Remote(reason) => reason.clone(),
            QueryFailure::MissingSessionId => "response did not contain a sessionId".to_string(),
        }
    }
}

/// execute 的终态结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum QueryOutcome {
    Succeeded(Value),
    Failed(QueryFailure),
    TimedOut,
    Cancelled,
}

impl QueryOutcome {
    pub fn phase(&self) -> QueryPhase {
        match self {
            QueryOutcome::Succeeded(_) => QueryPhase::Succeeded,
            QueryOutcome::Failed(QueryFailure::Remote(_)) => QueryPhase::Failed,
            QueryOutcome::Failed(_) => QueryPhase::SubmitFailed,
            QueryOutcome::TimedOut => QueryPhase::TimedOut,
            QueryOutcome::Cancelled => QueryPhase::Cancelled,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, QueryOutcome::Succeeded(_))
    }
}

/// 单次轮询结果的分类
#[derive(Debug, Clone, PartialEq)]
pub enum PollVerdict {
    Complete(Value),
    RemoteError(String),
    Pending(String),
    TransientFailure(String),
}

/// 轮询结果分类：error 字段优先于 completed；调用失败视为可重试
pub fn classify_poll(result: Result<PollResponse, ServiceError>) -> PollVerdict {
    match result {
        Err(e) => PollVerdict::TransientFailure(e.to_string()),
        Ok(PollResponse { error: Some(error), .. }) => PollVerdict::RemoteError(error),
        Ok(PollResponse {
            completed: true,
            result,
            ..
        }) => PollVerdict::Complete(result.unwrap_or(Value::Null)),
        Ok(PollResponse { status, .. }) => PollVerdict::Pending(status),
    }
}

/// 一个轮询周期内持有的后端会话；到达终态后丢弃，不跨查询复用
#[derive(Debug)]
struct QuerySession {
    session_id: SessionId,
    status: String,
}

pub struct QueryOrchestrator {
    service: Arc<dyn QueryService>,
    auth: watch::Receiver<AuthState>,
    policy: PollPolicy,
    event_tx: Option<mpsc::UnboundedSender<QueryEvent>>,
    cancel_parent: Option<CancellationToken>,
    current: Mutex<Option<CancellationToken>>,
    in_flight: AtomicBool,
}

/// 进行中标记；execute 结束（或 future 被丢弃）时释放
struct InFlightGuard<'a> {
    orchestrator: &'a QueryOrchestrator,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        *self.orchestrator.current_token() = None;
        self.orchestrator.in_flight.store(false, Ordering::SeqCst);
    }
}

impl QueryOrchestrator {
    /// `auth` 来自 `SessionGate::subscribe()`，只读
    pub fn new(service: Arc<dyn QueryService>, auth: watch::Receiver<AuthState>) -> Self {
        Self {
            service,
            auth,
            policy: PollPolicy::default(),
            event_tx: None,
            cancel_parent: None,
            current: Mutex::new(None),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_events(mut self, event_tx: mpsc::UnboundedSender<QueryEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// 父 token 被取消时，进行中的查询一并取消（如 Ctrl+C）
    pub fn with_cancel_parent(mut self, token: CancellationToken) -> Self {
        self.cancel_parent = Some(token);
        self
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// 取消进行中的查询；没有查询在进行时返回 false
    pub fn cancel(&self) -> bool {
        match self.current_token().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// 提交并轮询一个查询，直到终态。每次调用恰好返回一次。
    ///
    /// 未登录时立即返回 `QueryError::AuthRequired`，不发起任何网络请求；
    /// 本实例已有查询在进行时返回 `QueryError::Busy`。
    pub async fn execute(&self, fields: QueryFields) -> Result<QueryOutcome, QueryError> {
        let Some(session) = self.auth.borrow().session().cloned() else {
            tracing::warn!("Query rejected: authentication required");
            return Err(QueryError::AuthRequired);
        };

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!("Query rejected: another query is in flight");
            return Err(QueryError::Busy);
        }
        let _guard = InFlightGuard { orchestrator: self };

        let token = match &self.cancel_parent {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        *self.current_token() = Some(token.clone());

        let request = QueryRequest::new(fields, &session);
        let span = tracing::info_span!("query", run_id = %Uuid::new_v4(), user_id = %session.user_id);
        let outcome = self
            .run(&request, &token)
            .instrument(span)
            .await;

        self.emit(QueryEvent::Phase {
            phase: outcome.phase(),
        });
        match &outcome {
            QueryOutcome::Succeeded(_) => tracing::info!("Query succeeded"),
            QueryOutcome::Failed(failure) => tracing::warn!("Query failed: {}", failure.reason()),
            QueryOutcome::TimedOut => tracing::warn!(
                "Query timed out after {} attempts",
                self.policy.max_attempts
            ),
            QueryOutcome::Cancelled => tracing::info!("Query cancelled"),
        }
        Ok(outcome)
    }

    async fn run(&self, request: &QueryRequest, token: &CancellationToken) -> QueryOutcome {
        if token.is_cancelled() {
            return QueryOutcome::Cancelled;
        }

        self.emit(QueryEvent::Phase {
            phase: QueryPhase::Submitting,
        });
        let submitted = tokio::select! {
            biased;
            _ = token.cancelled() => return QueryOutcome::Cancelled,
            result = self.service.submit(request) => result,
        };

        let response = match submitted {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Submit failed: {}", e);
                return QueryOutcome::Failed(QueryFailure::SubmitFailed(e.to_string()));
            }
        };
        if response.is_rejected() {
            let reason = response
                .message
                .clone()
                .unwrap_or_else(|| format!("submission {}", response.status));
            tracing::warn!("Submit rejected by backend: {}", reason);
            return QueryOutcome::Failed(QueryFailure::SubmitFailed(reason));
        }
        let Some(session_id) = response.session_id() else {
            tracing::warn!("Submit response did not contain a sessionId");
            return QueryOutcome::Failed(QueryFailure::MissingSessionId);
        };

        tracing::info!(session_id = %session_id, "Query submitted");
        self.emit(QueryEvent::Submitted {
            session_id: session_id.to_string(),
        });

        let mut session = QuerySession {
            session_id,
            status: response.status,
        };
        self.poll_until_terminal(&mut session, request.user_email(), token)
            .await
    }

    async fn poll_until_terminal(
        &self,
        session: &mut QuerySession,
        user_context: &str,
        token: &CancellationToken,
    ) -> QueryOutcome {
        self.emit(QueryEvent::Phase {
            phase: QueryPhase::Polling,
        });
        let max_attempts = self.policy.max_attempts;
        let mut attempt: u32 = 1;

        loop {
            if token.is_cancelled() {
                return QueryOutcome::Cancelled;
            }

            self.emit(QueryEvent::PollAttempt {
                attempt,
                max_attempts,
            });
            let polled = tokio::select! {
                biased;
                _ = token.cancelled() => return QueryOutcome::Cancelled,
                result = self.service.poll(&session.session_id, Some(user_context)) => result,
            };

            match classify_poll(polled) {
                PollVerdict::Complete(result) => return QueryOutcome::Succeeded(result),
                PollVerdict::RemoteError(error) => {
                    return QueryOutcome::Failed(QueryFailure::Remote(error))
                }
                PollVerdict::Pending(status) => {
                    tracing::debug!(attempt, status = %status, "Query not complete yet");
                    self.emit(QueryEvent::PollPending {
                        attempt,
                        status: status.clone(),
                    });
                    session.status = status;
                }
                PollVerdict::TransientFailure(reason) => {
                    tracing::warn!(attempt, "Poll attempt failed: {}", reason);
                    self.emit(QueryEvent::PollFailed { attempt, reason });
                }
            }

            if !self.policy.has_attempts_after(attempt) {
                tracing::debug!(
                    session_id = %session.session_id,
                    last_status = %session.status,
                    "Attempt bound exhausted"
                );
                return QueryOutcome::TimedOut;
            }

            let delay = self.policy.delay_after(attempt);
            self.emit(QueryEvent::Backoff {
                attempt,
                delay_ms: self.policy.delay_ms_after(attempt),
            });
            tokio::select! {
                biased;
                _ = token.cancelled() => return QueryOutcome::Cancelled,
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }

    fn current_token(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: QueryEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }
}
