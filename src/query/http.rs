//! HTTP 查询服务客户端
//!
//! 所有请求带 `Authorization: Bearer <服务凭据>`、`X-Service-ID` 与 `X-User-Context`（调用方邮箱或 anonymous），
//! 这些头是与现有后端互通的线上契约。轮询时 sessionId 同时放在查询参数与 `X-Session-ID` 头中。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ApiSection;
use crate::core::ServiceError;
use crate::query::{PollResponse, QueryRequest, QueryService, SessionId, SubmitResponse};

pub const HEADER_SERVICE_ID: &str = "X-Service-ID";
pub const HEADER_USER_CONTEXT: &str = "X-User-Context";
pub const HEADER_SESSION_ID: &str = "X-Session-ID";
pub const ANONYMOUS_CONTEXT: &str = "anonymous";

pub struct HttpQueryService {
    client: Client,
    base_url: String,
    service_api_key: String,
    service_id: String,
    submit_path: String,
    poll_path: String,
    health_path: String,
    list_path: String,
}

impl HttpQueryService {
    pub fn new(base_url: &str, service_api_key: &str, timeout_secs: u64) -> Self {
        let client = match Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!(
                    "Failed to build HTTP client with {}s timeout, falling back to defaults: {}",
                    timeout_secs,
                    e
                );
                Client::new()
            }
        };
        let defaults = ApiSection::default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_api_key: service_api_key.to_string(),
            service_id: defaults.service_id,
            submit_path: defaults.submit_path,
            poll_path: defaults.poll_path,
            health_path: defaults.health_path,
            list_path: defaults.list_path,
        }
    }

    /// 从 `[api]` 段构建；缺少服务凭据时报错
    pub fn from_config(api: &ApiSection) -> Result<Self, ServiceError> {
        let key = api
            .service_api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                ServiceError::Config(
                    "api.service_api_key is not set (NETQUERY__API__SERVICE_API_KEY)".to_string(),
                )
            })?;
        let mut service = Self::new(&api.base_url, key, api.timeout_secs);
        service.service_id = api.service_id.clone();
        service.submit_path = api.submit_path.clone();
        service.poll_path = api.poll_path.clone();
        service.health_path = api.health_path.clone();
        service.list_path = api.list_path.clone();
        Ok(service)
    }

    pub fn with_service_id(mut self, service_id: impl Into<String>) -> Self {
        self.service_id = service_id.into();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// 公共认证头；`user_context` 为 None 时不带 X-User-Context（健康检查）
    fn authorized(&self, builder: RequestBuilder, user_context: Option<&str>) -> RequestBuilder {
        let builder = builder
            .bearer_auth(&self.service_api_key)
            .header(HEADER_SERVICE_ID, &self.service_id);
        match user_context {
            Some(ctx) => builder.header(HEADER_USER_CONTEXT, user_context_value(Some(ctx))),
            None => builder,
        }
    }

    /// 健康检查：2xx 即健康，任何失败返回 false
    pub async fn health_check(&self) -> bool {
        let request = self.authorized(self.client.get(self.url(&self.health_path)), None);
        match request.send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::error!("Health check failed: {}", e);
                false
            }
        }
    }

    /// 列出已提交的查询（可按用户邮箱过滤）
    pub async fn list_queries(&self, user_email: Option<&str>) -> Result<Value, ServiceError> {
        let mut request = self.client.get(self.url(&self.list_path));
        if let Some(email) = user_email {
            request = request.query(&[("userEmail", email)]);
        }
        let resp = self
            .authorized(request, Some(user_context_value(user_email)))
            .send()
            .await?;
        decode(resp).await
    }
}

/// X-User-Context 的值：非空邮箱，否则 anonymous
fn user_context_value(email: Option<&str>) -> &str {
    email
        .filter(|e| !e.trim().is_empty())
        .unwrap_or(ANONYMOUS_CONTEXT)
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ServiceError> {
    let status = resp.status();
    if !status.is_success() {
        return Err(ServiceError::Status(status.as_u16()));
    }
    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|e| ServiceError::Decode(e.to_string()))
}

#[async_trait]
impl QueryService for HttpQueryService {
    async fn submit(&self, request: &QueryRequest) -> Result<SubmitResponse, ServiceError> {
        let builder = self.client.post(self.url(&self.submit_path)).json(request);
        let resp = self
            .authorized(builder, Some(request.user_email()))
            .send()
            .await?;
        decode(resp).await
    }

    async fn poll(
        &self,
        session_id: &SessionId,
        user_context: Option<&str>,
    ) -> Result<PollResponse, ServiceError> {
        let builder = self
            .client
            .get(self.url(&self.poll_path))
            .query(&[("sessionId", session_id.as_str())])
            .header(HEADER_SESSION_ID, session_id.as_str());
        let resp = self
            .authorized(builder, Some(user_context_value(user_context)))
            .send()
            .await?;
        decode(resp).await
    }
}
