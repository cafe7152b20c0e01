//! 端到端：会话门控 + 访问门控 + HTTP 查询服务 + 编排器

use std::sync::Arc;
use std::time::Duration;

use netquery::auth::{AccessGate, AccessView, MockIdentityProvider, Session, SessionGate};
use netquery::core::{AuthError, QueryError};
use netquery::query::{
    validate, HttpQueryService, PollPolicy, QueryFailure, QueryFields, QueryOrchestrator,
    QueryOutcome, RawQueryFields,
};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fields() -> QueryFields {
    validate(&RawQueryFields {
        source_ip: "172.16.0.5".into(),
        source_port: "51000".into(),
        destination_ip: "8.8.8.8".into(),
        destination_port: "53".into(),
        description: "dns reachability".into(),
    })
    .unwrap()
}

fn hank() -> Session {
    Session::new("u-hank", "Hank", "hank@example.com")
}

fn fast_policy() -> PollPolicy {
    PollPolicy::new(10, Duration::from_millis(1))
}

#[tokio::test]
async fn test_silent_login_then_query_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/network-config"))
        .and(header("x-user-context", "hank@example.com"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"sessionId": "abc123", "status": "queued"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/network-config/status"))
        .and(query_param("sessionId", "abc123"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status": "running", "completed": false})),
        )
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/network-config/status"))
        .and(query_param("sessionId", "abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "completed",
            "completed": true,
            "result": {"hops": 3}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = Arc::new(MockIdentityProvider::new().with_silent_session(hank()));
    let gate = Arc::new(SessionGate::new(provider.clone()));
    let access = AccessGate::new(gate.clone());
    access.mount().await;
    assert_eq!(access.render(|s| s.user_id.clone()), AccessView::Granted("u-hank".into()));
    assert_eq!(provider.interactive_call_count(), 0);

    let service = Arc::new(HttpQueryService::new(&server.uri(), "svc-key", 5));
    let orchestrator = QueryOrchestrator::new(service, gate.subscribe()).with_policy(fast_policy());

    let outcome = orchestrator.execute(fields()).await.unwrap();
    assert_eq!(outcome, QueryOutcome::Succeeded(json!({"hops": 3})));
}

#[tokio::test]
async fn test_unauthenticated_query_hits_no_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let provider = Arc::new(MockIdentityProvider::new().with_silent_error(AuthError::NoCachedCredential));
    let gate = Arc::new(SessionGate::new(provider));
    gate.activate().await;

    let service = Arc::new(HttpQueryService::new(&server.uri(), "svc-key", 5));
    let orchestrator = QueryOrchestrator::new(service, gate.subscribe());
    assert_eq!(
        orchestrator.execute(fields()).await,
        Err(QueryError::AuthRequired)
    );
}

#[tokio::test]
async fn test_interactive_login_unlocks_queries_and_logout_locks_again() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "queued"})))
        .mount(&server)
        .await;

    let provider = Arc::new(
        MockIdentityProvider::new()
            .with_silent_error(AuthError::InteractionRequired("consent_required".into()))
            .push_interactive(Ok(hank())),
    );
    let gate = Arc::new(SessionGate::new(provider));
    let access = AccessGate::new(gate.clone());
    access.mount().await;
    assert_eq!(access.render(|_| ()), AccessView::LoginRequired);
    access.login().await.unwrap();

    let service = Arc::new(HttpQueryService::new(&server.uri(), "svc-key", 5));
    let orchestrator = QueryOrchestrator::new(service, gate.subscribe()).with_policy(fast_policy());

    // 后端 2xx 但没有 sessionId
    let outcome = orchestrator.execute(fields()).await.unwrap();
    assert_eq!(outcome, QueryOutcome::Failed(QueryFailure::MissingSessionId));

    gate.logout().await;
    assert_eq!(
        orchestrator.execute(fields()).await,
        Err(QueryError::AuthRequired)
    );
}

#[tokio::test]
async fn test_poll_server_errors_then_remote_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"sessionId": "s-9", "status": "queued"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "failed",
            "completed": true,
            "error": "upstream failure"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = Arc::new(MockIdentityProvider::new().with_silent_session(hank()));
    let gate = Arc::new(SessionGate::new(provider));
    gate.activate().await;

    let service = Arc::new(HttpQueryService::new(&server.uri(), "svc-key", 5));
    let orchestrator = QueryOrchestrator::new(service, gate.subscribe()).with_policy(fast_policy());

    let outcome = orchestrator.execute(fields()).await.unwrap();
    assert_eq!(
        outcome,
        QueryOutcome::Failed(QueryFailure::Remote("upstream failure".into()))
    );
}
