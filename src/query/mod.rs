//! 查询层：请求校验、远端服务抽象与实现（HTTP / Mock）、轮询策略、编排器

pub mod events;
pub mod http;
pub mod mock;
pub mod orchestrator;
pub mod policy;
pub mod request;
pub mod service;

pub use events::QueryEvent;
pub use http::HttpQueryService;
pub use mock::{PollCall, ScriptedQueryService};
pub use orchestrator::{classify_poll, PollVerdict, QueryFailure, QueryOrchestrator, QueryOutcome};
pub use policy::PollPolicy;
pub use request::{validate, Port, QueryFields, QueryRequest, RawQueryFields};
pub use service::{PollResponse, QueryService, SessionId, SubmitResponse};
