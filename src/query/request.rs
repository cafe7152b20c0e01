//! 查询请求：表单原始字段、校验、带归属信息的 QueryRequest
//!
//! 校验规则与后端一致（IPv4 点分四段、端口 1-65535 且无前导零、描述去空白后非空），
//! 按 源 IP → 目的 IP → 源端口 → 目的端口 → 描述 的顺序短路，只报告第一个错误。

use std::fmt;
use std::net::Ipv4Addr;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};

use crate::auth::Session;
use crate::core::ValidationError;

const IPV4_PATTERN: &str = r"^(25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.(25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.(25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.(25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)$";
const PORT_PATTERN: &str =
    r"^([1-9][0-9]{0,3}|[1-5][0-9]{4}|6[0-4][0-9]{3}|65[0-4][0-9]{2}|655[0-2][0-9]|6553[0-5])$";

static IPV4_RE: OnceLock<Regex> = OnceLock::new();
static PORT_RE: OnceLock<Regex> = OnceLock::new();

fn ipv4_regex() -> &'static Regex {
    IPV4_RE.get_or_init(|| Regex::new(IPV4_PATTERN).unwrap())
}

fn port_regex() -> &'static Regex {
    PORT_RE.get_or_init(|| Regex::new(PORT_PATTERN).unwrap())
}

/// 表单层交来的原始字符串
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQueryFields {
    pub source_ip: String,
    pub source_port: String,
    pub destination_ip: String,
    pub destination_port: String,
    pub description: String,
}

/// 端口（1-65535）；线上格式为十进制字符串
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Port(u16);

impl Port {
    pub fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Port {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// 校验通过的查询字段
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryFields {
    pub source_ip: Ipv4Addr,
    pub source_port: Port,
    pub destination_ip: Ipv4Addr,
    pub destination_port: Port,
    pub description: String,
}

fn parse_ipv4(raw: &str) -> Option<Ipv4Addr> {
    let caps = ipv4_regex().captures(raw)?;
    let mut octets = [0u8; 4];
    for (i, octet) in octets.iter_mut().enumerate() {
        *octet = caps.get(i + 1)?.as_str().parse().ok()?;
    }
    Some(Ipv4Addr::from(octets))
}

fn parse_port(raw: &str) -> Option<Port> {
    if !port_regex().is_match(raw) {
        return None;
    }
    raw.parse().ok().map(Port)
}

/// 校验表单字段；第一个失败的规则决定返回的错误
pub fn validate(raw: &RawQueryFields) -> Result<QueryFields, ValidationError> {
    let source_ip = parse_ipv4(&raw.source_ip).ok_or(ValidationError::InvalidSourceIp)?;
    let destination_ip =
        parse_ipv4(&raw.destination_ip).ok_or(ValidationError::InvalidDestinationIp)?;
    let source_port = parse_port(&raw.source_port).ok_or(ValidationError::InvalidSourcePort)?;
    let destination_port =
        parse_port(&raw.destination_port).ok_or(ValidationError::InvalidDestinationPort)?;
    let description = raw.description.trim();
    if description.is_empty() {
        return Err(ValidationError::EmptyDescription);
    }

    Ok(QueryFields {
        source_ip,
        source_port,
        destination_ip,
        destination_port,
        description: description.to_string(),
    })
}

/// 提交给远端服务的请求体：校验后的字段 + 提交时刻的用户归属
///
/// 字段私有，构造后不可修改；每次 execute 都重新构造。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    #[serde(flatten)]
    fields: QueryFields,
    user_id: String,
    user_email: String,
    #[serde(rename = "timestamp")]
    submitted_at: DateTime<Utc>,
}

impl QueryRequest {
    pub fn new(fields: QueryFields, session: &Session) -> Self {
        Self {
            fields,
            user_id: session.user_id.clone(),
            user_email: session.email.clone(),
            submitted_at: Utc::now(),
        }
    }

    pub fn fields(&self) -> &QueryFields {
        &self.fields
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn user_email(&self) -> &str {
        &self.user_email
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }
}
