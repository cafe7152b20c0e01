//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `NETQUERY__*` 覆盖（双下划线表示嵌套，如 `NETQUERY__API__SERVICE_API_KEY=...`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::auth::Session;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiSection,
    pub poll: PollSection,
    pub identity: IdentitySection,
}

/// [api] 段：后端地址、服务凭据、各端点路径
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    pub base_url: String,
    /// Bearer 服务凭据；建议只通过环境变量提供
    pub service_api_key: Option<String>,
    /// X-Service-ID 头
    pub service_id: String,
    /// 单次 HTTP 请求超时（秒）
    pub timeout_secs: u64,
    pub submit_path: String,
    pub poll_path: String,
    pub health_path: String,
    pub list_path: String,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            service_api_key: None,
            service_id: "network-config-service".to_string(),
            timeout_secs: 30,
            submit_path: "network-config".to_string(),
            poll_path: "network-config/status".to_string(),
            health_path: "health".to_string(),
            list_path: "network-configs".to_string(),
        }
    }
}

/// [poll] 段：最大轮询次数与退避单位（第 k 次之后等待 2^k × 单位）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollSection {
    pub max_attempts: u32,
    pub backoff_unit_ms: u64,
}

impl Default for PollSection {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            backoff_unit_ms: 1000,
        }
    }
}

/// [identity] 段：IdP 注册信息与配置驱动提供方使用的账号
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IdentitySection {
    pub client_id: Option<String>,
    pub authority: Option<String>,
    pub scopes: Vec<String>,
    /// 可被静默恢复的账号（相当于已缓存的凭据）
    pub cached_account: Option<Session>,
    /// 交互式登录成功时返回的账号
    pub interactive_account: Option<Session>,
}

impl Default for IdentitySection {
    fn default() -> Self {
        Self {
            client_id: None,
            authority: None,
            scopes: vec!["User.Read".to_string()],
            cached_account: None,
            interactive_account: None,
        }
    }
}

/// 从 config 目录加载配置，环境变量 NETQUERY__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 NETQUERY__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        } else {
            tracing::warn!("Config file {} not found, ignoring", path.display());
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("NETQUERY")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
