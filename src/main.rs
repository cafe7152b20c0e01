//! netquery - 需登录的网络查询客户端
//!
//! 入口：初始化日志、加载配置、挂载访问门控（静默登录，必要时交互式登录），再提交查询并轮询到终态。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use netquery::auth::{AccessGate, AccessView, ConfiguredIdentityProvider, SessionGate};
use netquery::config::load_config;
use netquery::core::ShutdownManager;
use netquery::query::{
    validate, HttpQueryService, PollPolicy, QueryEvent, QueryOrchestrator, QueryOutcome,
    RawQueryFields,
};

#[derive(Parser, Debug)]
#[command(name = "netquery", version, about = "Submit a network query and wait for its result")]
struct Cli {
    /// 额外的配置文件（覆盖 config/default.toml）
    #[arg(long, global = true, env = "NETQUERY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 提交查询并等待结果
    Submit {
        #[arg(long)]
        source_ip: String,
        #[arg(long)]
        source_port: String,
        #[arg(long)]
        destination_ip: String,
        #[arg(long)]
        destination_port: String,
        #[arg(long)]
        description: String,
        /// 覆盖 [poll].max_attempts
        #[arg(long)]
        max_attempts: Option<u32>,
    },
    /// 后端健康检查
    Health,
    /// 列出已提交的查询
    List {
        #[arg(long)]
        email: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    netquery::observability::init();

    let cli = Cli::parse();
    let cfg = load_config(cli.config.clone()).context("Failed to load config")?;
    let service =
        Arc::new(HttpQueryService::from_config(&cfg.api).context("Failed to create query service")?);

    match cli.command {
        Command::Health => {
            let healthy = service.health_check().await;
            println!("{}", serde_json::json!({ "healthy": healthy }));
            if !healthy {
                bail!("Backend is unhealthy");
            }
        }
        Command::List { email } => {
            let body = service
                .list_queries(email.as_deref())
                .await
                .context("Failed to list queries")?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Command::Submit {
            source_ip,
            source_port,
            destination_ip,
            destination_port,
            description,
            max_attempts,
        } => {
            // 先校验表单，非法输入不触发任何登录或网络请求
            let fields = validate(&RawQueryFields {
                source_ip,
                source_port,
                destination_ip,
                destination_port,
                description,
            })?;

            let provider = Arc::new(ConfiguredIdentityProvider::from_config(&cfg.identity));
            let gate = Arc::new(SessionGate::new(provider));
            let access = AccessGate::new(gate.clone());
            access.mount().await;

            if let AccessView::LoginRequired = access.render(|_| ()) {
                eprintln!("Sign-in required, starting interactive login...");
                access.login().await.context("Interactive login failed")?;
            }
            let AccessView::Granted(user) = access.render(|s| s.email.clone()) else {
                bail!("Authentication did not complete");
            };
            tracing::info!("Signed in as {}", user);

            let mut policy = PollPolicy::from_config(&cfg.poll);
            if let Some(n) = max_attempts {
                policy = PollPolicy::new(n, policy.backoff_unit);
            }

            let shutdown = Arc::new(ShutdownManager::new());
            shutdown.install_signal_handlers();

            let (event_tx, mut event_rx) = mpsc::unbounded_channel::<QueryEvent>();
            let orchestrator = QueryOrchestrator::new(service, gate.subscribe())
                .with_policy(policy)
                .with_events(event_tx)
                .with_cancel_parent(shutdown.token());

            // 打印进度，直到终态事件
            let printer = tokio::spawn(async move {
                while let Some(event) = event_rx.recv().await {
                    if let Ok(line) = serde_json::to_string(&event) {
                        eprintln!("{}", line);
                    }
                    if matches!(event, QueryEvent::Phase { phase } if phase.is_terminal()) {
                        break;
                    }
                }
            });

            let outcome = orchestrator.execute(fields).await?;
            let _ = printer.await;

            if let (QueryOutcome::Cancelled, Some(reason)) = (&outcome, shutdown.reason()) {
                tracing::warn!("Query cancelled by {}", reason);
            }

            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if !outcome.is_success() {
                bail!("Query finished without a result");
            }
        }
    }

    Ok(())
}
