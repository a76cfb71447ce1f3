//! Alertbot CLI
//!
//! 接收监控告警 webhook，转换为 markdown 后发送到 Matrix 房间

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use alertbot::delivery::deliver_all;
use alertbot::{
    detect, get_alert_messages, server, AppState, BotConfig, CommandLoop, ConfigOverrides,
    MatrixClient, ModeSwitch, RenderMode, StdoutSink,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "alertbot")]
#[command(about = "Alertbot - 把监控告警 webhook 转发到 Matrix 房间")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 启动 webhook 服务和 Matrix 命令循环
    Serve {
        /// 配置文件路径 (默认: ~/.config/alertbot/config.json)
        #[arg(long, short)]
        config: Option<PathBuf>,
        /// 监听地址 (如 0.0.0.0:8080)
        #[arg(long)]
        listen: Option<String>,
        /// Webhook 对外地址（用于 !url 命令）
        #[arg(long)]
        public_url: Option<String>,
        /// 以 raw 模式启动
        #[arg(long)]
        raw: bool,
    },
    /// 渲染 payload 并打印（不发送）
    Render {
        /// JSON 文件路径，省略则从 stdin 读取
        file: Option<PathBuf>,
        /// raw 模式
        #[arg(long)]
        raw: bool,
        /// 打印时使用的房间 id
        #[arg(long, default_value = "dry-run")]
        room: String,
    },
    /// 检测 payload 格式
    Detect {
        /// JSON 文件路径，省略则从 stdin 读取
        file: Option<PathBuf>,
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("alertbot=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, listen, public_url, raw } => {
            let mut bot_config = BotConfig::load(config.as_deref())?;
            bot_config.apply_overrides(ConfigOverrides {
                listen,
                public_url,
                raw_mode: raw,
            });
            bot_config.validate()?;
            run_serve(bot_config).await?;
        }
        Commands::Render { file, raw, room } => {
            let payload = read_payload(file.as_deref())?;
            let messages = get_alert_messages(&payload, RenderMode::from_raw_flag(raw));
            deliver_all(&StdoutSink, &room, &messages).await?;
        }
        Commands::Detect { file, json } => {
            let payload = read_payload(file.as_deref())?;
            let kind = detect(&payload);
            if json {
                println!("{}", serde_json::to_string(&serde_json::json!({ "kind": kind }))?);
            } else {
                println!("{}", kind);
            }
        }
    }

    Ok(())
}

async fn run_serve(config: BotConfig) -> Result<()> {
    let addr = config.listen_addr()?;
    let mode = Arc::new(ModeSwitch::new(config.initial_mode()));
    let client = Arc::new(
        MatrixClient::new(&config.homeserver, &config.access_token)
            .context("Failed to create Matrix client")?,
    );
    info!(homeserver = %config.homeserver, mode = %mode.current(), "Starting alertbot");

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let command_loop = CommandLoop::new(
        client.clone(),
        mode.clone(),
        config.public_url.clone(),
        config.auto_join,
    );
    let loop_shutdown = shutdown_rx.clone();
    let loop_handle = tokio::spawn(command_loop.run(loop_shutdown));

    let state = Arc::new(AppState::new(client, mode));
    let mut server_shutdown = shutdown_rx;
    let mut server_handle = tokio::spawn(server::serve(addr, state, async move {
        let _ = server_shutdown.changed().await;
    }));

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            info!("Shutting down");
        }
        // 服务提前退出（如端口被占用）
        result = &mut server_handle => {
            let _ = shutdown_tx.send(true);
            loop_handle.await?;
            return result?;
        }
    }
    let _ = shutdown_tx.send(true);

    if let Err(e) = server_handle.await? {
        error!(error = %e, "Webhook server exited with error");
    }
    loop_handle.await?;
    Ok(())
}

/// 从文件或 stdin 读取 JSON payload
fn read_payload(file: Option<&std::path::Path>) -> Result<serde_json::Value> {
    let text = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };
    serde_json::from_str(&text).context("Payload is not valid JSON")
}
