//! Alertbot - 把监控告警 webhook 转换为 markdown 消息并发送到 Matrix 房间
//!
//! 支持 Grafana、Prometheus Alertmanager、Uptime Kuma 和 Slack 格式的 webhook，
//! 无法识别的 payload 以通用列表形式展示。

pub mod alert;
pub mod commands;
pub mod config;
pub mod delivery;
pub mod matrix;
pub mod mode;
pub mod server;

pub use alert::{detect, get_alert_messages, AlertKind, RenderError};
pub use commands::{Command, CommandContext, Reply};
pub use config::{BotConfig, ConfigOverrides};
pub use delivery::{DeliveryError, MessageSink, StdoutSink};
pub use matrix::{CommandLoop, MatrixClient};
pub use mode::{ModeSwitch, RenderMode};
pub use server::{create_router, AppState};
