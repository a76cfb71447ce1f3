//! Matrix 渠道 - 发送告警消息、接收操作员命令

pub mod client;
pub mod sync;
pub mod types;

pub use client::{MatrixClient, MatrixError, MessageContent};
pub use sync::CommandLoop;
