//! 消息投递抽象 - 把渲染好的 markdown 发送到目标房间
//!
//! 所有出站渠道实现 `MessageSink`，webhook 处理和命令回复都只依赖这个 trait。

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// 投递失败
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// 目标房间不可访问（通常是 bot 未被邀请进房间）
    #[error("forbidden: cannot send to {room_id}")]
    Forbidden { room_id: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid destination {0}")]
    InvalidDestination(String),
}

impl DeliveryError {
    pub fn is_forbidden(&self) -> bool {
        matches!(self, DeliveryError::Forbidden { .. })
    }
}

/// 出站消息渠道
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// 渠道名称（用于日志）
    fn name(&self) -> &str;

    /// 发送一条 markdown 消息到目标房间
    async fn send_markdown(&self, room_id: &str, markdown: &str) -> Result<(), DeliveryError>;
}

/// 按顺序逐条发送，遇到第一个错误即停止
pub async fn deliver_all(
    sink: &dyn MessageSink,
    room_id: &str,
    messages: &[String],
) -> Result<usize, DeliveryError> {
    for (i, message) in messages.iter().enumerate() {
        debug!(sink = sink.name(), room_id = %room_id, index = i, "Sending alert message");
        sink.send_markdown(room_id, message).await?;
    }
    Ok(messages.len())
}

/// Dry-run 渠道：只打印不发送
#[derive(Debug, Default)]
pub struct StdoutSink;

#[async_trait]
impl MessageSink for StdoutSink {
    fn name(&self) -> &str {
        "stdout"
    }

    async fn send_markdown(&self, room_id: &str, markdown: &str) -> Result<(), DeliveryError> {
        println!("--- {room_id}\n{markdown}");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! 测试用的记录型渠道

    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pub sent: Mutex<Vec<(String, String)>>,
        pub forbidden_rooms: Vec<String>,
    }

    impl RecordingSink {
        pub fn forbidding(room_id: &str) -> Self {
            Self {
                forbidden_rooms: vec![room_id.to_string()],
                ..Default::default()
            }
        }

        pub fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessageSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send_markdown(&self, room_id: &str, markdown: &str) -> Result<(), DeliveryError> {
            if self.forbidden_rooms.iter().any(|r| r == room_id) {
                return Err(DeliveryError::Forbidden {
                    room_id: room_id.to_string(),
                });
            }
            self.sent
                .lock()
                .unwrap()
                .push((room_id.to_string(), markdown.to_string()));
            Ok(())
        }
    }
}
