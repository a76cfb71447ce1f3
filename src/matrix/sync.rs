//! 命令循环 - 长轮询 `/sync`，处理邀请和操作员命令

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::client::MatrixClient;
use super::types::SyncResponse;
use crate::commands::{self, Command, CommandContext, Reply};
use crate::delivery::MessageSink;
use crate::mode::ModeSwitch;

/// 长轮询超时（毫秒）
const SYNC_TIMEOUT_MS: u64 = 30_000;

/// sync 失败后的重试间隔
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// 从 sync 结果中提取的命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingCommand {
    pub room_id: String,
    pub event_id: String,
    pub sender: String,
    pub command: Command,
}

/// 提取他人发送的命令（忽略 bot 自己的消息），保持时间线顺序
pub fn extract_commands(sync: &SyncResponse, own_user_id: &str) -> Vec<IncomingCommand> {
    let mut rooms: Vec<_> = sync.rooms.join.iter().collect();
    rooms.sort_by(|a, b| a.0.cmp(b.0));

    let mut commands = Vec::new();
    for (room_id, room) in rooms {
        for event in &room.timeline.events {
            if event.sender == own_user_id {
                continue;
            }
            let Some(command) = event.message_body().and_then(Command::parse) else {
                continue;
            };
            commands.push(IncomingCommand {
                room_id: room_id.clone(),
                event_id: event.event_id.clone(),
                sender: event.sender.clone(),
                command,
            });
        }
    }
    commands
}

/// 反复执行 `op` 直到成功，失败间隔 `delay`；收到 shutdown 时返回 None
pub(crate) async fn retry_until_ok<T, E, F, Fut>(
    what: &str,
    delay: Duration,
    shutdown: &mut watch::Receiver<bool>,
    mut op: F,
) -> Option<T>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    loop {
        let result = tokio::select! {
            _ = shutdown.changed() => return None,
            r = op() => r,
        };
        match result {
            Ok(value) => return Some(value),
            Err(e) => {
                warn!(error = %e, "{what} failed, retrying");
                tokio::select! {
                    _ = shutdown.changed() => return None,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}

/// 命令循环
pub struct CommandLoop {
    client: Arc<MatrixClient>,
    mode: Arc<ModeSwitch>,
    public_url: String,
    auto_join: bool,
}

impl CommandLoop {
    pub fn new(client: Arc<MatrixClient>, mode: Arc<ModeSwitch>, public_url: String, auto_join: bool) -> Self {
        Self {
            client,
            mode,
            public_url,
            auto_join,
        }
    }

    /// 运行直到收到 shutdown 信号，homeserver 的暂时故障只会重试
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let whoami = retry_until_ok("Resolving bot user id", RETRY_DELAY, &mut shutdown, || {
            self.client.whoami()
        })
        .await;
        let Some(own_user_id) = whoami else {
            info!("Command loop stopped");
            return;
        };
        info!(user_id = %own_user_id, "Command loop started");

        // 初始 sync 只取 next_batch，不处理历史消息
        let mut since = self.initial_sync(&mut shutdown).await;

        loop {
            if *shutdown.borrow() {
                break;
            }
            let result = tokio::select! {
                _ = shutdown.changed() => break,
                r = self.client.sync(since.as_deref(), SYNC_TIMEOUT_MS) => r,
            };

            match result {
                Ok(sync) => {
                    self.handle_sync(&sync, &own_user_id).await;
                    since = Some(sync.next_batch);
                }
                Err(e) => {
                    warn!(error = %e, "Sync failed, retrying");
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(RETRY_DELAY) => {}
                    }
                }
            }
        }

        info!("Command loop stopped");
    }

    async fn initial_sync(&self, shutdown: &mut watch::Receiver<bool>) -> Option<String> {
        let sync = retry_until_ok("Initial sync", RETRY_DELAY, shutdown, || {
            self.client.sync(None, 0)
        })
        .await?;
        // 启动前收到的邀请也要处理
        self.accept_invites(&sync).await;
        Some(sync.next_batch)
    }

    async fn handle_sync(&self, sync: &SyncResponse, own_user_id: &str) {
        self.accept_invites(sync).await;

        for incoming in extract_commands(sync, own_user_id) {
            debug!(room_id = %incoming.room_id, sender = %incoming.sender, command = ?incoming.command, "Command received");
            let ctx = CommandContext {
                room_id: &incoming.room_id,
                public_url: &self.public_url,
                mode: &self.mode,
            };
            let result = match commands::execute(incoming.command, &ctx) {
                Reply::Reply(text) => self
                    .client
                    .send_reply(&incoming.room_id, &incoming.event_id, &text)
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string()),
                Reply::Message(text) => self
                    .client
                    .send_markdown(&incoming.room_id, &text)
                    .await
                    .map_err(|e| e.to_string()),
            };
            if let Err(e) = result {
                warn!(room_id = %incoming.room_id, error = %e, "Failed to answer command");
            }
        }
    }

    async fn accept_invites(&self, sync: &SyncResponse) {
        if !self.auto_join {
            return;
        }
        for room_id in sync.rooms.invite.keys() {
            if let Err(e) = self.client.join(room_id).await {
                warn!(room_id = %room_id, error = %e, "Failed to accept invite");
            }
        }
    }
}
