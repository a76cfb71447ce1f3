//! 操作员命令 - `!help` / `!ping` / `!raw` / `!roomid` / `!url`
//!
//! 这里只负责解析命令并生成回复文本，收发消息由 `matrix::sync` 完成。

use std::str::FromStr;

use crate::mode::ModeSwitch;

/// 命令前缀
pub const COMMAND_PREFIX: char = '!';

pub const HELP_TEXT: &str = "# Alertbot

To control the alertbot you can use the following commands:
* `!help`: To show this help
* `!ping`: To check if the bot is alive
* `!raw`: To toggle raw mode (where webhook data is not parsed but simply forwarded as copyable text)
* `!roomid`: To let the bot show you the current matrix room id
* `!url`: To let the bot show you the webhook url

More information is on [Github](https://github.com/moan0s/alertbot)
";

/// 操作员命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Help,
    Ping,
    Raw,
    RoomId,
    Url,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "help" => Ok(Command::Help),
            "ping" => Ok(Command::Ping),
            "raw" => Ok(Command::Raw),
            "roomid" => Ok(Command::RoomId),
            "url" => Ok(Command::Url),
            other => Err(format!("unknown command: {other}")),
        }
    }
}

impl Command {
    /// 从消息正文解析命令，非命令消息和未知命令返回 None
    pub fn parse(body: &str) -> Option<Self> {
        let rest = body.trim_start().strip_prefix(COMMAND_PREFIX)?;
        let word = rest.split_whitespace().next()?;
        word.parse().ok()
    }
}

/// 命令回复
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// 以回复形式引用原消息
    Reply(String),
    /// 直接发送到房间
    Message(String),
}

impl Reply {
    pub fn text(&self) -> &str {
        match self {
            Reply::Reply(text) | Reply::Message(text) => text,
        }
    }
}

/// 执行命令所需的上下文
pub struct CommandContext<'a> {
    pub room_id: &'a str,
    pub public_url: &'a str,
    pub mode: &'a ModeSwitch,
}

/// 执行命令，`Raw` 会切换全局模式
pub fn execute(command: Command, ctx: &CommandContext<'_>) -> Reply {
    match command {
        Command::Help => Reply::Message(HELP_TEXT.to_string()),
        Command::Ping => Reply::Reply("pong".to_string()),
        Command::RoomId => Reply::Reply(format!("`{}`", ctx.room_id)),
        Command::Url => Reply::Reply(format!("`{}`", webhook_url(ctx.public_url, ctx.room_id))),
        Command::Raw => {
            let mode = ctx.mode.toggle();
            tracing::info!(mode = %mode, room_id = %ctx.room_id, "Render mode toggled");
            Reply::Reply(format!("Mode is now: `{mode} mode`"))
        }
    }
}

/// 某个房间的 webhook 地址
pub fn webhook_url(public_url: &str, room_id: &str) -> String {
    format!("{}/webhook/{}", public_url.trim_end_matches('/'), room_id)
}
