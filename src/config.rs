//! Bot 配置
//!
//! 加载优先级（后者覆盖前者）：
//! 1. 默认值
//! 2. 配置文件 `~/.config/alertbot/config.json`（或 `--config` 指定的路径）
//! 3. 环境变量 `ALERTBOT_*`
//! 4. 命令行参数（由调用方通过 `apply_overrides` 传入）

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::mode::RenderMode;

/// 默认监听地址
pub const DEFAULT_LISTEN: &str = "0.0.0.0:8080";

/// 默认对外地址（用于 `!url` 命令）
pub const DEFAULT_PUBLIC_URL: &str = "http://localhost:8080";

/// Bot 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Matrix homeserver 地址 (如 https://matrix.example.org)
    pub homeserver: String,
    /// Bot 账号的 access token
    pub access_token: String,
    /// Webhook 对外可访问的基础地址
    pub public_url: String,
    /// HTTP 监听地址
    pub listen: String,
    /// 启动时是否为 raw 模式
    pub raw_mode: bool,
    /// 是否自动接受房间邀请
    pub auto_join: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            homeserver: String::new(),
            access_token: String::new(),
            public_url: DEFAULT_PUBLIC_URL.to_string(),
            listen: DEFAULT_LISTEN.to_string(),
            raw_mode: false,
            auto_join: true,
        }
    }
}

/// 命令行覆盖项
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub listen: Option<String>,
    pub public_url: Option<String>,
    pub raw_mode: bool,
}

impl BotConfig {
    /// 默认配置文件路径
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("alertbot").join("config.json"))
    }

    /// 按优先级加载配置：文件 -> 环境变量
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// 从 JSON 文件读取
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// 应用环境变量，`lookup` 便于测试时注入
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = non_empty("ALERTBOT_HOMESERVER") {
            self.homeserver = v;
        }
        if let Some(v) = non_empty("ALERTBOT_ACCESS_TOKEN") {
            self.access_token = v;
        }
        if let Some(v) = non_empty("ALERTBOT_PUBLIC_URL") {
            self.public_url = v;
        }
        if let Some(v) = non_empty("ALERTBOT_LISTEN") {
            self.listen = v;
        }
        if let Some(v) = non_empty("ALERTBOT_RAW_MODE") {
            self.raw_mode = matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
    }

    /// 应用命令行参数
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(listen) = overrides.listen {
            self.listen = listen;
        }
        if let Some(public_url) = overrides.public_url {
            self.public_url = public_url;
        }
        if overrides.raw_mode {
            self.raw_mode = true;
        }
    }

    /// 校验必填项
    pub fn validate(&self) -> Result<()> {
        if self.homeserver.is_empty() {
            return Err(anyhow!(
                "homeserver is required (config file `homeserver` or ALERTBOT_HOMESERVER)"
            ));
        }
        if self.access_token.is_empty() {
            return Err(anyhow!(
                "access_token is required (config file `access_token` or ALERTBOT_ACCESS_TOKEN)"
            ));
        }
        self.listen_addr()?;
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen
            .parse()
            .with_context(|| format!("Invalid listen address: {}", self.listen))
    }

    pub fn initial_mode(&self) -> RenderMode {
        RenderMode::from_raw_flag(self.raw_mode)
    }
}
