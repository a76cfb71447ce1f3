//! 告警分类与渲染管线
//!
//! payload (JSON) -> [raw 直通 | 格式检测 -> 渲染器 | 兜底渲染] -> 有序 markdown 消息
//!
//! 管线本身是纯函数，不做 I/O，可并发调用。

pub mod classify;
pub mod dispatch;
pub mod error;
pub mod probe;
pub mod render;

pub use classify::{detect, AlertKind};
pub use dispatch::{classify_and_render, get_alert_messages};
pub use error::RenderError;
