//! 各告警源的渲染器
//!
//! 每个渲染器都是纯函数：payload -> 有序 markdown 消息列表。
//! `fallback` 用于无法识别的 payload，永不失败。

pub mod fallback;
pub mod grafana;
pub mod prometheus;
pub mod slack;
pub mod uptime_kuma;
