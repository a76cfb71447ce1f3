//! `/sync` 响应（只反序列化用到的字段）

use std::collections::HashMap;

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncResponse {
    pub next_batch: String,
    #[serde(default)]
    pub rooms: Rooms,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Rooms {
    #[serde(default)]
    pub join: HashMap<String, JoinedRoom>,
    #[serde(default)]
    pub invite: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JoinedRoom {
    #[serde(default)]
    pub timeline: Timeline,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Timeline {
    #[serde(default)]
    pub events: Vec<RoomEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoomEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub event_id: String,
    #[serde(default)]
    pub content: serde_json::Value,
}

impl RoomEvent {
    /// 文本消息正文（m.text / m.notice 等）
    pub fn message_body(&self) -> Option<&str> {
        if self.event_type != "m.room.message" {
            return None;
        }
        self.content.get("body").and_then(|b| b.as_str())
    }
}
