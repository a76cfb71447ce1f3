//! Prometheus Alertmanager webhook

use serde_json::Value;

use crate::alert::error::RenderError;
use crate::alert::probe::{display, lookup, lookup_present, nested, require_array, require_display};

/// 按固定顺序输出的标签
const KNOWN_LABELS: [&str; 3] = ["alertname", "instance", "job"];

/// 每条 alert 一条消息，缺失的标签直接跳过
pub fn render(payload: &Value) -> Result<Vec<String>, RenderError> {
    require_array(payload, "/alerts")?
        .iter()
        .enumerate()
        .map(|(i, alert)| render_alert(alert).map_err(|e| nested(&format!("/alerts/{i}"), e)))
        .collect()
}

fn render_alert(alert: &Value) -> Result<String, RenderError> {
    let title = match lookup_present(alert, "/annotations/description") {
        Some(description) => display(description),
        None => require_display(alert, "/annotations/summary")?,
    };
    let status = require_display(alert, "/status")?;
    let emoji = if status == "resolved" { "💚" } else { "🔥" };

    let mut message = format!("**{status}** {emoji}: {title}");
    for label in KNOWN_LABELS {
        if let Some(value) = lookup(alert, &format!("/labels/{label}")) {
            message.push_str(&format!("\n* **{}**: {}", capitalize(label), display(value)));
        }
    }
    Ok(message)
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
