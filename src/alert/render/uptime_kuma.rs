//! Uptime Kuma webhook（heartbeat + monitor）

use serde_json::Value;

use crate::alert::error::RenderError;
use crate::alert::probe::{nested, require_array, require_display};

/// 监控下线（heartbeat.status == 0）
pub fn render_alert(payload: &Value) -> Result<Vec<String>, RenderError> {
    let tags = tag_names(payload)?;
    let url = require_display(payload, "/monitor/url")?;
    let msg = require_display(payload, "/heartbeat/msg")?;
    let time = require_display(payload, "/heartbeat/time")?;

    Ok(vec![format!(
        "**Firing 🔥**: Monitor down: {url}\n\
         \n\
         * **Error:** {msg}\n\
         * **Started at:** {time}\n\
         * **Tags:** {tags}\n\
         * **Source:** Uptime Kuma"
    )])
}

/// 监控恢复（heartbeat.status == 1）
pub fn render_resolved(payload: &Value) -> Result<Vec<String>, RenderError> {
    let tags = tag_names(payload)?;
    let url = require_display(payload, "/monitor/url")?;
    let msg = require_display(payload, "/heartbeat/msg")?;
    let time = require_display(payload, "/heartbeat/time")?;
    let duration = require_display(payload, "/heartbeat/duration")?;

    Ok(vec![format!(
        "**Resolved 💚**: {url}\n\
         \n\
         * **Status:** {msg}\n\
         * **Started at:** {time}\n\
         * Duration until resolved {duration}s\n\
         * **Tags:** {tags}\n\
         * **Source:** Uptime Kuma"
    )])
}

fn tag_names(payload: &Value) -> Result<String, RenderError> {
    let names = require_array(payload, "/monitor/tags")?
        .iter()
        .enumerate()
        .map(|(i, tag)| {
            require_display(tag, "/name")
                .map(|name| name.into_owned())
                .map_err(|e| nested(&format!("/monitor/tags/{i}"), e))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_alert() {
        let payload = json!({
            "heartbeat": {"status": 0, "msg": "down", "time": "t0"},
            "monitor": {"url": "http://x", "tags": [{"name": "prod"}]}
        });
        let messages = render_alert(&payload).unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("**Firing 🔥**: Monitor down: http://x"));
        assert!(messages[0].contains("**Tags:** prod"));
        assert!(messages[0].contains("* **Error:** down"));
        assert!(messages[0].contains("* **Started at:** t0"));
    }

    #[test]
    fn test_render_resolved() {
        let payload = json!({
            "heartbeat": {"status": 1, "msg": "200 - OK", "time": "2024-03-01 10:00:00", "duration": 42},
            "monitor": {"url": "https://example.com", "tags": [{"name": "prod"}, {"name": "web"}]}
        });
        assert_eq!(
            render_resolved(&payload).unwrap(),
            vec![
                "**Resolved 💚**: https://example.com\n\
                 \n\
                 * **Status:** 200 - OK\n\
                 * **Started at:** 2024-03-01 10:00:00\n\
                 * Duration until resolved 42s\n\
                 * **Tags:** prod, web\n\
                 * **Source:** Uptime Kuma"
            ]
        );
    }

    #[test]
    fn test_empty_tags() {
        let payload = json!({
            "heartbeat": {"status": 0, "msg": "timeout", "time": "t"},
            "monitor": {"url": "http://x", "tags": []}
        });
        assert!(render_alert(&payload).unwrap()[0].contains("* **Tags:** \n"));
    }

    #[test]
    fn test_missing_monitor_is_error() {
        let payload = json!({"heartbeat": {"status": 0, "msg": "down", "time": "t0"}});
        assert_eq!(
            render_alert(&payload).unwrap_err().to_string(),
            "missing field `/monitor/tags`"
        );
    }
}
