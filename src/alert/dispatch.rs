//! 分发 - 检测格式并路由到对应渲染器
//!
//! 失败隔离：已识别格式但字段缺失时，返回包含原始 payload、检测类型和错误详情的
//! 诊断消息，而不是报错或返回空列表。任何已解码的 payload 至少产生一条消息。

use serde_json::Value;
use tracing::warn;

use super::classify::{detect, AlertKind};
use super::error::RenderError;
use super::render::{fallback, grafana, prometheus, slack, uptime_kuma};
use crate::mode::RenderMode;

/// 诊断消息中的问题反馈地址
pub const ISSUE_TRACKER_URL: &str = "https://github.com/moan0s/alertbot/issues";

/// 将 payload 转换为 markdown 消息列表
pub fn get_alert_messages(payload: &Value, mode: RenderMode) -> Vec<String> {
    classify_and_render(payload, mode).1
}

/// 同 [`get_alert_messages`]，同时返回检测到的类型（raw 模式不做检测，为 None）
pub fn classify_and_render(payload: &Value, mode: RenderMode) -> (Option<AlertKind>, Vec<String>) {
    if mode.is_raw() {
        return (None, vec![format!("**Data received**\n{}", code_block(payload))]);
    }

    let kind = detect(payload);
    let messages = match render(kind, payload) {
        Ok(messages) => messages,
        Err(e) => {
            warn!(kind = %kind, error = %e, "Payload matched a known format but could not be rendered");
            vec![diagnostic(payload, kind, &e)]
        }
    };
    (Some(kind), messages)
}

/// 按分类调用渲染器；`NotFound` 走兜底渲染
pub fn render(kind: AlertKind, payload: &Value) -> Result<Vec<String>, RenderError> {
    match kind {
        AlertKind::SlackWebhook => slack::render(payload),
        AlertKind::GrafanaAlert | AlertKind::GrafanaResolved => grafana::render(payload),
        AlertKind::PrometheusAlert | AlertKind::PrometheusResolved => prometheus::render(payload),
        AlertKind::UptimeKumaAlert => uptime_kuma::render_alert(payload),
        AlertKind::UptimeKumaResolved => uptime_kuma::render_resolved(payload),
        AlertKind::NotFound => Ok(vec![format!("**Data received**\n{}", fallback::dump(payload))]),
    }
}

fn diagnostic(payload: &Value, kind: AlertKind, error: &RenderError) -> String {
    format!(
        "**Data received**\n{}\n\
         The data was detected as {kind} but was not in an expected format. \
         If you want to help the development of this bot, file a bug report [here]({ISSUE_TRACKER_URL})\n\
         {error}",
        code_block(payload)
    )
}

fn code_block(payload: &Value) -> String {
    let pretty = serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string());
    format!("```\n{}\n```", pretty.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn grafana_payload() -> Value {
        json!({
            "status": "firing",
            "alerts": [{
                "status": "firing",
                "labels": {"alertname": "HighCPU", "grafana_folder": "Infra"},
                "silenceURL": "https://grafana/silence"
            }]
        })
    }

    #[test]
    fn test_raw_mode_ignores_classification() {
        for payload in [grafana_payload(), json!({"anything": [1, 2]}), json!(null)] {
            let messages = get_alert_messages(&payload, RenderMode::Raw);
            assert_eq!(messages.len(), 1);
            assert!(messages[0].starts_with("**Data received**\n```\n"));
            assert!(messages[0].ends_with("\n```"));
        }
    }

    #[test]
    fn test_raw_mode_contains_payload() {
        let payload = json!({"host": "web-1"});
        let messages = get_alert_messages(&payload, RenderMode::Raw);
        assert_eq!(messages[0], "**Data received**\n```\n{\n  \"host\": \"web-1\"\n}\n```");
    }

    #[test]
    fn test_raw_mode_keeps_key_order() {
        let payload: Value = serde_json::from_str(r#"{"zeta": 1, "alpha": 2}"#).unwrap();
        let messages = get_alert_messages(&payload, RenderMode::Raw);
        assert_eq!(
            messages[0],
            "**Data received**\n```\n{\n  \"zeta\": 1,\n  \"alpha\": 2\n}\n```"
        );

        let messages = get_alert_messages(&payload, RenderMode::Normal);
        assert_eq!(messages[0], "**Data received**\n* zeta: 1\n* alpha: 2\n");
    }

    #[test]
    fn test_not_found_uses_fallback() {
        let payload = json!({"service": "backup", "result": {"ok": false, "files": 12}});
        let messages = get_alert_messages(&payload, RenderMode::Normal);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("**Data received**\n"));
        assert!(messages[0].contains("* service: backup"));
        assert!(messages[0].contains("* ok: false"));
        assert!(messages[0].contains("* files: 12"));
    }

    #[test]
    fn test_known_format_renders() {
        let messages = get_alert_messages(&grafana_payload(), RenderMode::Normal);
        assert_eq!(messages, vec!["**Firing 🔥**: HighCPU ([silence](https://grafana/silence))"]);
    }

    #[test]
    fn test_malformed_known_format_yields_diagnostic() {
        let mut payload = grafana_payload();
        payload["alerts"][0].as_object_mut().unwrap().remove("silenceURL");

        let messages = get_alert_messages(&payload, RenderMode::Normal);
        assert_eq!(messages.len(), 1);
        let message = &messages[0];
        assert!(message.starts_with("**Data received**\n```\n"));
        assert!(message.contains("\"alertname\": \"HighCPU\""));
        assert!(message.contains("detected as grafana-alert"));
        assert!(message.contains(ISSUE_TRACKER_URL));
        assert!(message.ends_with("missing field `/alerts/0/silenceURL`"));
    }

    #[test]
    fn test_classify_and_render_reports_kind() {
        let (kind, messages) = classify_and_render(&grafana_payload(), RenderMode::Normal);
        assert_eq!(kind, Some(AlertKind::GrafanaAlert));
        assert_eq!(messages, get_alert_messages(&grafana_payload(), RenderMode::Normal));

        let (kind, _) = classify_and_render(&grafana_payload(), RenderMode::Raw);
        assert_eq!(kind, None);
    }

    #[test]
    fn test_render_not_found_never_fails() {
        assert!(render(AlertKind::NotFound, &json!([1, "two", null])).is_ok());
    }
}
