//! Grafana unified alerting webhook

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::alert::error::RenderError;
use crate::alert::probe::{display, lookup, nested, require, require_array, require_display};

/// 每条 alert 一条消息，保持数组顺序
pub fn render(payload: &Value) -> Result<Vec<String>, RenderError> {
    require_array(payload, "/alerts")?
        .iter()
        .enumerate()
        .map(|(i, alert)| render_alert(alert).map_err(|e| nested(&format!("/alerts/{i}"), e)))
        .collect()
}

fn render_alert(alert: &Value) -> Result<String, RenderError> {
    let name = alert_name(alert)?;
    let status = require(alert, "/status")?;

    match status.as_str() {
        Some("firing") => {
            let silence = require_display(alert, "/silenceURL")?;
            Ok(format!("**Firing 🔥**: {name} ([silence]({silence}))"))
        }
        Some("resolved") => {
            let starts_at = parse_timestamp(alert, "/startsAt")?;
            let ends_at = parse_timestamp(alert, "/endsAt")?;
            debug!(
                alert = %name,
                duration_secs = (ends_at - starts_at).num_seconds(),
                "Grafana alert resolved"
            );
            Ok(format!("**Resolved 🥳**: {name}"))
        }
        _ => Err(RenderError::UnexpectedValue {
            path: "/status".to_string(),
            value: status.to_string(),
        }),
    }
}

/// `alertname`，后缀 `name` 或 `rulename`（如果有）
fn alert_name(alert: &Value) -> Result<String, RenderError> {
    let base = require_display(alert, "/labels/alertname")?;
    let suffix = lookup(alert, "/labels/name").or_else(|| lookup(alert, "/labels/rulename"));
    Ok(match suffix {
        Some(suffix) => format!("{base} - {}", display(suffix)),
        None => base.into_owned(),
    })
}

/// 没有时区的 ISO 8601 时间按 UTC 处理
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

fn parse_timestamp(alert: &Value, pointer: &str) -> Result<DateTime<Utc>, RenderError> {
    let raw = require_display(alert, pointer)?;
    let raw = raw.trim();
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Ok(ts.with_timezone(&Utc)),
        Err(source) => NAIVE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .map(|naive| naive.and_utc())
            .ok_or_else(|| RenderError::InvalidTimestamp {
                path: pointer.to_string(),
                source,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn firing(alertname: &str) -> Value {
        json!({
            "status": "firing",
            "labels": {"alertname": alertname, "grafana_folder": "Infra"},
            "silenceURL": format!("https://grafana.example.com/silence/{alertname}")
        })
    }

    #[test]
    fn test_render_firing() {
        let payload = json!({"status": "firing", "alerts": [firing("HighCPU")]});
        assert_eq!(
            render(&payload).unwrap(),
            vec!["**Firing 🔥**: HighCPU ([silence](https://grafana.example.com/silence/HighCPU))"]
        );
    }

    #[test]
    fn test_render_preserves_order() {
        let payload = json!({
            "status": "firing",
            "alerts": [firing("A"), firing("B"), firing("C")]
        });
        let messages = render(&payload).unwrap();
        assert_eq!(messages.len(), 3);
        assert!(messages[0].contains(": A ("));
        assert!(messages[1].contains(": B ("));
        assert!(messages[2].contains(": C ("));
    }

    #[test]
    fn test_render_resolved_with_name_suffix() {
        let payload = json!({
            "status": "resolved",
            "alerts": [{
                "status": "resolved",
                "labels": {"alertname": "DiskFull", "name": "db-1", "rulename": "ignored"},
                "startsAt": "2024-03-01T10:00:00Z",
                "endsAt": "2024-03-01T10:05:00+00:00"
            }]
        });
        assert_eq!(render(&payload).unwrap(), vec!["**Resolved 🥳**: DiskFull - db-1"]);
    }

    #[test]
    fn test_rulename_suffix_when_no_name() {
        let alert = json!({"labels": {"alertname": "DiskFull", "rulename": "disk rule"}});
        assert_eq!(alert_name(&alert).unwrap(), "DiskFull - disk rule");
    }

    #[test]
    fn test_missing_silence_url_is_error() {
        let mut alert = firing("HighCPU");
        alert.as_object_mut().unwrap().remove("silenceURL");
        let payload = json!({"status": "firing", "alerts": [alert]});
        let err = render(&payload).unwrap_err();
        assert_eq!(err.to_string(), "missing field `/alerts/0/silenceURL`");
    }

    #[test]
    fn test_resolved_accepts_timestamps_without_offset() {
        let payload = json!({
            "alerts": [{
                "status": "resolved",
                "labels": {"alertname": "DiskFull"},
                "startsAt": "2024-03-01T10:00:00",
                "endsAt": "2024-03-01 10:05:00.250"
            }]
        });
        assert_eq!(render(&payload).unwrap(), vec!["**Resolved 🥳**: DiskFull"]);

        let alert = &payload["alerts"][0];
        let starts_at = parse_timestamp(alert, "/startsAt").unwrap();
        let ends_at = parse_timestamp(alert, "/endsAt").unwrap();
        assert_eq!((ends_at - starts_at).num_seconds(), 300);
    }

    #[test]
    fn test_invalid_timestamp_is_error() {
        let payload = json!({
            "alerts": [{
                "status": "resolved",
                "labels": {"alertname": "X"},
                "startsAt": "yesterday",
                "endsAt": "2024-03-01T10:05:00Z"
            }]
        });
        assert!(matches!(
            render(&payload).unwrap_err(),
            RenderError::InvalidTimestamp { .. }
        ));
    }

    #[test]
    fn test_unknown_status_is_error() {
        let payload = json!({"alerts": [{"status": "pending", "labels": {"alertname": "X"}}]});
        assert!(matches!(
            render(&payload).unwrap_err(),
            RenderError::UnexpectedValue { .. }
        ));
    }
}
