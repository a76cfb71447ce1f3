//! 格式检测 - 判断 webhook payload 来自哪种告警源
//!
//! 按顺序逐条匹配规则，第一条命中即返回。顺序很重要：
//! Grafana 和 Prometheus 共用 `alerts[]` 结构，必须先检查 Grafana 专有的
//! `grafana_folder` 标签，再回落到更通用的 `job` 标签。

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use super::probe::{is_truthy, lookup};

/// 告警格式分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertKind {
    SlackWebhook,
    GrafanaAlert,
    GrafanaResolved,
    PrometheusAlert,
    PrometheusResolved,
    UptimeKumaAlert,
    UptimeKumaResolved,
    NotFound,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::SlackWebhook => "slack-webhook",
            AlertKind::GrafanaAlert => "grafana-alert",
            AlertKind::GrafanaResolved => "grafana-resolved",
            AlertKind::PrometheusAlert => "prometheus-alert",
            AlertKind::PrometheusResolved => "prometheus-resolved",
            AlertKind::UptimeKumaAlert => "uptime-kuma-alert",
            AlertKind::UptimeKumaResolved => "uptime-kuma-resolved",
            AlertKind::NotFound => "not-found",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一条检测规则：命中返回分类，否则 None
struct Rule {
    name: &'static str,
    probe: fn(&Value) -> Option<AlertKind>,
}

/// 检测规则，自上而下求值
const RULES: &[Rule] = &[
    Rule { name: "slack", probe: probe_slack },
    Rule { name: "uptime-kuma", probe: probe_uptime_kuma },
    Rule { name: "grafana", probe: probe_grafana },
    Rule { name: "prometheus", probe: probe_prometheus },
];

/// 检测 payload 格式，永不失败，无法识别时返回 `AlertKind::NotFound`
pub fn detect(payload: &Value) -> AlertKind {
    for rule in RULES {
        if let Some(kind) = (rule.probe)(payload) {
            tracing::trace!(rule = rule.name, kind = %kind, "Alert format detected");
            return kind;
        }
    }
    AlertKind::NotFound
}

fn probe_slack(payload: &Value) -> Option<AlertKind> {
    let has_text = lookup(payload, "/text").is_some();
    let has_attachments = lookup(payload, "/attachments").is_some();
    (has_text && has_attachments).then_some(AlertKind::SlackWebhook)
}

fn probe_uptime_kuma(payload: &Value) -> Option<AlertKind> {
    // 0 = DOWN, 1 = UP；其他状态（如 pending）交给后续规则
    let status = lookup(payload, "/heartbeat/status")?.as_f64()?;
    if status == 0.0 {
        Some(AlertKind::UptimeKumaAlert)
    } else if status == 1.0 {
        Some(AlertKind::UptimeKumaResolved)
    } else {
        None
    }
}

fn probe_grafana(payload: &Value) -> Option<AlertKind> {
    probe_alert_label(
        payload,
        "/alerts/0/labels/grafana_folder",
        AlertKind::GrafanaAlert,
        AlertKind::GrafanaResolved,
    )
}

fn probe_prometheus(payload: &Value) -> Option<AlertKind> {
    probe_alert_label(
        payload,
        "/alerts/0/labels/job",
        AlertKind::PrometheusAlert,
        AlertKind::PrometheusResolved,
    )
}

/// 标签为真且存在顶层 status 时按 firing / 其他 区分
fn probe_alert_label(
    payload: &Value,
    label: &str,
    firing: AlertKind,
    resolved: AlertKind,
) -> Option<AlertKind> {
    if !lookup(payload, label).is_some_and(is_truthy) {
        return None;
    }
    let status = lookup(payload, "/status")?;
    if status.as_str() == Some("firing") {
        Some(firing)
    } else {
        Some(resolved)
    }
}
