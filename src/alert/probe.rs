//! 可选字段访问 - 缺失即 None，而不是错误
//!
//! 路径统一使用 JSON Pointer 语法（如 `/alerts/0/labels/job`），
//! 中间层缺失、数组越界、类型不符都视为"不存在"。

use std::borrow::Cow;

use serde_json::Value;

use super::error::RenderError;

/// 按 JSON Pointer 查找字段，任何一层缺失都返回 None
pub fn lookup<'a>(value: &'a Value, pointer: &str) -> Option<&'a Value> {
    value.pointer(pointer)
}

/// 查找字段并过滤掉 null
pub fn lookup_present<'a>(value: &'a Value, pointer: &str) -> Option<&'a Value> {
    lookup(value, pointer).filter(|v| !v.is_null())
}

/// 必需字段，缺失时返回 `RenderError::MissingField`
pub fn require<'a>(value: &'a Value, pointer: &str) -> Result<&'a Value, RenderError> {
    lookup(value, pointer).ok_or_else(|| RenderError::missing(pointer))
}

/// 必需的数组字段
pub fn require_array<'a>(value: &'a Value, pointer: &str) -> Result<&'a [Value], RenderError> {
    require(value, pointer)?
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| RenderError::UnexpectedType {
            path: pointer.to_string(),
            expected: "an array",
        })
}

/// 必需字段的展示形式
pub fn require_display<'a>(value: &'a Value, pointer: &str) -> Result<Cow<'a, str>, RenderError> {
    require(value, pointer).map(display)
}

/// 字符串原样输出，其余类型输出紧凑 JSON
pub fn display(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s.as_str()),
        other => Cow::Owned(other.to_string()),
    }
}

/// 真值判断：null、false、0、空字符串、空数组、空对象为假
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// 给相对路径加上前缀，用于遍历数组元素时定位错误
pub fn nested(prefix: &str, err: RenderError) -> RenderError {
    match err {
        RenderError::MissingField { path } => RenderError::MissingField {
            path: format!("{prefix}{path}"),
        },
        RenderError::UnexpectedType { path, expected } => RenderError::UnexpectedType {
            path: format!("{prefix}{path}"),
            expected,
        },
        RenderError::UnexpectedValue { path, value } => RenderError::UnexpectedValue {
            path: format!("{prefix}{path}"),
            value,
        },
        RenderError::InvalidTimestamp { path, source } => RenderError::InvalidTimestamp {
            path: format!("{prefix}{path}"),
            source,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_missing_intermediate_is_none() {
        let v = json!({"alerts": []});
        assert!(lookup(&v, "/alerts/0/labels/job").is_none());
        assert!(lookup(&v, "/nope/deeper").is_none());

        let v = json!({"alerts": "not-an-array"});
        assert!(lookup(&v, "/alerts/0/labels").is_none());
    }

    #[test]
    fn test_lookup_present_skips_null() {
        let v = json!({"text": null, "title": "x"});
        assert!(lookup(&v, "/text").is_some());
        assert!(lookup_present(&v, "/text").is_none());
        assert_eq!(lookup_present(&v, "/title"), Some(&json!("x")));
    }

    #[test]
    fn test_require_reports_pointer() {
        let v = json!({"labels": {}});
        let err = require(&v, "/labels/alertname").unwrap_err();
        assert_eq!(err.to_string(), "missing field `/labels/alertname`");

        let err = nested("/alerts/2", err);
        assert_eq!(err.to_string(), "missing field `/alerts/2/labels/alertname`");
    }

    #[test]
    fn test_require_array_type_mismatch() {
        let v = json!({"alerts": {"a": 1}});
        let err = require_array(&v, "/alerts").unwrap_err();
        assert!(matches!(err, RenderError::UnexpectedType { .. }));
    }

    #[test]
    fn test_display() {
        assert_eq!(display(&json!("plain")), "plain");
        assert_eq!(display(&json!(42)), "42");
        assert_eq!(display(&json!(true)), "true");
        assert_eq!(display(&json!(null)), "null");
    }

    #[test]
    fn test_is_truthy() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!([])));
        assert!(!is_truthy(&json!({})));
        assert!(is_truthy(&json!("General")));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!(["x"])));
    }
}
