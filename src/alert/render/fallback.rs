//! 通用兜底渲染 - 把任意 JSON 展开成缩进的 markdown 列表

use serde_json::Value;

use crate::alert::probe::display;

const INDENT: &str = "  ";

/// 递归展开 JSON，叶子节点输出 `* key: value`，容器节点缩进两格
pub fn dump(value: &Value) -> String {
    let mut out = String::new();
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                dump_entry(&mut out, key, child);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                dump_entry(&mut out, &i.to_string(), child);
            }
        }
        scalar => {
            out.push_str(&display(scalar));
            out.push('\n');
        }
    }
    out
}

fn dump_entry(out: &mut String, key: &str, child: &Value) {
    match child {
        Value::Object(_) | Value::Array(_) => {
            out.push_str(&format!("* {key}:\n"));
            for line in dump(child).lines() {
                out.push_str(INDENT);
                out.push_str(line);
                out.push('\n');
            }
        }
        scalar => out.push_str(&format!("* {key}: {}\n", display(scalar))),
    }
}
