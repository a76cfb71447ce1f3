//! Slack 格式 webhook（text + attachments，可选 sections）

use serde_json::Value;

use crate::alert::error::RenderError;
use crate::alert::probe::{display, lookup, lookup_present, nested, require_array, require_display};

/// 渲染 Slack 格式 payload，所有内容合并为一条消息
pub fn render(payload: &Value) -> Result<Vec<String>, RenderError> {
    let mut lines: Vec<String> = Vec::new();
    let mut attachment_titles: Vec<&Value> = Vec::new();

    if let Some(text) = lookup(payload, "/text") {
        lines.push(display(text).into_owned());
    }

    if lookup(payload, "/attachments").is_some() {
        for (i, attachment) in require_array(payload, "/attachments")?.iter().enumerate() {
            render_attachment(attachment, &mut lines, &mut attachment_titles)
                .map_err(|e| nested(&format!("/attachments/{i}"), e))?;
        }
    }

    if lookup(payload, "/sections").is_some() {
        lines.push(String::new());
        for section in require_array(payload, "/sections")? {
            if let Some(title) = lookup(section, "/activityTitle") {
                if !attachment_titles.contains(&title) {
                    lines.push(format!("## {}", display(title)));
                }
            }
            if let Some(subtitle) = lookup(section, "/activitySubtitle") {
                lines.push(display(subtitle).into_owned());
            }
        }
    }

    Ok(vec![lines.join("\n")])
}

fn render_attachment<'a>(
    attachment: &'a Value,
    lines: &mut Vec<String>,
    titles: &mut Vec<&'a Value>,
) -> Result<(), RenderError> {
    if let Some(title) = lookup(attachment, "/title") {
        titles.push(title);
        let heading = match lookup(attachment, "/title_link") {
            Some(link) => format!("[{}]({})", display(title), display(link)),
            None => format!("## {}", display(title)),
        };
        lines.push(format!("> {heading}"));
    }

    if let Some(text) = lookup_present(attachment, "/text") {
        lines.push(format!("> {}", display(text)));
    }
    if let Some(image) = lookup_present(attachment, "/image_url") {
        lines.push(format!("> ![Image]({})", display(image)));
    }

    if lookup(attachment, "/fields").is_some() {
        for (i, field) in require_array(attachment, "/fields")?.iter().enumerate() {
            let prefix = format!("/fields/{i}");
            let title = require_display(field, "/title").map_err(|e| nested(&prefix, e))?;
            let value = require_display(field, "/value").map_err(|e| nested(&prefix, e))?;
            lines.push(format!("> - **{title}** : {value}"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_full_attachment() {
        let payload = json!({
            "text": "Deploy finished",
            "attachments": [{
                "title": "Build #42",
                "title_link": "https://ci.example.com/42",
                "text": "All green",
                "image_url": "https://ci.example.com/42.png",
                "fields": [
                    {"title": "Branch", "value": "main"},
                    {"title": "Duration", "value": 93}
                ]
            }]
        });

        let messages = render(&payload).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0],
            "Deploy finished\n\
             > [Build #42](https://ci.example.com/42)\n\
             > All green\n\
             > ![Image](https://ci.example.com/42.png)\n\
             > - **Branch** : main\n\
             > - **Duration** : 93"
        );
    }

    #[test]
    fn test_render_title_without_link_is_heading() {
        let payload = json!({"text": "", "attachments": [{"title": "Disk full", "text": null}]});
        let messages = render(&payload).unwrap();
        assert_eq!(messages, vec!["\n> ## Disk full"]);
    }

    #[test]
    fn test_sections_skip_titles_already_emitted() {
        let payload = json!({
            "text": "t",
            "attachments": [{"title": "Same"}],
            "sections": [
                {"activityTitle": "Same", "activitySubtitle": "sub 1"},
                {"activityTitle": "Other"}
            ]
        });
        let messages = render(&payload).unwrap();
        assert_eq!(messages[0], "t\n> ## Same\n\nsub 1\n## Other");
    }

    #[test]
    fn test_field_without_value_is_error() {
        let payload = json!({"text": "t", "attachments": [{"fields": [{"title": "x"}]}]});
        let err = render(&payload).unwrap_err();
        assert_eq!(err.to_string(), "missing field `/attachments/0/fields/0/value`");
    }

    #[test]
    fn test_attachments_must_be_array() {
        let payload = json!({"text": "t", "attachments": "nope"});
        assert!(render(&payload).is_err());
    }
}
