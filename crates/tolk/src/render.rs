//! Terminal rendering of conversation records

use serde_json::Value;
use tolk_agent::{ContentPart, Role, TurnRecord};

const MAX_PREVIEW_CHARS: usize = 80;

fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= MAX_PREVIEW_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(MAX_PREVIEW_CHARS).collect();
    format!("{}…", cut)
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// One-line summary of a tool result
fn summarize_result(name: &str, result: &Value) -> String {
    if let Some(error) = result.get("error").and_then(Value::as_str) {
        return format!("{}: {}", error, preview(str_field(result, "message")));
    }
    if str_field(result, "status") == "error" {
        return format!("error: {}", preview(str_field(result, "error_message")));
    }

    match name {
        "List" => {
            let total = result.get("total").and_then(Value::as_u64).unwrap_or(0);
            format!("{} files", total)
        }
        "Read" => {
            let size = result
                .pointer("/metadata/size")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            format!("{} bytes", size)
        }
        "Think" => str_field(result, "result").to_string(),
        "Translate" => {
            let status = str_field(result, "status");
            let translated = preview(str_field(result, "translated_string"));
            match str_field(result, "reason") {
                "" => format!("{}: {}", status, translated),
                reason => format!("{}: {} ({})", status, translated, preview(reason)),
            }
        }
        _ => preview(&result.to_string()),
    }
}

/// Lines to print for a record; user records are not echoed.
pub fn render_record(record: &TurnRecord) -> Vec<String> {
    if record.role == Role::User {
        return Vec::new();
    }

    record
        .content
        .iter()
        .filter_map(|part| match part {
            ContentPart::Text { text } if !text.trim().is_empty() => {
                Some(format!("\n◆ {}\n", text.trim()))
            }
            ContentPart::Text { .. } => None,
            ContentPart::ToolCall {
                name, arguments, ..
            } => Some(format!("  → {} {}", name, preview(&arguments.to_string()))),
            ContentPart::ToolResult { name, result, .. } => {
                Some(format!("  ← {} {}", name, summarize_result(name, result)))
            }
        })
        .collect()
}
