//! Conversation log
//!
//! Append-only; records are never reordered or pruned.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    ToolCall {
        id: String,
        name: String,
        arguments: Value,
    },
    ToolResult {
        call_id: String,
        name: String,
        result: Value,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub role: Role,
    pub content: Vec<ContentPart>,
}

impl TurnRecord {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentPart::Text { text: text.into() }],
        }
    }

    pub fn assistant(content: Vec<ContentPart>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, name: impl Into<String>, result: Value) -> Self {
        Self {
            role: Role::Tool,
            content: vec![ContentPart::ToolResult {
                call_id: call_id.into(),
                name: name.into(),
                result,
            }],
        }
    }

    /// Concatenated text parts
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Tool calls carried by this record, as `(id, name, arguments)`
    pub fn tool_calls(&self) -> impl Iterator<Item = (&str, &str, &Value)> {
        self.content.iter().filter_map(|part| match part {
            ContentPart::ToolCall {
                id,
                name,
                arguments,
            } => Some((id.as_str(), name.as_str(), arguments)),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConversationLog {
    records: Vec<TurnRecord>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, record: TurnRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[TurnRecord] {
        &self.records
    }

    /// Records appended at or after `from`
    pub fn since(&self, from: usize) -> &[TurnRecord] {
        self.records.get(from..).unwrap_or(&[])
    }

    pub fn snapshot(&self) -> Vec<TurnRecord> {
        self.records.clone()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Ids of tool calls that have no matching tool-result record yet
    pub fn unresolved_tool_calls(&self) -> Vec<String> {
        let resolved: HashSet<&str> = self
            .records
            .iter()
            .flat_map(|r| r.content.iter())
            .filter_map(|part| match part {
                ContentPart::ToolResult { call_id, .. } => Some(call_id.as_str()),
                _ => None,
            })
            .collect();

        self.records
            .iter()
            .filter(|r| r.role == Role::Assistant)
            .flat_map(|r| r.tool_calls())
            .filter(|(id, _, _)| !resolved.contains(id))
            .map(|(id, _, _)| id.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_part_tagging() {
        let part = ContentPart::ToolCall {
            id: "c1".into(),
            name: "List".into(),
            arguments: json!({}),
        };
        let value = serde_json::to_value(&part).unwrap();
        assert_eq!(value["type"], "tool-call");

        let result = ContentPart::ToolResult {
            call_id: "c1".into(),
            name: "List".into(),
            result: json!({"total": 0}),
        };
        assert_eq!(serde_json::to_value(&result).unwrap()["type"], "tool-result");
    }

    #[test]
    fn test_unresolved_tool_calls() {
        let mut log = ConversationLog::new();
        log.push(TurnRecord::user("translate"));
        log.push(TurnRecord::assistant(vec![
            ContentPart::Text {
                text: "Listing".into(),
            },
            ContentPart::ToolCall {
                id: "a".into(),
                name: "List".into(),
                arguments: json!({}),
            },
            ContentPart::ToolCall {
                id: "b".into(),
                name: "Read".into(),
                arguments: json!({"file_path": "x.md"}),
            },
        ]));
        assert_eq!(log.unresolved_tool_calls(), vec!["a", "b"]);

        log.push(TurnRecord::tool_result("a", "List", json!({"files": [], "total": 0})));
        assert_eq!(log.unresolved_tool_calls(), vec!["b"]);

        log.push(TurnRecord::tool_result("b", "Read", json!({"status": "error"})));
        assert!(log.unresolved_tool_calls().is_empty());
        assert_eq!(log.len(), 4);
        assert_eq!(log.since(2).len(), 2);
        assert!(log.since(10).is_empty());
    }

    #[test]
    fn test_record_text() {
        let record = TurnRecord::assistant(vec![
            ContentPart::Text { text: "a".into() },
            ContentPart::Text { text: "b".into() },
        ]);
        assert_eq!(record.text(), "ab");
        assert_eq!(TurnRecord::user("hi").text(), "hi");
    }
}
