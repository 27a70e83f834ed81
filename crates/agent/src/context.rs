//! Context builder for assembling completion requests

use chrono::Local;
use std::path::{Path, PathBuf};

use tolk_provider::{Message, ToolCallDef};

use crate::log::{ContentPart, Role, TurnRecord};
use crate::memory::PreferenceMemory;
use crate::prompts::SYSTEM_WORKFLOW;

/// Builds the system prompt and converts the log into provider messages
pub struct ContextBuilder {
    workspace: PathBuf,
    target_language: String,
}

impl ContextBuilder {
    pub fn new(workspace: impl AsRef<Path>, target_language: impl Into<String>) -> Self {
        Self {
            workspace: workspace.as_ref().to_path_buf(),
            target_language: target_language.into(),
        }
    }

    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    /// System prompt, including learned preferences when there are any
    pub async fn build_system_prompt(&self, memory: Option<&PreferenceMemory>) -> String {
        let mut parts = vec![self.identity(), SYSTEM_WORKFLOW.to_string()];

        if let Some(memory) = memory {
            if let Some(section) = memory.prompt_section().await {
                parts.push(format!(
                    "{}\n\nApply these reviewer preferences to every new translation.",
                    section
                ));
            }
        }

        parts.join("\n\n---\n\n")
    }

    fn identity(&self) -> String {
        let today = Local::now().format("%Y-%m-%d (%A)");

        format!(
            r#"# tolk

You are tolk, a careful translation assistant working alongside a human reviewer.
You translate text files segment by segment into {lang}. Every translation you
produce is checked by the reviewer before it is accepted.

## Today
{today}

## Workspace
Files live under: {workspace}
Default target language: {lang}"#,
            lang = self.target_language,
            today = today,
            workspace = self.workspace.display(),
        )
    }

    /// System prompt followed by every log record, in order
    pub async fn build_messages(
        &self,
        records: &[TurnRecord],
        memory: Option<&PreferenceMemory>,
    ) -> Vec<Message> {
        let mut messages = vec![Message::system(self.build_system_prompt(memory).await)];
        messages.extend(Self::to_messages(records));
        messages
    }

    pub fn to_messages(records: &[TurnRecord]) -> Vec<Message> {
        let mut messages = Vec::with_capacity(records.len());

        for record in records {
            match record.role {
                Role::User => messages.push(Message::user(record.text())),
                Role::Assistant => {
                    let calls: Vec<ToolCallDef> = record
                        .tool_calls()
                        .map(|(id, name, arguments)| ToolCallDef::new(id, name, arguments.clone()))
                        .collect();
                    let text = record.text();
                    Self::add_assistant_message(
                        &mut messages,
                        Some(text.as_str()),
                        (!calls.is_empty()).then_some(calls),
                    );
                }
                Role::Tool => {
                    for part in &record.content {
                        if let ContentPart::ToolResult {
                            call_id,
                            name,
                            result,
                        } = part
                        {
                            Self::add_tool_result(&mut messages, call_id, name, &result.to_string());
                        }
                    }
                }
            }
        }

        messages
    }

    pub fn add_tool_result(
        messages: &mut Vec<Message>,
        tool_call_id: &str,
        name: &str,
        result: &str,
    ) {
        messages.push(Message::tool(tool_call_id, name, result));
    }

    pub fn add_assistant_message(
        messages: &mut Vec<Message>,
        content: Option<&str>,
        tool_calls: Option<Vec<ToolCallDef>>,
    ) {
        let mut msg = Message::assistant(content.unwrap_or(""));
        if let Some(calls) = tool_calls {
            msg.tool_calls = Some(calls);
        }
        messages.push(msg);
    }
}
