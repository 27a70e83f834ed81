//! Translate tool
//!
//! Drafts a translation for one segment (unless the caller supplied one) and
//! routes it through the approval handler. Reviewer decisions other than a plain
//! approval are recorded in preference memory.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use tolk_provider::Provider;

use super::{LoopOptions, ToolError, ToolTrait, MAX_SEGMENT_CHARS};
use crate::approval::{ApprovalError, ApprovalRequest, ApprovalStatus};
use crate::prompts::translation_prompt;

pub const DEFAULT_TARGET_LANGUAGE: &str = "Chinese";
pub const AUTO_APPROVED_REASON: &str = "auto-approved";

fn default_target_language() -> String {
    DEFAULT_TARGET_LANGUAGE.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslateInput {
    pub file_id: String,
    pub src_string: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translate_string: Option<String>,
    #[serde(default = "default_target_language")]
    pub target_language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslateOutput {
    pub translated_string: String,
    pub status: ApprovalStatus,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_translation: Option<String>,
}

impl TranslateOutput {
    fn rejected(reason: impl Into<String>) -> Self {
        Self {
            translated_string: String::new(),
            status: ApprovalStatus::Reject,
            reason: reason.into(),
            original_translation: None,
        }
    }
}

pub struct TranslateTool {
    provider: Arc<dyn Provider>,
    model: String,
}

impl TranslateTool {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    async fn draft(&self, input: &TranslateInput, options: &LoopOptions) -> Result<String, String> {
        let prompt = translation_prompt(
            &input.src_string,
            &input.target_language,
            input.context.as_deref(),
        );

        tokio::select! {
            drafted = self.provider.generate(&prompt, &self.model) => {
                drafted.map(|text| text.trim().to_string()).map_err(|e| e.to_string())
            }
            _ = options.cancel.cancelled() => Err("cancelled".to_string()),
        }
    }

    pub async fn translate(
        &self,
        input: TranslateInput,
        options: &LoopOptions,
    ) -> Result<TranslateOutput, ToolError> {
        if input.src_string.chars().count() > MAX_SEGMENT_CHARS {
            return Ok(TranslateOutput::rejected(format!(
                "Source string exceeds maximum length of {} characters",
                MAX_SEGMENT_CHARS
            )));
        }
        if input.src_string.trim().is_empty() {
            return Ok(TranslateOutput::rejected("Source string is empty"));
        }

        let supplied = input
            .translate_string
            .clone()
            .filter(|t| !t.trim().is_empty());
        let draft = match supplied {
            Some(draft) => draft,
            None => match self.draft(&input, options).await {
                Ok(draft) => draft,
                Err(detail) => {
                    warn!(file_id = %input.file_id, error = %detail, "drafting failed");
                    return Ok(TranslateOutput::rejected(format!(
                        "Failed to generate translation: {}",
                        detail
                    )));
                }
            },
        };

        let handler = match &options.approval {
            Some(handler) => handler,
            None => {
                return Ok(TranslateOutput {
                    translated_string: draft.clone(),
                    status: ApprovalStatus::Approve,
                    reason: AUTO_APPROVED_REASON.to_string(),
                    original_translation: Some(draft),
                })
            }
        };

        let request = ApprovalRequest {
            file_id: input.file_id.clone(),
            src_string: input.src_string.clone(),
            translate_string: draft.clone(),
        };

        match handler.review(request.clone(), &options.cancel).await {
            Ok(response) => {
                debug!(file_id = %request.file_id, status = %response.status, "draft reviewed");
                if response.status != ApprovalStatus::Approve {
                    if let Some(memory) = &options.memory {
                        memory.extract_memory(&request, &response).await;
                    }
                }
                Ok(TranslateOutput {
                    translated_string: response.translated_string,
                    status: response.status,
                    reason: response.reason,
                    original_translation: Some(draft),
                })
            }
            Err(ApprovalError::SlotOccupied) => {
                Err(ToolError::Protocol(ApprovalError::SlotOccupied))
            }
            Err(e) => Ok(TranslateOutput {
                translated_string: draft.clone(),
                status: ApprovalStatus::Reject,
                reason: format!("Approval handler error: {}", e),
                original_translation: Some(draft),
            }),
        }
    }
}

#[async_trait]
impl ToolTrait for TranslateTool {
    fn name(&self) -> &str {
        "Translate"
    }

    fn description(&self) -> &str {
        "Translate one text segment (at most 300 characters) and get the user's review of the translation."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_id": { "type": "string", "description": "ID of the file being translated" },
                "src_string": { "type": "string", "description": "Source segment to translate" },
                "translate_string": {
                    "type": "string",
                    "description": "Pre-generated translation; drafted automatically when omitted"
                },
                "target_language": {
                    "type": "string",
                    "default": DEFAULT_TARGET_LANGUAGE,
                    "description": "Target language"
                },
                "context": { "type": "string", "description": "Additional context for a better translation" }
            },
            "required": ["file_id", "src_string"]
        })
    }

    async fn execute(&self, args: Value, options: &LoopOptions) -> Result<Value, ToolError> {
        let input: TranslateInput = serde_json::from_value(args)?;
        let output = self.translate(input, options).await?;
        Ok(serde_json::to_value(output)?)
    }
}
