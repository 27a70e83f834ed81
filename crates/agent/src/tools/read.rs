//! Read tool

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::debug;

use super::paths::{format_timestamp, resolve};
use super::{LoopOptions, ToolError, ToolTrait};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadMetadata {
    pub size: u64,
    pub path: String,
    pub modified_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadOutput {
    pub content: String,
    pub status: ReadStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ReadMetadata>,
}

impl ReadOutput {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            content: String::new(),
            status: ReadStatus::Error,
            error_message: Some(message.into()),
            metadata: None,
        }
    }
}

#[derive(Deserialize)]
struct ReadArgs {
    file_path: String,
}

pub struct ReadTool {
    root: PathBuf,
}

impl ReadTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub async fn read(&self, file_path: &str) -> ReadOutput {
        let path = resolve(&self.root, file_path);
        debug!(path = %path.display(), "reading file");

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => return ReadOutput::failed(e.to_string()),
        };
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) => return ReadOutput::failed(e.to_string()),
        };

        ReadOutput {
            content,
            status: ReadStatus::Success,
            error_message: None,
            metadata: Some(ReadMetadata {
                size: metadata.len(),
                path: file_path.to_string(),
                modified_at: metadata
                    .modified()
                    .map(format_timestamp)
                    .unwrap_or_default(),
            }),
        }
    }
}

#[async_trait]
impl ToolTrait for ReadTool {
    fn name(&self) -> &str {
        "Read"
    }

    fn description(&self) -> &str {
        "Read a file's content for translation processing."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": { "type": "string", "description": "Path of the file to read" }
            },
            "required": ["file_path"]
        })
    }

    async fn execute(&self, args: Value, _options: &LoopOptions) -> Result<Value, ToolError> {
        let args: ReadArgs = serde_json::from_value(args)?;
        Ok(serde_json::to_value(self.read(&args.file_path).await)?)
    }
}
