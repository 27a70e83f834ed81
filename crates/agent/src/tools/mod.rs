//! Tool registry and the translation toolset

pub mod list;
pub mod paths;
pub mod read;
pub mod think;
pub mod translate;

pub use list::ListTool;
pub use read::ReadTool;
pub use think::{TextAnalyzer, ThinkTool};
pub use translate::TranslateTool;

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tolk_provider::{Provider, Tool, ToolCall};

use crate::approval::{ApprovalError, ApprovalHandler};
use crate::memory::PreferenceMemory;
use crate::{AgentError, Result};

/// Upper bound, in characters, for one translatable segment
pub const MAX_SEGMENT_CHARS: usize = 300;

/// Per-session collaborators handed to every executor
#[derive(Clone, Default)]
pub struct LoopOptions {
    pub cancel: CancellationToken,
    /// `None` means drafts are auto-approved
    pub approval: Option<Arc<dyn ApprovalHandler>>,
    /// `None` means reviewer feedback is not recorded
    pub memory: Option<PreferenceMemory>,
}

impl LoopOptions {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            ..Default::default()
        }
    }

    pub fn with_approval(mut self, handler: Arc<dyn ApprovalHandler>) -> Self {
        self.approval = Some(handler);
        self
    }

    pub fn with_memory(mut self, memory: PreferenceMemory) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Same collaborators, different token
    pub fn with_cancel(&self, cancel: CancellationToken) -> Self {
        Self {
            cancel,
            approval: self.approval.clone(),
            memory: self.memory.clone(),
        }
    }
}

/// Faults that abort the turn. Expected failures are returned as structured
/// results instead.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(#[from] serde_json::Error),

    #[error("approval protocol violation: {0}")]
    Protocol(ApprovalError),

    #[error("{0}")]
    Internal(String),
}

#[async_trait]
pub trait ToolTrait: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON schema for the arguments
    fn parameters(&self) -> Value;
    async fn execute(&self, args: Value, options: &LoopOptions) -> std::result::Result<Value, ToolError>;
}

pub fn to_provider_tool(tool: &dyn ToolTrait) -> Tool {
    Tool::new(tool.name(), tool.description(), tool.parameters())
}

/// Arguments that failed schema validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid arguments for '{tool}': {}", .violations.join("; "))]
pub struct ValidationError {
    pub tool: String,
    pub violations: Vec<String>,
}

impl ValidationError {
    /// Structured result returned to the model in place of a tool result
    pub fn to_result(&self) -> Value {
        json!({
            "status": "error",
            "error": "validation_error",
            "tool": self.tool,
            "message": self.to_string(),
            "violations": self.violations,
        })
    }
}

fn unknown_tool_result(name: &str, available: &[String]) -> Value {
    json!({
        "status": "error",
        "error": "unknown_tool",
        "tool": name,
        "message": format!("Tool '{}' is not available", name),
        "available_tools": available,
    })
}

/// Result recorded for a call that never ran
pub fn cancelled_result(name: &str) -> Value {
    json!({
        "status": "error",
        "error": "cancelled",
        "tool": name,
        "message": "Tool call was not executed because the turn ended",
    })
}

struct RegisteredTool {
    tool: Box<dyn ToolTrait>,
    validator: jsonschema::Validator,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, compiling its argument schema.
    pub fn register<T: ToolTrait + 'static>(&mut self, tool: T) -> Result<()> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(AgentError::DuplicateTool(name));
        }
        let validator =
            jsonschema::validator_for(&tool.parameters()).map_err(|e| AgentError::InvalidSchema {
                tool: name.clone(),
                reason: e.to_string(),
            })?;
        self.tools.insert(
            name,
            RegisteredTool {
                tool: Box::new(tool),
                validator,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn ToolTrait> {
        self.tools.get(name).map(|t| t.tool.as_ref())
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Provider definitions, sorted by name
    pub fn definitions(&self) -> Vec<Tool> {
        self.names()
            .iter()
            .filter_map(|name| self.get(name))
            .map(to_provider_tool)
            .collect()
    }

    /// Check `args` against the schema of tool `name`.
    pub fn validate(&self, name: &str, args: &Value) -> std::result::Result<(), ValidationError> {
        let entry = self.tools.get(name).ok_or_else(|| ValidationError {
            tool: name.to_string(),
            violations: vec![format!("unknown tool '{}'", name)],
        })?;
        if entry.validator.is_valid(args) {
            return Ok(());
        }
        Err(ValidationError {
            tool: name.to_string(),
            violations: entry.validator.iter_errors(args).map(|e| e.to_string()).collect(),
        })
    }

    /// Dispatch one call. Unknown tools and invalid arguments come back as
    /// structured results; only executor faults are errors.
    pub async fn execute(&self, call: &ToolCall, options: &LoopOptions) -> Result<Value> {
        let started = Instant::now();

        if !self.has(&call.name) {
            warn!(tool = %call.name, call_id = %call.id, "unknown tool requested");
            return Ok(unknown_tool_result(&call.name, &self.names()));
        }

        if let Err(err) = self.validate(&call.name, &call.arguments) {
            info!(
                tool = %call.name,
                call_id = %call.id,
                outcome = "validation_error",
                elapsed_ms = started.elapsed().as_millis() as u64,
                "tool call rejected"
            );
            return Ok(err.to_result());
        }

        let tool = self
            .get(&call.name)
            .ok_or_else(|| AgentError::ToolExecution(format!("tool '{}' vanished", call.name)))?;

        let outcome = tool.execute(call.arguments.clone(), options).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(value) => {
                info!(tool = %call.name, call_id = %call.id, outcome = "ok", elapsed_ms, "tool call finished");
                Ok(value)
            }
            Err(ToolError::Protocol(e)) => {
                warn!(tool = %call.name, call_id = %call.id, outcome = "protocol_error", elapsed_ms, error = %e, "tool call failed");
                Err(AgentError::Protocol(e.to_string()))
            }
            Err(e) => {
                warn!(tool = %call.name, call_id = %call.id, outcome = "fault", elapsed_ms, error = %e, "tool call failed");
                Err(AgentError::ToolExecution(format!("{}: {}", call.name, e)))
            }
        }
    }
}

/// List, Read, Think and Translate rooted at `root`
pub fn default_registry(
    root: impl Into<PathBuf>,
    provider: Arc<dyn Provider>,
    translator_model: impl Into<String>,
) -> Result<ToolRegistry> {
    let root = root.into();
    let mut registry = ToolRegistry::new();
    registry.register(ListTool::new(root.clone()))?;
    registry.register(ReadTool::new(root))?;
    registry.register(ThinkTool::new().map_err(|e| AgentError::ToolExecution(e.to_string()))?)?;
    registry.register(TranslateTool::new(provider, translator_model))?;
    Ok(registry)
}
