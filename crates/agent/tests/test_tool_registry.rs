//! Tests for tool registration and dispatch

mod common;

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use common::{call, ScriptedProvider};
use tolk_agent::tools::{default_registry, ListTool, ReadTool, ThinkTool};
use tolk_agent::{AgentError, LoopOptions, ToolError, ToolRegistry, ToolTrait};

struct BadSchema;

#[async_trait]
impl ToolTrait for BadSchema {
    fn name(&self) -> &str {
        "Bad"
    }
    fn description(&self) -> &str {
        "Schema does not compile"
    }
    fn parameters(&self) -> Value {
        json!({"type": "definitely-not-a-type"})
    }
    async fn execute(&self, _args: Value, _options: &LoopOptions) -> Result<Value, ToolError> {
        Ok(Value::Null)
    }
}

struct Faulty;

#[async_trait]
impl ToolTrait for Faulty {
    fn name(&self) -> &str {
        "Faulty"
    }
    fn description(&self) -> &str {
        "Always fails"
    }
    fn parameters(&self) -> Value {
        json!({"type": "object"})
    }
    async fn execute(&self, _args: Value, _options: &LoopOptions) -> Result<Value, ToolError> {
        Err(ToolError::Internal("disk on fire".to_string()))
    }
}

// ==================== Registration ====================

#[test]
fn test_registry_new_is_empty() {
    let registry = ToolRegistry::new();
    assert!(registry.is_empty());
    assert!(registry.names().is_empty());
    assert!(registry.definitions().is_empty());
}

#[test]
fn test_register_duplicate_fails() {
    let mut registry = ToolRegistry::new();
    registry.register(ListTool::new(".")).unwrap();

    match registry.register(ListTool::new("/tmp")) {
        Err(AgentError::DuplicateTool(name)) => assert_eq!(name, "List"),
        other => panic!("expected DuplicateTool, got {:?}", other),
    }
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_register_invalid_schema_fails() {
    let mut registry = ToolRegistry::new();
    match registry.register(BadSchema) {
        Err(AgentError::InvalidSchema { tool, .. }) => assert_eq!(tool, "Bad"),
        other => panic!("expected InvalidSchema, got {:?}", other),
    }
    assert!(!registry.has("Bad"));
}

#[test]
fn test_definitions_sorted_by_name() {
    let mut registry = ToolRegistry::new();
    registry.register(ThinkTool::new().unwrap()).unwrap();
    registry.register(ReadTool::new(".")).unwrap();
    registry.register(ListTool::new(".")).unwrap();

    let names: Vec<String> = registry
        .definitions()
        .into_iter()
        .map(|t| t.function.name)
        .collect();
    assert_eq!(names, vec!["List", "Read", "Think"]);
}

#[test]
fn test_default_registry_has_four_tools() {
    let provider = Arc::new(ScriptedProvider::new());
    let registry = default_registry(".", provider, "translator/model").unwrap();
    assert_eq!(registry.names(), vec!["List", "Read", "Think", "Translate"]);

    let translate = registry.get("Translate").unwrap();
    assert_eq!(
        translate.parameters()["required"],
        json!(["file_id", "src_string"])
    );
}

// ==================== Dispatch ====================

#[tokio::test]
async fn test_unknown_tool_is_structured_result() {
    let registry = ToolRegistry::new();
    let result = registry
        .execute(&call("c1", "Delete", json!({})), &LoopOptions::default())
        .await
        .unwrap();

    assert_eq!(result["status"], "error");
    assert_eq!(result["error"], "unknown_tool");
    assert_eq!(result["tool"], "Delete");
}

#[tokio::test]
async fn test_schema_violation_is_structured_result() {
    let mut registry = ToolRegistry::new();
    registry.register(ReadTool::new(".")).unwrap();

    let result = registry
        .execute(&call("c1", "Read", json!({"path": "a.md"})), &LoopOptions::default())
        .await
        .unwrap();

    assert_eq!(result["error"], "validation_error");
    assert_eq!(result["tool"], "Read");
    assert!(!result["violations"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_wrong_enum_value_is_rejected() {
    let mut registry = ToolRegistry::new();
    registry.register(ThinkTool::new().unwrap()).unwrap();

    let err = registry
        .validate("Think", &json!({"action": "summarize", "content": "x"}))
        .unwrap_err();
    assert_eq!(err.tool, "Think");
    assert!(registry
        .validate("Think", &json!({"action": "segment_text", "content": "x"}))
        .is_ok());
}

#[tokio::test]
async fn test_executor_fault_escapes_as_error() {
    let mut registry = ToolRegistry::new();
    registry.register(Faulty).unwrap();

    let result = registry
        .execute(&call("c1", "Faulty", json!({})), &LoopOptions::default())
        .await;
    match result {
        Err(AgentError::ToolExecution(msg)) => assert!(msg.contains("disk on fire")),
        other => panic!("expected ToolExecution, got {:?}", other),
    }
}

#[tokio::test]
async fn test_think_dispatch_segments() {
    let mut registry = ToolRegistry::new();
    registry.register(ThinkTool::new().unwrap()).unwrap();

    let result = registry
        .execute(
            &call(
                "c1",
                "Think",
                json!({"action": "segment_text", "content": "One.\n\nTwo."}),
            ),
            &LoopOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(result["result"], "Successfully segmented text into 2 parts");
    assert_eq!(result["segments"][1]["text"], "Two.");
    assert_eq!(result["metadata"]["estimated_segments"], 2);
}
