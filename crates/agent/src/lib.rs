//! Turn-taking translation agent
//!
//! A human operator and the agent alternate turns over a shared [`ConversationLog`].
//! During its turn the agent calls tools (List, Read, Think, Translate) through the
//! [`ToolRegistry`]; Translate hands each draft to an [`ApprovalHandler`] and feeds
//! non-accepted outcomes into [`PreferenceMemory`].

use thiserror::Error;

pub mod approval;
pub mod context;
pub mod controller;
pub mod log;
pub mod memory;
pub mod prompts;
pub mod tools;

pub use approval::{
    ApprovalError, ApprovalGate, ApprovalHandler, ApprovalRequest, ApprovalResponse,
    ApprovalStatus,
};
pub use context::ContextBuilder;
pub use controller::{Actor, LoopSettings, StepOutcome, StopHandle, TurnController};
pub use log::{ContentPart, ConversationLog, Role, TurnRecord};
pub use memory::PreferenceMemory;
pub use tools::{LoopOptions, ToolError, ToolRegistry, ToolTrait, ValidationError};

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),

    #[error("invalid schema for tool '{tool}': {reason}")]
    InvalidSchema { tool: String, reason: String },

    #[error("tool execution failed: {0}")]
    ToolExecution(String),

    #[error("completion failed: {0}")]
    Provider(String),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("cancelled")]
    Cancelled,

    #[error("max tool iterations exceeded")]
    MaxIterations,

    #[error("agent is busy")]
    Busy,

    #[error("input is empty")]
    EmptyInput,
}

pub type Result<T> = std::result::Result<T, AgentError>;
