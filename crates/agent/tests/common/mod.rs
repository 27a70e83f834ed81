//! Shared fakes for agent integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use tolk_agent::tools::default_registry;
use tolk_agent::{
    ApprovalError, ApprovalHandler, ApprovalRequest, ApprovalResponse, ContextBuilder,
    LoopOptions, LoopSettings, ToolRegistry, TurnController,
};
use tolk_provider::{ChatParams, ChatResponse, Provider, ProviderError, ToolCall};

pub const SAMPLE_SOURCE: &str = "Hello world! This is a test sentence for translation.";
pub const SAMPLE_DRAFT: &str = "你好，世界！这是一个用于翻译的测试句子。";
pub const SAMPLE_REFINED: &str = "你好世界！这是一个用于翻译的测试句子。";
pub const SAMPLE_REASON: &str = "用户修正了翻译";

/// Provider that replays scripted completions and drafts.
///
/// When the chat script runs dry it answers with plain text, or never answers
/// at all if built with [`ScriptedProvider::hanging`].
#[derive(Default)]
pub struct ScriptedProvider {
    chats: Mutex<VecDeque<Result<ChatResponse, ProviderError>>>,
    drafts: Mutex<VecDeque<Result<String, ProviderError>>>,
    hang_when_empty: bool,
    pub chat_calls: AtomicUsize,
    pub generate_calls: AtomicUsize,
    pub seen: Mutex<Vec<ChatParams>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hanging() -> Self {
        Self {
            hang_when_empty: true,
            ..Default::default()
        }
    }

    pub fn then_chat(self, response: ChatResponse) -> Self {
        self.chats.lock().unwrap().push_back(Ok(response));
        self
    }

    pub fn then_chat_error(self, error: ProviderError) -> Self {
        self.chats.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn then_calls(self, calls: Vec<ToolCall>) -> Self {
        self.then_chat(ChatResponse::with_tool_calls(None, calls))
    }

    pub fn then_text(self, text: &str) -> Self {
        self.then_chat(ChatResponse::text(text))
    }

    pub fn then_draft(self, draft: &str) -> Self {
        self.drafts.lock().unwrap().push_back(Ok(draft.to_string()));
        self
    }

    pub fn then_draft_error(self, error: ProviderError) -> Self {
        self.drafts.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn chat_count(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    pub fn generate_count(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn last_system_prompt(&self) -> String {
        self.seen
            .lock()
            .unwrap()
            .last()
            .and_then(|p| p.messages.first())
            .and_then(|m| m.content.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse, ProviderError> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(params);
        let next = self.chats.lock().unwrap().pop_front();
        match next {
            Some(response) => response,
            None if self.hang_when_empty => std::future::pending().await,
            None => Ok(ChatResponse::text("done")),
        }
    }

    fn default_model(&self) -> String {
        "scripted".to_string()
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn generate(&self, _prompt: &str, _model: &str) -> Result<String, ProviderError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.drafts.lock().unwrap().pop_front();
        match next {
            Some(draft) => draft,
            None if self.hang_when_empty => std::future::pending().await,
            None => Ok(SAMPLE_DRAFT.to_string()),
        }
    }
}

/// Approval handler answering from a script and recording what it saw
#[derive(Default)]
pub struct ScriptedApproval {
    responses: Mutex<VecDeque<Result<ApprovalResponse, ApprovalError>>>,
    pub seen: Mutex<Vec<ApprovalRequest>>,
}

impl ScriptedApproval {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(self, response: ApprovalResponse) -> Self {
        self.responses.lock().unwrap().push_back(Ok(response));
        self
    }

    pub fn then_error(self, error: ApprovalError) -> Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn seen_count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl ApprovalHandler for ScriptedApproval {
    async fn review(
        &self,
        request: ApprovalRequest,
        _cancel: &CancellationToken,
    ) -> Result<ApprovalResponse, ApprovalError> {
        self.seen.lock().unwrap().push(request.clone());
        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(ApprovalResponse::approve(&request)))
    }
}

pub fn translate_call(id: &str, src: &str) -> ToolCall {
    ToolCall::new(
        id,
        "Translate",
        json!({"file_id": "docs/intro.md", "src_string": src}),
    )
}

pub fn call(id: &str, name: &str, arguments: Value) -> ToolCall {
    ToolCall::new(id, name, arguments)
}

pub fn settings() -> LoopSettings {
    LoopSettings {
        model: "agent/model".to_string(),
        max_tool_iterations: 10,
        ..Default::default()
    }
}

/// Controller over the default toolset rooted at `root`
pub fn controller(
    provider: Arc<ScriptedProvider>,
    root: &std::path::Path,
    options: LoopOptions,
) -> TurnController {
    let tools = default_registry(root, provider.clone(), "translator/model").unwrap();
    controller_with_tools(provider, tools, root, options)
}

pub fn controller_with_tools(
    provider: Arc<ScriptedProvider>,
    tools: ToolRegistry,
    root: &std::path::Path,
    options: LoopOptions,
) -> TurnController {
    TurnController::new(
        provider,
        tools,
        ContextBuilder::new(root, "Chinese"),
        options,
        settings(),
    )
}

pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}
