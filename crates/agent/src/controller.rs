//! Turn controller
//!
//! Two actors take turns: the user submits input, then the agent runs
//! completion/tool steps until it answers without tool calls. The driver calls
//! [`TurnController::advance`] (or [`TurnController::step`] for finer control);
//! nothing runs in the background.
//!
//! Every tool call recorded in the log gets a matching tool result before control
//! returns to the user, including on cancellation and on failures.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use tolk_provider::{ChatParams, Provider, ToolCall, ToolChoice};

use crate::context::ContextBuilder;
use crate::log::{ContentPart, ConversationLog, TurnRecord};
use crate::memory::PreferenceMemory;
use crate::tools::{cancelled_result, LoopOptions, ToolRegistry};
use crate::{AgentError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Actor {
    User,
    Agent,
}

/// Completion parameters for the agent's own requests
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Completion requests allowed per user turn
    pub max_tool_iterations: u32,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            model: "z-ai/glm-4.5".to_string(),
            max_tokens: 4096,
            temperature: 0.3,
            max_tool_iterations: 40,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub actor: Actor,
    pub unresolved_tool_calls: Vec<String>,
    pub cancelled: bool,
}

type TurnToken = Arc<Mutex<CancellationToken>>;

fn lock_token(token: &TurnToken) -> MutexGuard<'_, CancellationToken> {
    token.lock().unwrap_or_else(|e| e.into_inner())
}

/// Cancels the running turn (or the whole session) from another task.
#[derive(Clone)]
pub struct StopHandle {
    session: CancellationToken,
    turn: TurnToken,
}

impl StopHandle {
    /// Cancel the current turn. Idempotent; the session stays usable.
    pub fn stop(&self) {
        lock_token(&self.turn).cancel();
    }

    /// Cancel the session; no further turns are accepted.
    pub fn shutdown(&self) {
        self.session.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.session.is_cancelled()
    }
}

pub struct TurnController {
    provider: Arc<dyn Provider>,
    tools: ToolRegistry,
    context: ContextBuilder,
    log: ConversationLog,
    actor: Actor,
    /// Session-level options; `cancel` is the session token
    options: LoopOptions,
    turn: TurnToken,
    iterations: u32,
    settings: LoopSettings,
}

impl TurnController {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: ToolRegistry,
        context: ContextBuilder,
        options: LoopOptions,
        settings: LoopSettings,
    ) -> Self {
        let turn = Arc::new(Mutex::new(options.cancel.child_token()));
        Self {
            provider,
            tools,
            context,
            log: ConversationLog::new(),
            actor: Actor::User,
            options,
            turn,
            iterations: 0,
            settings,
        }
    }

    pub fn actor(&self) -> Actor {
        self.actor
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn memory(&self) -> Option<&PreferenceMemory> {
        self.options.memory.as_ref()
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    /// Completion requests issued in the current turn
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            session: self.options.cancel.clone(),
            turn: self.turn.clone(),
        }
    }

    fn turn_token(&self) -> CancellationToken {
        lock_token(&self.turn).clone()
    }

    /// Hand the user's text to the agent and open a new turn.
    pub fn submit_user_input(&mut self, text: &str) -> Result<()> {
        if self.actor == Actor::Agent {
            return Err(AgentError::Busy);
        }
        if text.trim().is_empty() {
            return Err(AgentError::EmptyInput);
        }
        if self.options.cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }

        self.log.push(TurnRecord::user(text));
        *lock_token(&self.turn) = self.options.cancel.child_token();
        self.iterations = 0;
        self.actor = Actor::Agent;
        debug!(records = self.log.len(), "user turn submitted");
        Ok(())
    }

    /// Cancel the current turn and give control back to the user.
    pub fn stop(&mut self) {
        lock_token(&self.turn).cancel();
        self.actor = Actor::User;
    }

    fn outcome(&self, cancelled: bool) -> StepOutcome {
        StepOutcome {
            actor: self.actor,
            unresolved_tool_calls: self.log.unresolved_tool_calls(),
            cancelled,
        }
    }

    /// Record a result for every call in `calls`; the first gets `first`.
    fn close_calls(&mut self, calls: &[ToolCall], first: serde_json::Value) {
        let mut first = Some(first);
        for call in calls {
            let result = first.take().unwrap_or_else(|| cancelled_result(&call.name));
            self.log
                .push(TurnRecord::tool_result(&call.id, &call.name, result));
        }
    }

    fn fail(&mut self, err: AgentError) -> Result<StepOutcome> {
        self.actor = Actor::User;
        match &err {
            AgentError::Cancelled => info!(iterations = self.iterations, "turn cancelled"),
            e => error!(error = %e, iterations = self.iterations, "agent turn failed"),
        }
        Err(err)
    }

    /// One completion request plus the tool calls it emits. Failures are
    /// logged here and hand control back to the user.
    pub async fn step(&mut self) -> Result<StepOutcome> {
        if self.actor == Actor::User {
            return Ok(self.outcome(false));
        }

        let cancel = self.turn_token();
        if cancel.is_cancelled() {
            return self.fail(AgentError::Cancelled);
        }

        self.iterations += 1;
        if self.iterations > self.settings.max_tool_iterations {
            return self.fail(AgentError::MaxIterations);
        }
        debug!(iteration = self.iterations, "agent step");

        let messages = self
            .context
            .build_messages(self.log.records(), self.options.memory.as_ref())
            .await;
        let params = ChatParams {
            model: self.settings.model.clone(),
            messages,
            tools: self.tools.definitions(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            tool_choice: ToolChoice::Auto,
        };

        let response = tokio::select! {
            response = self.provider.chat(params) => {
                response.map_err(|e| AgentError::Provider(e.to_string()))
            }
            _ = cancel.cancelled() => Err(AgentError::Cancelled),
        };
        let response = match response {
            Ok(response) => response,
            Err(e) => return self.fail(e),
        };

        let calls: Vec<ToolCall> = response
            .tool_calls
            .into_iter()
            .map(|mut call| {
                if call.id.trim().is_empty() {
                    call.id = format!("call_{}", Uuid::new_v4().simple());
                }
                call
            })
            .collect();

        let mut parts = Vec::with_capacity(calls.len() + 1);
        if let Some(text) = response.content.filter(|t| !t.trim().is_empty()) {
            parts.push(ContentPart::Text { text });
        }
        parts.extend(calls.iter().map(|call| ContentPart::ToolCall {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        }));
        self.log.push(TurnRecord::assistant(parts));

        if calls.is_empty() {
            self.actor = Actor::User;
            return Ok(self.outcome(false));
        }

        let options = self.options.with_cancel(cancel.clone());
        for (i, call) in calls.iter().enumerate() {
            if cancel.is_cancelled() {
                self.close_calls(&calls[i..], cancelled_result(&call.name));
                return self.fail(AgentError::Cancelled);
            }

            let executed = self.tools.execute(call, &options).await;
            match executed {
                Ok(result) => {
                    self.log
                        .push(TurnRecord::tool_result(&call.id, &call.name, result));
                }
                Err(e) => {
                    let result = json!({
                        "status": "error",
                        "error": "tool_failure",
                        "tool": call.name,
                        "message": e.to_string(),
                    });
                    self.close_calls(&calls[i..], result);
                    return self.fail(e);
                }
            }
        }

        Ok(self.outcome(false))
    }

    /// Step until the agent hands control back.
    pub async fn advance(&mut self) -> Result<StepOutcome> {
        self.advance_observed(|_, _| {}).await
    }

    /// [`advance`](Self::advance), calling `observer` after every step with
    /// the records that step appended.
    pub async fn advance_observed<F>(&mut self, mut observer: F) -> Result<StepOutcome>
    where
        F: FnMut(&StepOutcome, &[TurnRecord]),
    {
        loop {
            let start = self.log.len();
            match self.step().await {
                Ok(outcome) => {
                    observer(&outcome, self.log.since(start));
                    if outcome.actor == Actor::User {
                        return Ok(outcome);
                    }
                }
                Err(AgentError::Cancelled) => {
                    self.actor = Actor::User;
                    let outcome = self.outcome(true);
                    observer(&outcome, self.log.since(start));
                    return Ok(outcome);
                }
                Err(e) => {
                    self.actor = Actor::User;
                    let outcome = self.outcome(false);
                    observer(&outcome, self.log.since(start));
                    return Err(e);
                }
            }
        }
    }
}
