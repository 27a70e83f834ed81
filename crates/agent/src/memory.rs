//! Preference memory
//!
//! One growing text buffer of reviewer feedback. It is never truncated or
//! deduplicated, so it grows for the lifetime of the session.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::approval::{ApprovalRequest, ApprovalResponse};

const ENTRY_HEADER: &str = "Translation feedback:";

/// Shared handle; clones see the same buffer.
#[derive(Debug, Clone, Default)]
pub struct PreferenceMemory {
    buffer: Arc<RwLock<String>>,
}

impl PreferenceMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial(initial: impl Into<String>) -> Self {
        Self {
            buffer: Arc::new(RwLock::new(initial.into())),
        }
    }

    pub async fn append(&self, text: &str) {
        self.buffer.write().await.push_str(text);
    }

    pub async fn current(&self) -> String {
        self.buffer.read().await.clone()
    }

    pub async fn is_empty(&self) -> bool {
        self.buffer.read().await.is_empty()
    }

    /// Number of feedback entries recorded so far
    pub async fn entry_count(&self) -> usize {
        self.buffer.read().await.matches(ENTRY_HEADER).count()
    }

    /// Record one reviewer decision that differed from the draft.
    pub async fn extract_memory(&self, request: &ApprovalRequest, response: &ApprovalResponse) {
        let entry = format!(
            "\n{}\n- Source: {}\n- Draft: {}\n- Status: {}\n- Reason: {}\n- Final: {}\n- File: {}\n---",
            ENTRY_HEADER,
            request.src_string,
            request.translate_string,
            response.status,
            response.reason,
            response.translated_string,
            request.file_id,
        );
        self.append(&entry).await;
        debug!(file_id = %request.file_id, status = %response.status, "recorded translation feedback");
    }

    /// Section for the system prompt, or `None` while nothing was learned
    pub async fn prompt_section(&self) -> Option<String> {
        let current = self.current().await;
        if current.trim().is_empty() {
            None
        } else {
            Some(format!("# Translation preferences\n{}", current))
        }
    }
}
