//! Human review of translation drafts
//!
//! [`ApprovalGate`] is a single-slot rendezvous: the Translate tool parks one
//! request in the slot and waits, a front-end observes it through
//! [`ApprovalGate::subscribe`] and answers with [`ApprovalGate::resolve`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Approve,
    Reject,
    Refined,
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ApprovalStatus::Approve => "approve",
            ApprovalStatus::Reject => "reject",
            ApprovalStatus::Refined => "refined",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub file_id: String,
    pub src_string: String,
    pub translate_string: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalResponse {
    pub status: ApprovalStatus,
    pub translated_string: String,
    pub reason: String,
}

impl ApprovalResponse {
    /// Accept the draft as-is
    pub fn approve(request: &ApprovalRequest) -> Self {
        Self {
            status: ApprovalStatus::Approve,
            translated_string: request.translate_string.clone(),
            reason: String::new(),
        }
    }

    /// Reject the draft; the draft text is kept as the final string
    pub fn reject(request: &ApprovalRequest, reason: impl Into<String>) -> Self {
        Self {
            status: ApprovalStatus::Reject,
            translated_string: request.translate_string.clone(),
            reason: reason.into(),
        }
    }

    /// Replace the draft with the reviewer's own text
    pub fn refined(translated: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            status: ApprovalStatus::Refined,
            translated_string: translated.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApprovalError {
    #[error("approval wait cancelled")]
    Cancelled,

    #[error("an approval request is already pending")]
    SlotOccupied,

    #[error("no approval request is pending")]
    NoPendingRequest,

    #[error("approval channel closed")]
    Closed,
}

/// Reviews a draft before it is accepted.
#[async_trait]
pub trait ApprovalHandler: Send + Sync {
    async fn review(
        &self,
        request: ApprovalRequest,
        cancel: &CancellationToken,
    ) -> Result<ApprovalResponse, ApprovalError>;
}

struct GateInner {
    slot: Mutex<Option<oneshot::Sender<ApprovalResponse>>>,
    published: watch::Sender<Option<ApprovalRequest>>,
}

#[derive(Clone)]
pub struct ApprovalGate {
    inner: Arc<GateInner>,
}

impl ApprovalGate {
    pub fn new() -> Self {
        let (published, _) = watch::channel(None);
        Self {
            inner: Arc::new(GateInner {
                slot: Mutex::new(None),
                published,
            }),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<oneshot::Sender<ApprovalResponse>>> {
        self.inner.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Open the slot with `request` and wait for the reviewer's answer.
    pub async fn request(
        &self,
        request: ApprovalRequest,
        cancel: &CancellationToken,
    ) -> Result<ApprovalResponse, ApprovalError> {
        let rx = {
            let mut slot = self.slot();
            if slot.is_some() {
                return Err(ApprovalError::SlotOccupied);
            }
            let (tx, rx) = oneshot::channel();
            *slot = Some(tx);
            rx
        };

        // Clears the slot however this future ends, including being dropped.
        let _clear = SlotClear { gate: self };

        debug!(file_id = %request.file_id, "approval requested");
        self.inner.published.send_replace(Some(request));

        // A delivered answer wins over a cancel that lands before this task is polled.
        tokio::select! {
            biased;
            response = rx => response.map_err(|_| ApprovalError::Closed),
            _ = cancel.cancelled() => Err(ApprovalError::Cancelled),
        }
    }

    /// Deliver the reviewer's answer to the open request.
    pub fn resolve(&self, response: ApprovalResponse) -> Result<(), ApprovalError> {
        let tx = self.slot().take().ok_or(ApprovalError::NoPendingRequest)?;
        self.inner.published.send_replace(None);
        debug!(status = %response.status, "approval resolved");
        tx.send(response).map_err(|_| ApprovalError::Closed)
    }

    /// The request currently waiting for a decision
    pub fn pending(&self) -> Option<ApprovalRequest> {
        self.inner.published.borrow().clone()
    }

    pub fn has_pending(&self) -> bool {
        self.slot().is_some()
    }

    /// Observe requests as they open and close
    pub fn subscribe(&self) -> watch::Receiver<Option<ApprovalRequest>> {
        self.inner.published.subscribe()
    }
}

impl Default for ApprovalGate {
    fn default() -> Self {
        Self::new()
    }
}

struct SlotClear<'a> {
    gate: &'a ApprovalGate,
}

impl Drop for SlotClear<'_> {
    fn drop(&mut self) {
        self.gate.slot().take();
        self.gate.inner.published.send_replace(None);
    }
}

#[async_trait]
impl ApprovalHandler for ApprovalGate {
    async fn review(
        &self,
        request: ApprovalRequest,
        cancel: &CancellationToken,
    ) -> Result<ApprovalResponse, ApprovalError> {
        self.request(request, cancel).await
    }
}
