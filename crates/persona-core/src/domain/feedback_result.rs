//! FeedbackResult entity: the (product x persona) cell of a session (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::{PersonaId, ProductId, ResultId, SessionId};
use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FeedbackResultStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl FeedbackResultStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, FeedbackResultStatus::Completed | FeedbackResultStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackResult {
    pub id: ResultId,
    pub session_id: SessionId,
    pub product_id: ProductId,
    pub persona_id: PersonaId,
    pub status: FeedbackResultStatus,
    pub feedback: Option<String>,
    /// 1..10 inclusive (§3, validated by the Response Validator §4.5).
    pub purchase_intent: Option<u8>,
    /// 2..4 strings (§3).
    pub key_concerns: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FeedbackResult {
    pub fn new_pending(session_id: SessionId, product_id: ProductId, persona_id: PersonaId) -> Self {
        let now = Utc::now();
        Self {
            id: crate::domain::ids::new_id(),
            session_id,
            product_id,
            persona_id,
            status: FeedbackResultStatus::Pending,
            feedback: None,
            purchase_intent: None,
            key_concerns: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// §4.2 step 3: mark IN_PROGRESS. Idempotency check (step 2) happens before
    /// this is called — the worker must already know the result isn't terminal.
    pub fn mark_in_progress(&mut self) -> Result<(), CoreError> {
        if self.status.is_terminal() {
            return Err(CoreError::Internal(
                "mark_in_progress called on a terminal result".into(),
            ));
        }
        self.status = FeedbackResultStatus::InProgress;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn complete(&mut self, feedback: String, purchase_intent: u8, key_concerns: Vec<String>) {
        self.status = FeedbackResultStatus::Completed;
        self.feedback = Some(feedback);
        self.purchase_intent = Some(purchase_intent);
        self.key_concerns = key_concerns;
        self.updated_at = Utc::now();
    }

    /// May be reprocessed from FAILED if re-enqueued (§3 lifecycle).
    pub fn fail(&mut self) {
        self.status = FeedbackResultStatus::Failed;
        self.updated_at = Utc::now();
    }

    /// §4.2 step 2: "if in FAILED, allow retry" — the worker calls this before
    /// `mark_in_progress` on a redelivered task for a previously-FAILED cell.
    pub fn reset_for_retry(&mut self) -> Result<(), CoreError> {
        if self.status != FeedbackResultStatus::Failed {
            return Err(CoreError::Internal(
                "reset_for_retry called on a result that was not FAILED".into(),
            ));
        }
        self.status = FeedbackResultStatus::Pending;
        self.updated_at = Utc::now();
        Ok(())
    }
}
