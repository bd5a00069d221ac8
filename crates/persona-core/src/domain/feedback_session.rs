//! FeedbackSession entity and its state machine (§3, §4.6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::{SessionId, UserId};
use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// One theme extracted by the aggregation LLM call (§4.4, §4.5): `mentions >= 1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeMention {
    pub theme: String,
    pub mentions: u32,
}

/// Aggregated insights document (§3, GLOSSARY): average score, percent high-intent,
/// and the LLM-produced top themes. `average_score` and `purchase_intent_percent`
/// are computed locally from the results table (§4.6 step 4), never by the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedInsights {
    pub average_score: f64,
    pub purchase_intent_percent: f64,
    pub key_themes: Vec<ThemeMention>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackSession {
    pub id: SessionId,
    pub owner_user_id: UserId,
    pub status: SessionStatus,
    /// ISO 639-1 code, validated against a closed whitelist at dispatch time (§4.1).
    pub language: String,
    pub aggregated_insights: Option<AggregatedInsights>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FeedbackSession {
    pub fn new_pending(owner_user_id: UserId, language: String) -> Self {
        let now = Utc::now();
        Self {
            id: crate::domain::ids::new_id(),
            owner_user_id,
            status: SessionStatus::Pending,
            language,
            aggregated_insights: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// PENDING -> IN_PROGRESS on first child update (§4.6 state machine).
    pub fn mark_in_progress_if_pending(&mut self) {
        if self.status == SessionStatus::Pending {
            self.status = SessionStatus::InProgress;
            self.updated_at = Utc::now();
        }
    }

    /// §4.6 step 4: conditional transition `status != COMPLETED`, idempotent under
    /// concurrent terminal writes (§8 "at-most-once aggregation").
    pub fn complete(&mut self, insights: AggregatedInsights) -> Result<(), CoreError> {
        if self.status == SessionStatus::Completed {
            return Err(CoreError::Internal(
                "complete() called on an already-COMPLETED session".into(),
            ));
        }
        self.status = SessionStatus::Completed;
        self.aggregated_insights = Some(insights);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// §9 Open Question decision: every child FAILED -> session FAILED, no aggregation call.
    pub fn fail(&mut self) -> Result<(), CoreError> {
        if self.status == SessionStatus::Completed || self.status == SessionStatus::Failed {
            return Err(CoreError::Internal(
                "fail() called on an already-terminal session".into(),
            ));
        }
        self.status = SessionStatus::Failed;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// I2: a session is COMPLETED iff every child is terminal and insights are set.
    pub fn satisfies_completion_invariant(&self, all_children_terminal: bool) -> bool {
        if self.status != SessionStatus::Completed {
            return true;
        }
        all_children_terminal && self.aggregated_insights.is_some()
    }
}
