//! Termination detector & aggregator (§4.6): runs after every FeedbackResult
//! reaches a terminal status, under a cluster-wide advisory lock, so exactly
//! one caller ever performs the session's aggregation call.
//!
//! Grounded on the same lock-then-conditional-update shape `SledLock` and
//! `FeedbackSession::complete` already establish (§9 "one mutual-exclusion
//! primitive with lease + try-acquire is sufficient").

use std::sync::Arc;
use std::time::Duration;

use persona_core::domain::feedback_result::FeedbackResultStatus;
use persona_core::domain::feedback_session::{AggregatedInsights, SessionStatus, ThemeMention};
use persona_core::domain::ids::SessionId;
use persona_core::error::CoreError;
use persona_core::lock::DistributedLock;
use persona_core::repository::{FeedbackResultRepository, FeedbackSessionRepository};
use persona_llm::LlmGateway;

/// §3 GLOSSARY "aggregated insights": a result counts as high-intent at 8
/// and above on the 1..10 scale. Not specified exactly by §3/§4.6; recorded
/// as an implementer decision (DESIGN.md).
const HIGH_INTENT_THRESHOLD: u8 = 8;

pub struct TerminationDetector {
    lock: Arc<dyn DistributedLock>,
    sessions: Arc<dyn FeedbackSessionRepository>,
    results: Arc<dyn FeedbackResultRepository>,
    llm: Arc<LlmGateway>,
    lock_lease: Duration,
    lock_wait: Duration,
}

impl TerminationDetector {
    pub fn new(
        lock: Arc<dyn DistributedLock>,
        sessions: Arc<dyn FeedbackSessionRepository>,
        results: Arc<dyn FeedbackResultRepository>,
        llm: Arc<LlmGateway>,
        lock_lease: Duration,
        lock_wait: Duration,
    ) -> Self {
        Self {
            lock,
            sessions,
            results,
            llm,
            lock_lease,
            lock_wait,
        }
    }

    fn lock_key(session_id: SessionId) -> String {
        format!("feedback-session-lock:{session_id}")
    }

    /// §4.6 steps 1-5. A lock-acquisition timeout surfaces as
    /// `CoreError::AiServiceTransient` (retriable) per §9's corrected
    /// behavior — the caller nacks-with-requeue instead of stranding the
    /// session in PENDING/IN_PROGRESS forever.
    pub async fn on_result_terminal(&self, session_id: SessionId) -> Result<(), CoreError> {
        let guard = self
            .lock
            .acquire(&Self::lock_key(session_id), self.lock_lease, self.lock_wait)
            .await?;

        let outcome = self.finalize_if_complete(session_id).await;
        guard.release().await?;
        outcome
    }

    /// Everything below runs while the lock is held.
    async fn finalize_if_complete(&self, session_id: SessionId) -> Result<(), CoreError> {
        let counts = self.results.counts_for_session(session_id).await?;
        if counts.completed + counts.failed < counts.total {
            return Ok(());
        }

        let mut session = self
            .sessions
            .get(session_id)
            .await?
            .ok_or_else(|| CoreError::ResourceNotFound(format!("feedback session {session_id}")))?;

        // §8 "at-most-once aggregation": a concurrent winner may have already
        // finalized this session between our count check and taking the lock
        // on a re-delivered message. The conditional check below makes the
        // whole operation idempotent regardless of interleaving.
        if matches!(session.status, SessionStatus::Completed | SessionStatus::Failed) {
            return Ok(());
        }

        if counts.completed == 0 {
            // §9 Open Question decision: every child FAILED -> session FAILED,
            // no aggregation call (nothing completed to aggregate over).
            session.fail()?;
            self.sessions.put(&session).await?;
            return Ok(());
        }

        let all_results = self.results.list_by_session(session_id).await?;
        let completed: Vec<_> = all_results
            .iter()
            .filter(|r| r.status == FeedbackResultStatus::Completed)
            .collect();

        let key_concerns: Vec<String> = completed
            .iter()
            .flat_map(|r| r.key_concerns.iter().cloned())
            .collect();

        let aggregation = self.llm.aggregate_session_insights(&key_concerns, None).await;
        let themes = match aggregation {
            Ok(themes) => themes,
            Err(e) => {
                let core_err: CoreError = e.into();
                if core_err.retriable() {
                    return Err(core_err);
                }
                // Permanent failure on the aggregation call itself: the
                // session can't produce the insights document I2 requires
                // for COMPLETED, so it terminates FAILED instead.
                session.fail()?;
                self.sessions.put(&session).await?;
                return Ok(());
            }
        };

        let scores: Vec<u8> = completed.iter().filter_map(|r| r.purchase_intent).collect();
        let average_score = if scores.is_empty() {
            0.0
        } else {
            scores.iter().map(|&s| s as f64).sum::<f64>() / scores.len() as f64
        };
        let high_intent_count = scores.iter().filter(|&&s| s >= HIGH_INTENT_THRESHOLD).count();
        let purchase_intent_percent = if scores.is_empty() {
            0.0
        } else {
            high_intent_count as f64 / scores.len() as f64 * 100.0
        };

        let insights = AggregatedInsights {
            average_score,
            purchase_intent_percent,
            key_themes: themes
                .into_iter()
                .map(|t| ThemeMention {
                    theme: t.theme,
                    mentions: t.mentions.max(0) as u32,
                })
                .collect(),
        };

        session.complete(insights)?;
        self.sessions.put(&session).await?;
        Ok(())
    }
}
