//! In-process message broker (§4.2, §4.6): the default adapter behind the
//! `MessageBroker` trait boundary. A production deployment swaps this for a
//! real broker product without touching dispatch/worker code.
//!
//! One `tokio::mpsc` channel per topic models the queue; `nack(requeue)`
//! either drops the delivery or sends it back onto the same channel. There is
//! no acked-but-not-removed state to track because the channel itself is the
//! source of truth — once a delivery is taken out via `recv`, it's gone
//! unless explicitly requeued.

use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::domain::ids::{PersonaId, ProductId, ResultId, SessionId, UserId};
use crate::error::CoreError;

/// §4.2: one persona-batch task per Dispatch request (Open Question 1 resolution).
/// Persona ids are pre-allocated at dispatch time so a requeued delivery reuses
/// them instead of minting new rows.
#[derive(Debug, Clone)]
pub struct PersonaGenerationTask {
    pub batch_id: Uuid,
    pub owner_user_id: UserId,
    pub persona_ids: Vec<PersonaId>,
    pub model: String,
}

/// §4.2, §6: one task per (product, persona) cell. Mirrors the wire envelope
/// `{resultId, sessionId, ownerUserId, productId, personaId, language}`
/// verbatim, plus the resolved model id dispatch already picked.
#[derive(Debug, Clone)]
pub struct FeedbackGenerationTask {
    pub result_id: ResultId,
    pub session_id: SessionId,
    pub owner_user_id: UserId,
    pub product_id: ProductId,
    pub persona_id: PersonaId,
    pub language: String,
    pub model: String,
}

/// A delivery taken off a queue. Drop without calling `ack`/`nack` behaves
/// like `nack(false)` — the in-process channel already removed it, so a
/// silently dropped delivery is simply lost, same as a broker consumer that
/// crashes mid-processing without acking.
pub struct Delivery<T> {
    task: T,
    requeue_tx: mpsc::Sender<T>,
}

impl<T> Delivery<T> {
    pub fn task(&self) -> &T {
        &self.task
    }

    pub fn ack(self) {}

    /// `requeue = true` puts the task back on the tail of the same queue.
    pub async fn nack(self, requeue: bool) {
        if requeue {
            let _ = self.requeue_tx.send(self.task).await;
        }
    }
}

#[async_trait::async_trait]
pub trait MessageBroker: Send + Sync {
    async fn publish_persona_task(&self, task: PersonaGenerationTask) -> Result<(), CoreError>;
    async fn consume_persona_task(&self) -> Option<Delivery<PersonaGenerationTask>>;

    async fn publish_feedback_task(&self, task: FeedbackGenerationTask) -> Result<(), CoreError>;
    async fn consume_feedback_task(&self) -> Option<Delivery<FeedbackGenerationTask>>;
}

/// Default prefetch-equivalent: the channel's buffer size (§5 "prefetch bounded pool").
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

pub struct InProcessBroker {
    persona_tx: mpsc::Sender<PersonaGenerationTask>,
    persona_rx: tokio::sync::Mutex<mpsc::Receiver<PersonaGenerationTask>>,
    feedback_tx: mpsc::Sender<FeedbackGenerationTask>,
    feedback_rx: tokio::sync::Mutex<mpsc::Receiver<FeedbackGenerationTask>>,
}

impl InProcessBroker {
    pub fn new(capacity: usize) -> Arc<Self> {
        let (persona_tx, persona_rx) = mpsc::channel(capacity);
        let (feedback_tx, feedback_rx) = mpsc::channel(capacity);
        Arc::new(Self {
            persona_tx,
            persona_rx: tokio::sync::Mutex::new(persona_rx),
            feedback_tx,
            feedback_rx: tokio::sync::Mutex::new(feedback_rx),
        })
    }
}

impl Default for InProcessBroker {
    fn default() -> Self {
        let (persona_tx, persona_rx) = mpsc::channel(DEFAULT_QUEUE_CAPACITY);
        let (feedback_tx, feedback_rx) = mpsc::channel(DEFAULT_QUEUE_CAPACITY);
        Self {
            persona_tx,
            persona_rx: tokio::sync::Mutex::new(persona_rx),
            feedback_tx,
            feedback_rx: tokio::sync::Mutex::new(feedback_rx),
        }
    }
}

#[async_trait::async_trait]
impl MessageBroker for InProcessBroker {
    async fn publish_persona_task(&self, task: PersonaGenerationTask) -> Result<(), CoreError> {
        self.persona_tx
            .send(task)
            .await
            .map_err(|_| CoreError::Internal("persona queue closed".into()))
    }

    async fn consume_persona_task(&self) -> Option<Delivery<PersonaGenerationTask>> {
        let mut rx = self.persona_rx.lock().await;
        let task = rx.recv().await?;
        Some(Delivery {
            task,
            requeue_tx: self.persona_tx.clone(),
        })
    }

    async fn publish_feedback_task(&self, task: FeedbackGenerationTask) -> Result<(), CoreError> {
        self.feedback_tx
            .send(task)
            .await
            .map_err(|_| CoreError::Internal("feedback queue closed".into()))
    }

    async fn consume_feedback_task(&self) -> Option<Delivery<FeedbackGenerationTask>> {
        let mut rx = self.feedback_rx.lock().await;
        let task = rx.recv().await?;
        Some(Delivery {
            task,
            requeue_tx: self.feedback_tx.clone(),
        })
    }
}
