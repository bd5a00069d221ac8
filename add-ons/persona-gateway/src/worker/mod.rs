//! Worker runtime (§4.2): one task type per queue, manual ack/nack, the
//! idempotency-then-claim-then-call-then-terminal-write contract spelled out
//! step by step in the component design.
//!
//! Each worker's `run` loop is spawned once per pool slot in `main.rs`
//! (§5 "parallel workers within a process ... concurrency = 3..10"); the
//! `InProcessBroker`'s single receiver behind a mutex is what actually
//! serializes delivery across those slots; nothing here assumes a single
//! worker instance.

use std::sync::Arc;

use persona_core::broker::{Delivery, FeedbackGenerationTask, MessageBroker, PersonaGenerationTask};
use persona_core::domain::feedback_result::FeedbackResultStatus;
use persona_core::domain::ids::SessionId;
use persona_core::domain::persona::PersonaStatus;
use persona_core::error::CoreError;
use persona_core::repository::{FeedbackResultRepository, FeedbackSessionRepository, PersonaRepository, ProductRepository};
use persona_llm::prompt::{FeedbackPromptInput, PersonaBatchPromptInput};
use persona_llm::LlmGateway;

use crate::termination::TerminationDetector;

/// §4.2: consumes `persona.generation.queue` deliveries. One message carries
/// a whole batch (§9 Open Question 1 resolution); claimed personas that
/// still lack a draft after a short response are individually FAILED rather
/// than failing the entire delivery (§4.5 tolerant-shortfall policy).
pub struct PersonaWorker {
    personas: Arc<dyn PersonaRepository>,
    broker: Arc<dyn MessageBroker>,
    llm: Arc<LlmGateway>,
}

impl PersonaWorker {
    pub fn new(personas: Arc<dyn PersonaRepository>, broker: Arc<dyn MessageBroker>, llm: Arc<LlmGateway>) -> Self {
        Self { personas, broker, llm }
    }

    pub async fn run(self: Arc<Self>) {
        while let Some(delivery) = self.broker.consume_persona_task().await {
            self.handle_one(delivery).await;
        }
    }

    async fn handle_one(&self, delivery: Delivery<PersonaGenerationTask>) {
        let task = delivery.task().clone();
        match self.process(&task).await {
            Ok(()) => delivery.ack(),
            Err(e) if e.retriable() => {
                tracing::warn!(batch_id = %task.batch_id, error = %e, "persona batch failed, requeueing");
                delivery.nack(true).await;
            }
            Err(e) => {
                tracing::error!(batch_id = %task.batch_id, error = %e, "persona batch permanently failed");
                delivery.nack(false).await;
            }
        }
    }

    /// §4.2 steps 1-5 adapted to a batch message: fetch every referenced
    /// persona, skip ones already terminal (idempotency), claim the rest via
    /// the storage-layer CAS (I4), call the LLM once for the whole claimed
    /// set, then fan the drafts back out.
    async fn process(&self, task: &PersonaGenerationTask) -> Result<(), CoreError> {
        let mut claimed = Vec::with_capacity(task.persona_ids.len());
        for id in &task.persona_ids {
            let Some(persona) = self.personas.get(*id).await? else {
                continue;
            };
            // §4.2 step 2: ACTIVE is the terminal success state — ack and move
            // on. A persona never returns to GENERATING once FAILED (§3
            // lifecycle), so FAILED is also left alone here despite the
            // generic "allow retry" wording, which applies to FeedbackResult.
            if persona.status != PersonaStatus::Generating {
                continue;
            }
            match self.personas.try_claim(*id, persona.version).await? {
                Some(claimed_persona) => claimed.push(claimed_persona),
                None => continue, // lost the CAS race to another worker
            }
        }

        if claimed.is_empty() {
            return Ok(());
        }

        let sample = &claimed[0].characteristics;
        let input = PersonaBatchPromptInput {
            country: &sample.country,
            city: &sample.city,
            gender: gender_label(sample.gender),
            min_age: sample.min_age,
            max_age: sample.max_age,
            activity_sphere: activity_sphere_label(sample.activity_sphere),
            profession: &sample.profession,
            income_level: income_level_label(sample.income_level),
            interests: &sample.interests,
            additional_params: sample.additional_params.as_deref(),
            count: claimed.len(),
        };

        let target_ages = persona_llm::prompt::target_ages(sample.min_age, sample.max_age, claimed.len());

        match self.llm.generate_persona_batch(&input, Some(&task.model)).await {
            Ok(drafts) => {
                let mut drafts = drafts.into_iter();
                for (i, mut persona) in claimed.into_iter().enumerate() {
                    match drafts.next() {
                        Some(draft) => {
                            if let Some(&age) = target_ages.get(i) {
                                persona.characteristics.age = age;
                            }
                            persona.complete(draft.name, draft.detailed_description, None)?;
                        }
                        None => {
                            tracing::warn!(
                                persona_id = %persona.id,
                                "batch response had fewer personas than claimed; failing the remainder"
                            );
                            persona.fail()?;
                        }
                    }
                    self.personas.put(&persona).await?;
                }
                Ok(())
            }
            Err(e) => {
                let core_err: CoreError = e.into();
                if core_err.retriable() {
                    for mut persona in claimed {
                        persona.release_claim();
                        self.personas.put(&persona).await?;
                    }
                    Err(core_err)
                } else {
                    for mut persona in claimed {
                        persona.fail()?;
                        self.personas.put(&persona).await?;
                    }
                    Err(core_err)
                }
            }
        }
    }
}

fn gender_label(g: persona_core::domain::characteristics::Gender) -> &'static str {
    use persona_core::domain::characteristics::Gender;
    match g {
        Gender::Male => "MALE",
        Gender::Female => "FEMALE",
        Gender::Other => "OTHER",
    }
}

fn income_level_label(l: persona_core::domain::characteristics::IncomeLevel) -> &'static str {
    use persona_core::domain::characteristics::IncomeLevel;
    match l {
        IncomeLevel::Low => "LOW",
        IncomeLevel::Medium => "MEDIUM",
        IncomeLevel::High => "HIGH",
    }
}

fn activity_sphere_label(a: persona_core::domain::characteristics::ActivitySphere) -> &'static str {
    use persona_core::domain::characteristics::ActivitySphere;
    match a {
        ActivitySphere::Technology => "technology",
        ActivitySphere::Healthcare => "healthcare",
        ActivitySphere::Education => "education",
        ActivitySphere::Finance => "finance",
        ActivitySphere::Retail => "retail",
        ActivitySphere::Manufacturing => "manufacturing",
        ActivitySphere::Hospitality => "hospitality",
        ActivitySphere::Creative => "creative",
        ActivitySphere::PublicSector => "public_sector",
        ActivitySphere::Agriculture => "agriculture",
    }
}

/// §4.2: consumes `feedback.generation.queue` deliveries, one per
/// (product, persona) cell, then invokes the termination detector (§4.6)
/// after every terminal write.
pub struct FeedbackWorker {
    results: Arc<dyn FeedbackResultRepository>,
    sessions: Arc<dyn FeedbackSessionRepository>,
    personas: Arc<dyn PersonaRepository>,
    products: Arc<dyn ProductRepository>,
    broker: Arc<dyn MessageBroker>,
    llm: Arc<LlmGateway>,
    termination: Arc<TerminationDetector>,
}

impl FeedbackWorker {
    pub fn new(
        results: Arc<dyn FeedbackResultRepository>,
        sessions: Arc<dyn FeedbackSessionRepository>,
        personas: Arc<dyn PersonaRepository>,
        products: Arc<dyn ProductRepository>,
        broker: Arc<dyn MessageBroker>,
        llm: Arc<LlmGateway>,
        termination: Arc<TerminationDetector>,
    ) -> Self {
        Self {
            results,
            sessions,
            personas,
            products,
            broker,
            llm,
            termination,
        }
    }

    pub async fn run(self: Arc<Self>) {
        while let Some(delivery) = self.broker.consume_feedback_task().await {
            self.handle_one(delivery).await;
        }
    }

    async fn handle_one(&self, delivery: Delivery<FeedbackGenerationTask>) {
        let task = delivery.task().clone();
        match self.process(&task).await {
            Ok(()) => delivery.ack(),
            Err(e) if e.retriable() => {
                tracing::warn!(result_id = %task.result_id, error = %e, "feedback task failed, requeueing");
                delivery.nack(true).await;
            }
            Err(e) => {
                tracing::error!(result_id = %task.result_id, error = %e, "feedback task permanently failed");
                delivery.nack(false).await;
            }
        }
    }

    async fn process(&self, task: &FeedbackGenerationTask) -> Result<(), CoreError> {
        let mut result = self
            .results
            .get(task.result_id)
            .await?
            .ok_or_else(|| CoreError::ResourceNotFound(format!("feedback result {}", task.result_id)))?;

        // §4.2 step 2: COMPLETED is the terminal success state — ack and
        // return, but still drive the termination check in case an earlier
        // attempt wrote this result and then lost its termination-detector
        // call to a lock timeout.
        if result.status == FeedbackResultStatus::Completed {
            return self.termination.on_result_terminal(task.session_id).await;
        }
        if result.status == FeedbackResultStatus::Failed {
            result.reset_for_retry()?;
        }

        result.mark_in_progress()?;
        self.results.put(&result).await?;
        self.mark_session_in_progress(task.session_id).await?;

        let persona = self
            .personas
            .get(task.persona_id)
            .await?
            .ok_or_else(|| CoreError::ResourceNotFound(format!("persona {}", task.persona_id)))?;
        let product = self
            .products
            .get(task.product_id)
            .await?
            .ok_or_else(|| CoreError::ResourceNotFound(format!("product {}", task.product_id)))?;

        let input = FeedbackPromptInput {
            persona_bio: persona.detailed_description.as_deref().unwrap_or(""),
            product_attitudes: persona.product_attitudes.as_deref(),
            product_name: &product.name,
            product_description: &product.description,
            product_price: product.price,
            product_category: &product.category,
            product_key_features: &product.key_features,
            language: &task.language,
        };

        match self.llm.generate_feedback(&input, Some(&task.model)).await {
            Ok(draft) => {
                result.complete(draft.feedback, draft.purchase_intent as u8, draft.key_concerns);
                self.results.put(&result).await?;
            }
            Err(e) => {
                let core_err: CoreError = e.into();
                if core_err.retriable() {
                    // Left IN_PROGRESS: a redelivery re-enters `process` and
                    // proceeds straight past the idempotency check above to
                    // retry generation, same as the first attempt.
                    return Err(core_err);
                }
                result.fail();
                self.results.put(&result).await?;
            }
        }

        self.termination.on_result_terminal(task.session_id).await
    }

    async fn mark_session_in_progress(&self, session_id: SessionId) -> Result<(), CoreError> {
        if let Some(mut session) = self.sessions.get(session_id).await? {
            session.mark_in_progress_if_pending();
            self.sessions.put(&session).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use persona_core::broker::{FeedbackGenerationTask, InProcessBroker, PersonaGenerationTask};
    use persona_core::domain::characteristics::{ActivitySphere, Characteristics, Gender, IncomeLevel};
    use persona_core::domain::feedback_session::FeedbackSession;
    use persona_core::domain::persona::Persona;
    use persona_core::domain::product::Product;
    use persona_core::lock::SledLock;
    use persona_core::repository::SledStore;
    use persona_llm::provider::{ChatRequest, ProviderCallError, ProviderResponse};
    use persona_llm::{LlmProvider, RetryPolicy};
    use std::time::Duration;
    use uuid::Uuid;

    struct StubProvider {
        body: String,
    }

    #[async_trait::async_trait]
    impl LlmProvider for StubProvider {
        async fn call_once(&self, _request: ChatRequest) -> Result<ProviderResponse, ProviderCallError> {
            Ok(ProviderResponse {
                status: 200,
                body: self.body.clone(),
            })
        }
    }

    struct FailingProvider {
        retriable: bool,
    }

    #[async_trait::async_trait]
    impl LlmProvider for FailingProvider {
        async fn call_once(&self, _request: ChatRequest) -> Result<ProviderResponse, ProviderCallError> {
            if self.retriable {
                Err(ProviderCallError {
                    status: Some(503),
                    message: "simulated transient failure".into(),
                })
            } else {
                Err(ProviderCallError {
                    status: Some(400),
                    message: "simulated permanent failure".into(),
                })
            }
        }
    }

    fn gateway_with(body: &str) -> Arc<LlmGateway> {
        Arc::new(LlmGateway::new(
            Arc::new(StubProvider { body: body.into() }),
            RetryPolicy::default(),
            "test-model".into(),
        ))
    }

    fn sample_characteristics() -> Characteristics {
        Characteristics {
            country: "US".into(),
            city: "Austin".into(),
            gender: Gender::Female,
            min_age: 25,
            max_age: 40,
            age: 30,
            activity_sphere: ActivitySphere::Technology,
            profession: "Product Manager".into(),
            income_level: IncomeLevel::High,
            interests: vec!["hiking".into()],
            additional_params: None,
        }
    }

    #[tokio::test]
    async fn persona_worker_completes_a_full_batch() {
        let store = Arc::new(SledStore::open_temp().unwrap());
        let owner = Uuid::new_v4();
        let p1 = Persona::new_generating(owner, sample_characteristics(), "test-model".into());
        let p2 = Persona::new_generating(owner, sample_characteristics(), "test-model".into());
        store.put(&p1).await.unwrap();
        store.put(&p2).await.unwrap();

        let broker = InProcessBroker::new(4);
        let body = r#"[{"name":"A","detailed_description":"bio a"},{"name":"B","detailed_description":"bio b"}]"#;
        let worker = PersonaWorker::new(store.clone(), broker.clone(), gateway_with(body));

        broker
            .publish_persona_task(PersonaGenerationTask {
                batch_id: Uuid::new_v4(),
                owner_user_id: owner,
                persona_ids: vec![p1.id, p2.id],
                model: "test-model".into(),
            })
            .await
            .unwrap();
        let delivery = broker.consume_persona_task().await.unwrap();
        worker.handle_one(delivery).await;

        let r1 = store.get(p1.id).await.unwrap().unwrap();
        let r2 = store.get(p2.id).await.unwrap().unwrap();
        assert_eq!(r1.status, PersonaStatus::Active);
        assert_eq!(r2.status, PersonaStatus::Active);
    }

    #[tokio::test]
    async fn persona_worker_fails_the_remainder_on_a_short_batch_response() {
        let store = Arc::new(SledStore::open_temp().unwrap());
        let owner = Uuid::new_v4();
        let p1 = Persona::new_generating(owner, sample_characteristics(), "test-model".into());
        let p2 = Persona::new_generating(owner, sample_characteristics(), "test-model".into());
        store.put(&p1).await.unwrap();
        store.put(&p2).await.unwrap();

        let broker = InProcessBroker::new(4);
        let body = r#"[{"name":"A","detailed_description":"bio a"}]"#;
        let worker = PersonaWorker::new(store.clone(), broker.clone(), gateway_with(body));

        broker
            .publish_persona_task(PersonaGenerationTask {
                batch_id: Uuid::new_v4(),
                owner_user_id: owner,
                persona_ids: vec![p1.id, p2.id],
                model: "test-model".into(),
            })
            .await
            .unwrap();
        let delivery = broker.consume_persona_task().await.unwrap();
        worker.handle_one(delivery).await;

        let r1 = store.get(p1.id).await.unwrap().unwrap();
        let r2 = store.get(p2.id).await.unwrap().unwrap();
        assert_eq!(r1.status, PersonaStatus::Active);
        assert_eq!(r2.status, PersonaStatus::Failed);
    }

    #[tokio::test]
    async fn persona_worker_skips_an_already_active_persona() {
        let store = Arc::new(SledStore::open_temp().unwrap());
        let owner = Uuid::new_v4();
        let mut p1 = Persona::new_generating(owner, sample_characteristics(), "test-model".into());
        p1.try_claim_generation(0).unwrap();
        p1.complete("Already Done".into(), "bio".into(), None).unwrap();
        store.put(&p1).await.unwrap();

        let broker = InProcessBroker::new(4);
        // Would fail validation if the LLM were ever called for this persona.
        let worker = PersonaWorker::new(store.clone(), broker.clone(), gateway_with("not json"));

        broker
            .publish_persona_task(PersonaGenerationTask {
                batch_id: Uuid::new_v4(),
                owner_user_id: owner,
                persona_ids: vec![p1.id],
                model: "test-model".into(),
            })
            .await
            .unwrap();
        let delivery = broker.consume_persona_task().await.unwrap();
        worker.handle_one(delivery).await;

        let reloaded = store.get(p1.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, PersonaStatus::Active);
        assert_eq!(reloaded.name.as_deref(), Some("Already Done"));
    }

    #[tokio::test]
    async fn persona_worker_releases_claim_on_retriable_failure() {
        let store = Arc::new(SledStore::open_temp().unwrap());
        let owner = Uuid::new_v4();
        let p1 = Persona::new_generating(owner, sample_characteristics(), "test-model".into());
        store.put(&p1).await.unwrap();

        let broker = InProcessBroker::new(4);
        let llm = Arc::new(LlmGateway::new(
            Arc::new(FailingProvider { retriable: true }),
            RetryPolicy {
                max_attempts: 1,
                ..RetryPolicy::default()
            },
            "test-model".into(),
        ));
        let worker = PersonaWorker::new(store.clone(), broker.clone(), llm);

        broker
            .publish_persona_task(PersonaGenerationTask {
                batch_id: Uuid::new_v4(),
                owner_user_id: owner,
                persona_ids: vec![p1.id],
                model: "test-model".into(),
            })
            .await
            .unwrap();
        let delivery = broker.consume_persona_task().await.unwrap();
        worker.handle_one(delivery).await;

        let reloaded = store.get(p1.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, PersonaStatus::Generating);
        assert!(!reloaded.generation_in_progress);

        // Requeued delivery can be reclaimed and completed by a later attempt.
        let redelivered = broker.consume_persona_task().await.unwrap();
        let worker2 = PersonaWorker::new(
            store.clone(),
            broker.clone(),
            gateway_with(r#"[{"name":"A","detailed_description":"bio"}]"#),
        );
        worker2.handle_one(redelivered).await;
        let final_state = store.get(p1.id).await.unwrap().unwrap();
        assert_eq!(final_state.status, PersonaStatus::Active);
    }

    fn sample_product(owner: Uuid) -> Product {
        let now = chrono::Utc::now();
        Product {
            id: Uuid::new_v4(),
            owner_user_id: owner,
            name: "Widget".into(),
            description: "A fine widget".into(),
            price: Some(19.99),
            currency: Some("USD".into()),
            category: "gadgets".into(),
            key_features: vec!["durable".into(), "lightweight".into()],
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn feedback_worker(
        store: Arc<SledStore>,
        broker: Arc<InProcessBroker>,
        llm: Arc<LlmGateway>,
    ) -> FeedbackWorker {
        let lock = Arc::new(SledLock::new(&store.db()).unwrap());
        let termination = Arc::new(TerminationDetector::new(
            lock,
            store.clone(),
            store.clone(),
            llm.clone(),
            Duration::from_secs(5),
            Duration::from_millis(200),
        ));
        FeedbackWorker::new(store.clone(), store.clone(), store.clone(), store, broker, llm, termination)
    }

    #[tokio::test]
    async fn feedback_worker_completes_a_result_and_drives_termination() {
        let store = Arc::new(SledStore::open_temp().unwrap());
        let owner = Uuid::new_v4();
        let product = sample_product(owner);
        store.put(&product).await.unwrap();
        let mut persona = Persona::new_generating(owner, sample_characteristics(), "test-model".into());
        persona.try_claim_generation(0).unwrap();
        persona.complete("Jane".into(), "a thoughtful buyer".into(), None).unwrap();
        store.put(&persona).await.unwrap();

        let session = FeedbackSession::new_pending(owner, "en".into());
        FeedbackSessionRepository::put(store.as_ref(), &session).await.unwrap();
        let result = persona_core::domain::feedback_result::FeedbackResult::new_pending(session.id, product.id, persona.id);
        FeedbackResultRepository::create_unique(store.as_ref(), &result).await.unwrap();

        let broker = InProcessBroker::new(4);
        let body = r#"{"feedback":"looks good","purchase_intent":9,"key_concerns":["price","shipping"]}"#;
        let llm = gateway_with(body);
        let worker = feedback_worker(store.clone(), broker.clone(), llm);

        broker
            .publish_feedback_task(FeedbackGenerationTask {
                result_id: result.id,
                session_id: session.id,
                owner_user_id: owner,
                product_id: product.id,
                persona_id: persona.id,
                language: "en".into(),
                model: "test-model".into(),
            })
            .await
            .unwrap();
        let delivery = broker.consume_feedback_task().await.unwrap();
        worker.handle_one(delivery).await;

        let reloaded = FeedbackResultRepository::get(store.as_ref(), result.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, FeedbackResultStatus::Completed);
        assert_eq!(reloaded.purchase_intent, Some(9));

        // Single-result session: the terminal write should have driven the
        // session straight to COMPLETED without a separate trigger.
        let session_after = FeedbackSessionRepository::get(store.as_ref(), session.id).await.unwrap().unwrap();
        assert!(matches!(
            session_after.status,
            persona_core::domain::feedback_session::SessionStatus::Completed
        ));
    }

    #[tokio::test]
    async fn feedback_worker_resets_a_failed_result_before_retrying() {
        let store = Arc::new(SledStore::open_temp().unwrap());
        let owner = Uuid::new_v4();
        let product = sample_product(owner);
        store.put(&product).await.unwrap();
        let mut persona = Persona::new_generating(owner, sample_characteristics(), "test-model".into());
        persona.try_claim_generation(0).unwrap();
        persona.complete("Jane".into(), "a thoughtful buyer".into(), None).unwrap();
        store.put(&persona).await.unwrap();

        let session = FeedbackSession::new_pending(owner, "en".into());
        FeedbackSessionRepository::put(store.as_ref(), &session).await.unwrap();
        let mut result = persona_core::domain::feedback_result::FeedbackResult::new_pending(session.id, product.id, persona.id);
        FeedbackResultRepository::create_unique(store.as_ref(), &result).await.unwrap();
        result.mark_in_progress().unwrap();
        result.fail();
        FeedbackResultRepository::put(store.as_ref(), &result).await.unwrap();

        let broker = InProcessBroker::new(4);
        let body = r#"{"feedback":"second try works","purchase_intent":5,"key_concerns":["price","fit"]}"#;
        let worker = feedback_worker(store.clone(), broker.clone(), gateway_with(body));

        broker
            .publish_feedback_task(FeedbackGenerationTask {
                result_id: result.id,
                session_id: session.id,
                owner_user_id: owner,
                product_id: product.id,
                persona_id: persona.id,
                language: "en".into(),
                model: "test-model".into(),
            })
            .await
            .unwrap();
        let delivery = broker.consume_feedback_task().await.unwrap();
        worker.handle_one(delivery).await;

        let reloaded = FeedbackResultRepository::get(store.as_ref(), result.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, FeedbackResultStatus::Completed);
    }

    #[tokio::test]
    async fn feedback_worker_fails_a_result_on_permanent_llm_error() {
        let store = Arc::new(SledStore::open_temp().unwrap());
        let owner = Uuid::new_v4();
        let product = sample_product(owner);
        store.put(&product).await.unwrap();
        let mut persona = Persona::new_generating(owner, sample_characteristics(), "test-model".into());
        persona.try_claim_generation(0).unwrap();
        persona.complete("Jane".into(), "a thoughtful buyer".into(), None).unwrap();
        store.put(&persona).await.unwrap();

        let session = FeedbackSession::new_pending(owner, "en".into());
        FeedbackSessionRepository::put(store.as_ref(), &session).await.unwrap();
        let result = persona_core::domain::feedback_result::FeedbackResult::new_pending(session.id, product.id, persona.id);
        FeedbackResultRepository::create_unique(store.as_ref(), &result).await.unwrap();

        let broker = InProcessBroker::new(4);
        // Not valid JSON => permanent validation failure, no retry.
        let worker = feedback_worker(store.clone(), broker.clone(), gateway_with("not json"));

        broker
            .publish_feedback_task(FeedbackGenerationTask {
                result_id: result.id,
                session_id: session.id,
                owner_user_id: owner,
                product_id: product.id,
                persona_id: persona.id,
                language: "en".into(),
                model: "test-model".into(),
            })
            .await
            .unwrap();
        let delivery = broker.consume_feedback_task().await.unwrap();
        worker.handle_one(delivery).await;

        let reloaded = FeedbackResultRepository::get(store.as_ref(), result.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, FeedbackResultStatus::Failed);

        let session_after = FeedbackSessionRepository::get(store.as_ref(), session.id).await.unwrap().unwrap();
        assert!(matches!(
            session_after.status,
            persona_core::domain::feedback_session::SessionStatus::Failed
        ));
    }
}
