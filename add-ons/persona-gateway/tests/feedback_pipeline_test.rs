//! Integration test: the full persona -> feedback-session -> aggregation
//! pipeline, wired the same way `main.rs` wires it but against the
//! in-process broker/lock/sled-store defaults so the whole thing runs
//! single-process with a stub LLM provider.
//!
//! ## Scenarios
//! 1. Happy path: a 2-persona batch completes, then a 2x1 feedback session
//!    completes and the session transitions straight to COMPLETED with
//!    aggregated insights in the [5,7]-theme range.
//! 2. Ownership isolation: a second user's `GetFeedbackSession` call on the
//!    first user's session is rejected.
//! 3. Transient-then-success: a persona batch that fails twice with a 503
//!    before succeeding still lands every persona ACTIVE, with no duplicate
//!    rows created by the retries.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use persona_core::broker::{InProcessBroker, MessageBroker};
use persona_core::domain::characteristics::{ActivitySphere, Characteristics, Gender, IncomeLevel};
use persona_core::domain::feedback_session::SessionStatus;
use persona_core::domain::ids::new_id;
use persona_core::domain::persona::PersonaStatus;
use persona_core::domain::product::Product;
use persona_core::idempotency::IdempotencyCache;
use persona_core::lock::SledLock;
use persona_core::query::QueryService;
use persona_core::repository::{PersonaRepository, ProductRepository, SledStore};
use persona_llm::provider::{ChatRequest, ProviderCallError, ProviderResponse};
use persona_llm::{LlmGateway, LlmProvider, RetryPolicy};
use uuid::Uuid;

use persona_gateway::dispatch::{DispatchService, StartFeedbackSessionRequest, StartPersonaGenerationRequest};
use persona_gateway::termination::TerminationDetector;
use persona_gateway::worker::{FeedbackWorker, PersonaWorker};

/// Scripted provider: returns each body in order, repeating the last one.
/// Lets a test simulate "503, 503, 200" without a real HTTP server.
struct ScriptedProvider {
    responses: Vec<(u16, &'static str)>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn new(responses: Vec<(u16, &'static str)>) -> Self {
        Self {
            responses,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedProvider {
    async fn call_once(&self, _request: ChatRequest) -> Result<ProviderResponse, ProviderCallError> {
        let i = self.calls.fetch_add(1, Ordering::SeqCst);
        let (status, body) = self.responses[i.min(self.responses.len() - 1)];
        if (200..300).contains(&status) {
            Ok(ProviderResponse { status, body: body.to_string() })
        } else {
            Err(ProviderCallError { status: Some(status), message: body.to_string() })
        }
    }
}

fn gateway_with(provider: Arc<dyn LlmProvider>) -> Arc<LlmGateway> {
    Arc::new(LlmGateway::new(
        provider,
        RetryPolicy {
            base_delay: Duration::from_millis(1),
            ..RetryPolicy::default()
        },
        "test-model".into(),
    ))
}

fn characteristics() -> Characteristics {
    Characteristics {
        country: "DE".into(),
        city: "Berlin".into(),
        gender: Gender::Other,
        min_age: 20,
        max_age: 50,
        age: 20,
        activity_sphere: ActivitySphere::Finance,
        profession: "Analyst".into(),
        income_level: IncomeLevel::Medium,
        interests: vec!["cycling".into(), "budgeting".into()],
        additional_params: None,
    }
}

/// Drains the persona queue, running each delivery through `worker` until
/// the broker reports no more work — mirrors `PersonaWorker::run`'s loop
/// without blocking the test on a channel that never closes.
async fn drain_persona_queue(broker: &Arc<InProcessBroker>, worker: &PersonaWorker) {
    while let Ok(Some(delivery)) =
        tokio::time::timeout(Duration::from_millis(200), broker.consume_persona_task()).await
    {
        worker.handle_one(delivery).await;
    }
}

async fn drain_feedback_queue(broker: &Arc<InProcessBroker>, worker: &FeedbackWorker) {
    while let Ok(Some(delivery)) =
        tokio::time::timeout(Duration::from_millis(200), broker.consume_feedback_task()).await
    {
        worker.handle_one(delivery).await;
    }
}

struct Harness {
    store: Arc<SledStore>,
    persona_broker: Arc<InProcessBroker>,
    feedback_broker: Arc<InProcessBroker>,
    dispatch: Arc<DispatchService>,
}

fn build_harness() -> Harness {
    let store = Arc::new(SledStore::open_temp().unwrap());
    let persona_broker = InProcessBroker::new(16);
    let feedback_broker = persona_broker.clone();
    let dispatch = Arc::new(DispatchService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        persona_broker.clone(),
        IdempotencyCache::new(Duration::from_secs(300)),
        "test-model".into(),
    ));
    Harness {
        store,
        persona_broker,
        feedback_broker,
        dispatch,
    }
}

fn new_product(owner: Uuid, name: &str) -> Product {
    let now = chrono::Utc::now();
    Product {
        id: Uuid::new_v4(),
        owner_user_id: owner,
        name: name.into(),
        description: "a product under evaluation".into(),
        price: Some(9.99),
        currency: Some("EUR".into()),
        category: "household".into(),
        key_features: vec!["compact".into(), "affordable".into()],
        deleted: false,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn happy_path_batch_then_session_completes_with_aggregated_insights() {
    let h = build_harness();
    let owner = Uuid::new_v4();

    let persona_body = r#"[
        {"name":"Alvarez","detailed_description":"a budget-conscious commuter"},
        {"name":"Nakamura","detailed_description":"an early-adopter analyst"}
    ]"#;
    let persona_provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(vec![(200, persona_body)]));
    let persona_worker = PersonaWorker::new(h.store.clone(), h.persona_broker.clone(), gateway_with(persona_provider));

    let persona_ids = h
        .dispatch
        .start_persona_generation(
            owner,
            StartPersonaGenerationRequest {
                gender: Gender::Other,
                country: characteristics().country,
                city: characteristics().city,
                min_age: 20,
                max_age: 50,
                activity_sphere: ActivitySphere::Finance,
                profession: "Analyst".into(),
                income_level: IncomeLevel::Medium,
                interests: vec!["cycling".into()],
                additional_params: None,
                count: 2,
                model: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(persona_ids.len(), 2);

    drain_persona_queue(&h.persona_broker, &persona_worker).await;

    for id in &persona_ids {
        let persona = PersonaRepository::get(h.store.as_ref(), *id).await.unwrap().unwrap();
        assert_eq!(persona.status, PersonaStatus::Active);
    }

    let product_a = new_product(owner, "Widget");
    let product_b = new_product(owner, "Gadget");
    ProductRepository::put(h.store.as_ref(), &product_a).await.unwrap();
    ProductRepository::put(h.store.as_ref(), &product_b).await.unwrap();

    let aggregation_body = r#"[
        {"theme":"price","mentions":4},{"theme":"quality","mentions":3},
        {"theme":"packaging","mentions":2},{"theme":"support","mentions":1},
        {"theme":"durability","mentions":2}
    ]"#;
    let feedback_body = r#"{"feedback":"solid value for the price","purchase_intent":8,"key_concerns":["price","durability"]}"#;
    let feedback_provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(vec![
        (200, feedback_body),
        (200, feedback_body),
        (200, aggregation_body),
    ]));
    let feedback_llm = gateway_with(feedback_provider);

    let lock = Arc::new(SledLock::new(&h.store.db()).unwrap());
    let termination = Arc::new(TerminationDetector::new(
        lock,
        h.store.clone(),
        h.store.clone(),
        feedback_llm.clone(),
        Duration::from_secs(5),
        Duration::from_millis(500),
    ));
    let feedback_worker = FeedbackWorker::new(
        h.store.clone(),
        h.store.clone(),
        h.store.clone(),
        h.store.clone(),
        h.feedback_broker.clone(),
        feedback_llm,
        termination,
    );

    let session_id = h
        .dispatch
        .start_feedback_session(
            owner,
            StartFeedbackSessionRequest {
                product_ids: vec![product_a.id, product_b.id],
                persona_ids: vec![persona_ids[0]],
                language: "en".into(),
                model: None,
                idempotency_key: None,
            },
        )
        .await
        .unwrap();

    drain_feedback_queue(&h.feedback_broker, &feedback_worker).await;

    let query = QueryService::new(h.store.clone());
    let view = query.get_feedback_session(owner, session_id, 0, 10).await.unwrap();

    assert_eq!(view.session.status, SessionStatus::Completed);
    assert_eq!(view.results.len(), 2);
    assert!(view.results.iter().all(|r| r.purchase_intent == Some(8)));

    let insights = view.session.aggregated_insights.unwrap();
    assert!((5..=7).contains(&insights.key_themes.len()));
    assert_eq!(insights.average_score, 8.0);
    assert_eq!(insights.purchase_intent_percent, 100.0);
}

#[tokio::test]
async fn ownership_isolation_rejects_a_non_owner_read() {
    let h = build_harness();
    let owner = Uuid::new_v4();
    let intruder = Uuid::new_v4();

    let persona_body = r#"[{"name":"Solo","detailed_description":"a single persona"}]"#;
    let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(vec![(200, persona_body)]));
    let persona_worker = PersonaWorker::new(h.store.clone(), h.persona_broker.clone(), gateway_with(provider));

    let persona_ids = h
        .dispatch
        .start_persona_generation(
            owner,
            StartPersonaGenerationRequest {
                gender: Gender::Female,
                country: "US".into(),
                city: "Austin".into(),
                min_age: 30,
                max_age: 30,
                activity_sphere: ActivitySphere::Technology,
                profession: "Engineer".into(),
                income_level: IncomeLevel::High,
                interests: vec!["running".into()],
                additional_params: None,
                count: 1,
                model: None,
            },
        )
        .await
        .unwrap();
    drain_persona_queue(&h.persona_broker, &persona_worker).await;

    let product = new_product(owner, "Thing");
    ProductRepository::put(h.store.as_ref(), &product).await.unwrap();

    let session_id = h
        .dispatch
        .start_feedback_session(
            owner,
            StartFeedbackSessionRequest {
                product_ids: vec![product.id],
                persona_ids,
                language: "en".into(),
                model: None,
                idempotency_key: None,
            },
        )
        .await
        .unwrap();

    let query = QueryService::new(h.store.clone());
    let err = query
        .get_feedback_session(intruder, session_id, 0, 10)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), persona_core::ErrorKind::UnauthorizedAccess);
}

#[tokio::test]
async fn transient_failures_are_retried_without_duplicating_rows() {
    let h = build_harness();
    let owner = Uuid::new_v4();

    let ok_body = r#"[{"name":"Resilient","detailed_description":"survives three tries"}]"#;
    let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(vec![
        (503, "unavailable"),
        (503, "unavailable"),
        (200, ok_body),
    ]));
    let llm = Arc::new(LlmGateway::new(
        provider,
        RetryPolicy {
            base_delay: Duration::from_millis(1),
            max_attempts: 3,
            ..RetryPolicy::default()
        },
        "test-model".into(),
    ));
    let worker = PersonaWorker::new(h.store.clone(), h.persona_broker.clone(), llm);

    let persona_ids = h
        .dispatch
        .start_persona_generation(
            owner,
            StartPersonaGenerationRequest {
                gender: Gender::Male,
                country: "FR".into(),
                city: "Lyon".into(),
                min_age: 40,
                max_age: 40,
                activity_sphere: ActivitySphere::Education,
                profession: "Teacher".into(),
                income_level: IncomeLevel::Low,
                interests: vec!["reading".into()],
                additional_params: None,
                count: 1,
                model: None,
            },
        )
        .await
        .unwrap();

    // The internal retry policy absorbs the two 503s in one delivery, so a
    // single drain pass is enough -- no redelivery needed at the queue level.
    drain_persona_queue(&h.persona_broker, &worker).await;

    let all = PersonaRepository::list_by_owner(h.store.as_ref(), owner).await.unwrap();
    assert_eq!(all.len(), 1, "retries must not create duplicate persona rows");
    assert_eq!(all[0].id, persona_ids[0]);
    assert_eq!(all[0].status, PersonaStatus::Active);
    assert_eq!(all[0].name.as_deref(), Some("Resilient"));
}

/// `new_id` exercises the same id-generation helper `dispatch` uses for a
/// batch id, confirming it's exported for integration callers that need to
/// correlate a re-sent task with its original batch.
#[test]
fn new_id_produces_distinct_values() {
    let a = new_id();
    let b = new_id();
    assert_ne!(a, b);
}

