//! Dispatch service (§4.1): `StartPersonaGeneration` and
//! `StartFeedbackSession`, plus the idempotency-key cache contract.

use std::sync::Arc;

use persona_core::broker::{FeedbackGenerationTask, MessageBroker, PersonaGenerationTask};
use persona_core::domain::characteristics::{ActivitySphere, Characteristics, Gender, IncomeLevel};
use persona_core::domain::ids::{PersonaId, ProductId, SessionId, UserId};
use persona_core::idempotency::IdempotencyCache;
use persona_core::repository::{FeedbackResultRepository, FeedbackSessionRepository, PersonaRepository, ProductRepository};
use persona_core::{CoreError, FeedbackResult, FeedbackSession, Persona};
use persona_llm::prompt::is_whitelisted_language;

pub struct StartPersonaGenerationRequest {
    pub gender: Gender,
    pub country: String,
    pub city: String,
    pub min_age: u8,
    pub max_age: u8,
    pub activity_sphere: ActivitySphere,
    pub profession: String,
    pub income_level: IncomeLevel,
    pub interests: Vec<String>,
    pub additional_params: Option<String>,
    pub count: u8,
    pub model: Option<String>,
}

pub struct StartFeedbackSessionRequest {
    pub product_ids: Vec<ProductId>,
    pub persona_ids: Vec<PersonaId>,
    pub language: String,
    pub model: Option<String>,
    pub idempotency_key: Option<String>,
}

pub struct DispatchService {
    products: Arc<dyn ProductRepository>,
    personas: Arc<dyn PersonaRepository>,
    sessions: Arc<dyn FeedbackSessionRepository>,
    results: Arc<dyn FeedbackResultRepository>,
    broker: Arc<dyn MessageBroker>,
    idempotency: IdempotencyCache,
    default_model: String,
}

impl DispatchService {
    pub fn new(
        products: Arc<dyn ProductRepository>,
        personas: Arc<dyn PersonaRepository>,
        sessions: Arc<dyn FeedbackSessionRepository>,
        results: Arc<dyn FeedbackResultRepository>,
        broker: Arc<dyn MessageBroker>,
        idempotency: IdempotencyCache,
        default_model: String,
    ) -> Self {
        Self {
            products,
            personas,
            sessions,
            results,
            broker,
            idempotency,
            default_model,
        }
    }

    /// §4.1: validates the request, writes `count` GENERATING personas, then
    /// publishes one batch task message (§4.2 Open Question 1 resolution:
    /// one message carries the full characteristics bundle and `count`).
    pub async fn start_persona_generation(
        &self,
        owner_user_id: UserId,
        request: StartPersonaGenerationRequest,
    ) -> Result<Vec<PersonaId>, CoreError> {
        if request.min_age > request.max_age {
            return Err(CoreError::Validation("min_age must be <= max_age".into()));
        }
        if request.interests.is_empty() {
            return Err(CoreError::Validation("interests must not be empty".into()));
        }
        if let Some(params) = &request.additional_params {
            if params.len() > 500 {
                return Err(CoreError::Validation("additional_params must be <= 500 chars".into()));
            }
        }
        if !(1..=10).contains(&request.count) {
            return Err(CoreError::Validation("count must be in 1..=10".into()));
        }

        let model = request.model.unwrap_or_else(|| self.default_model.clone());
        let characteristics = Characteristics {
            country: request.country,
            city: request.city,
            gender: request.gender,
            min_age: request.min_age,
            max_age: request.max_age,
            age: request.min_age,
            activity_sphere: request.activity_sphere,
            profession: request.profession,
            income_level: request.income_level,
            interests: request.interests,
            additional_params: request.additional_params,
        };

        let mut persona_ids = Vec::with_capacity(request.count as usize);
        for _ in 0..request.count {
            let persona = Persona::new_generating(owner_user_id, characteristics.clone(), model.clone());
            persona_ids.push(persona.id);
            self.personas.put(&persona).await?;
        }

        self.broker
            .publish_persona_task(PersonaGenerationTask {
                batch_id: persona_core::domain::ids::new_id(),
                owner_user_id,
                persona_ids: persona_ids.clone(),
                model,
            })
            .await?;

        Ok(persona_ids)
    }

    /// §4.1: validates ownership/readiness, creates the session and every
    /// `(product, persona)` result row, then publishes one task per cell.
    /// Idempotent within the cache window on a repeated `idempotency_key`.
    pub async fn start_feedback_session(
        &self,
        owner_user_id: UserId,
        request: StartFeedbackSessionRequest,
    ) -> Result<SessionId, CoreError> {
        if let Some(key) = &request.idempotency_key {
            if let Some(existing) = self.idempotency.get(key) {
                return Ok(existing);
            }
        }

        if request.product_ids.is_empty() || request.product_ids.len() > 5 {
            return Err(CoreError::Validation("productIds must have 1..=5 entries".into()));
        }
        if request.persona_ids.is_empty() || request.persona_ids.len() > 5 {
            return Err(CoreError::Validation("personaIds must have 1..=5 entries".into()));
        }
        if !is_whitelisted_language(&request.language) {
            return Err(CoreError::Validation(format!(
                "language \"{}\" is not on the supported ISO 639-1 whitelist",
                request.language
            )));
        }

        let mut products = Vec::with_capacity(request.product_ids.len());
        for id in &request.product_ids {
            let product = self
                .products
                .get(*id)
                .await?
                .ok_or_else(|| CoreError::ResourceNotFound(format!("product {id}")))?;
            if product.owner_user_id != owner_user_id || !product.is_usable() {
                return Err(CoreError::UnauthorizedAccess);
            }
            products.push(product);
        }

        let mut personas = Vec::with_capacity(request.persona_ids.len());
        for id in &request.persona_ids {
            let persona = self
                .personas
                .get(*id)
                .await?
                .ok_or_else(|| CoreError::ResourceNotFound(format!("persona {id}")))?;
            if persona.owner_user_id != owner_user_id {
                return Err(CoreError::UnauthorizedAccess);
            }
            if !persona.is_active() {
                return Err(CoreError::Validation(format!("persona {id} is not ACTIVE")));
            }
            personas.push(persona);
        }

        let session = FeedbackSession::new_pending(owner_user_id, request.language.clone());
        self.sessions.put(&session).await?;

        let model = request.model.unwrap_or_else(|| self.default_model.clone());
        for product in &products {
            for persona in &personas {
                let result = FeedbackResult::new_pending(session.id, product.id, persona.id);
                self.results.create_unique(&result).await?;
                self.broker
                    .publish_feedback_task(FeedbackGenerationTask {
                        result_id: result.id,
                        session_id: session.id,
                        owner_user_id,
                        product_id: product.id,
                        persona_id: persona.id,
                        language: request.language.clone(),
                        model: model.clone(),
                    })
                    .await?;
            }
        }

        if let Some(key) = request.idempotency_key {
            self.idempotency.put(key, session.id);
        }

        Ok(session.id)
    }
}
