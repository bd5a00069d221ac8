//! `LlmGateway` ties together the provider, retry policy, prompt builder,
//! and response validator behind the three operations the rest of the
//! workspace actually calls (§4.3-§4.5). Nothing upstream of this module
//! should need to know what a `ChatRequest` or a sampling table even is.

use std::sync::Arc;
use std::time::Duration;

use crate::error::LlmError;
use crate::prompt::{
    build_aggregation_prompt, build_feedback_prompt, build_persona_batch_prompt,
    is_whitelisted_language, FeedbackPromptInput, PersonaBatchPromptInput,
};
use crate::provider::{ChatRequest, LlmProvider};
use crate::retry::{call_with_retry, RetryPolicy};
use crate::sampling::Operation;
use crate::validator::{validate_aggregation, validate_feedback, validate_persona_batch, FeedbackDraft, PersonaDraft, ThemeDraft};

pub struct LlmGateway {
    provider: Arc<dyn LlmProvider>,
    retry_policy: RetryPolicy,
    default_model: String,
}

impl LlmGateway {
    pub fn new(provider: Arc<dyn LlmProvider>, retry_policy: RetryPolicy, default_model: String) -> Self {
        Self {
            provider,
            retry_policy,
            default_model,
        }
    }

    pub fn with_default_policy(provider: Arc<dyn LlmProvider>, default_model: String) -> Self {
        Self::new(provider, RetryPolicy::default(), default_model)
    }

    fn model(&self, override_model: Option<&str>) -> String {
        override_model.unwrap_or(&self.default_model).to_string()
    }

    pub async fn generate_persona_batch(
        &self,
        input: &PersonaBatchPromptInput<'_>,
        model: Option<&str>,
    ) -> Result<Vec<PersonaDraft>, LlmError> {
        let (system, user) = build_persona_batch_prompt(input);
        let request = ChatRequest::new(self.model(model), system, user, Operation::PersonaBatch.sampling());
        let raw = call_with_retry(self.provider.as_ref(), request, self.retry_policy).await?;
        validate_persona_batch(&raw, input.count)
    }

    pub async fn generate_feedback(
        &self,
        input: &FeedbackPromptInput<'_>,
        model: Option<&str>,
    ) -> Result<FeedbackDraft, LlmError> {
        if !is_whitelisted_language(input.language) {
            return Err(LlmError::Permanent(format!(
                "language code \"{}\" is not on the supported whitelist",
                input.language
            )));
        }
        let (system, user) = build_feedback_prompt(input);
        let request = ChatRequest::new(self.model(model), system, user, Operation::Feedback.sampling());
        let raw = call_with_retry(self.provider.as_ref(), request, self.retry_policy).await?;
        validate_feedback(&raw)
    }

    pub async fn aggregate_session_insights(
        &self,
        key_concerns: &[String],
        model: Option<&str>,
    ) -> Result<Vec<ThemeDraft>, LlmError> {
        let (system, user) = build_aggregation_prompt(key_concerns);
        let request = ChatRequest::new(self.model(model), system, user, Operation::ThemeAggregation.sampling());
        let raw = call_with_retry(self.provider.as_ref(), request, self.retry_policy).await?;
        validate_aggregation(&raw)
    }
}

/// Convenience constructor matching the provider/timeout wiring `main.rs` does.
pub fn default_retry_policy() -> RetryPolicy {
    RetryPolicy {
        base_delay: Duration::from_secs(1),
        max_attempts: 3,
        wall_clock_cap: Duration::from_secs(30),
    }
}
