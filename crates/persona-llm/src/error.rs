//! Gateway-local error type, convertible into the core error taxonomy (§7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    /// 429/502/503/504, a connection failure, or retry exhaustion (§4.3).
    #[error("transient LLM error: {0}")]
    Transient(String),
    /// Any other HTTP status, or a schema violation (`INVALID_AI_RESPONSE`, §4.5).
    #[error("permanent LLM error: {0}")]
    Permanent(String),
}

impl LlmError {
    pub fn retriable(&self) -> bool {
        matches!(self, LlmError::Transient(_))
    }
}

impl From<LlmError> for persona_core::CoreError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Transient(msg) => persona_core::CoreError::AiServiceTransient(msg),
            LlmError::Permanent(msg) => persona_core::CoreError::AiServicePermanent(msg),
        }
    }
}
