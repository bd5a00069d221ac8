//! Error taxonomy (§7): one enum, orthogonal `kind` and `retriable` axes.
//!
//! The retriable bit lives on the type instead of a side channel (§9 Design
//! Notes — "Exception-driven validation"), so a worker can match on
//! `CoreError::retriable()` instead of string-sniffing a message.

use thiserror::Error;

/// User-facing classification for the HTTP error body (§6) and worker ack policy (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    UnauthorizedAccess,
    ResourceNotFound,
    AiServiceTransient,
    AiServicePermanent,
    Internal,
}

impl ErrorKind {
    /// HTTP-ish status code used by the representative API (§6) for synchronous errors.
    /// AI_SERVICE_* kinds never reach the synchronous path (§7) so they have no status here.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::UnauthorizedAccess => 403,
            ErrorKind::ResourceNotFound => 404,
            ErrorKind::AiServiceTransient | ErrorKind::AiServicePermanent => 500,
            ErrorKind::Internal => 500,
        }
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("unauthorized access")]
    UnauthorizedAccess,

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    /// §7 AI_SERVICE_TRANSIENT — 429/502/503/504 from the LLM, or lock-acquisition timeout (§4.6).
    #[error("transient AI service error: {0}")]
    AiServiceTransient(String),

    /// §7 AI_SERVICE_PERMANENT — other 4xx, or schema violation (`INVALID_AI_RESPONSE`).
    #[error("permanent AI service error: {0}")]
    AiServicePermanent(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::UnauthorizedAccess => ErrorKind::UnauthorizedAccess,
            CoreError::ResourceNotFound(_) => ErrorKind::ResourceNotFound,
            CoreError::AiServiceTransient(_) => ErrorKind::AiServiceTransient,
            CoreError::AiServicePermanent(_) => ErrorKind::AiServicePermanent,
            CoreError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// §7: retriables are nacked-with-requeue, permanents mark the entity FAILED.
    pub fn retriable(&self) -> bool {
        matches!(self.kind(), ErrorKind::AiServiceTransient)
    }

    /// Machine-readable code for the `{error_code, message}` shape (§6).
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "VALIDATION",
            CoreError::UnauthorizedAccess => "UNAUTHORIZED_ACCESS",
            CoreError::ResourceNotFound(_) => "RESOURCE_NOT_FOUND",
            CoreError::AiServiceTransient(_) => "AI_SERVICE_TRANSIENT",
            CoreError::AiServicePermanent(_) => "AI_SERVICE_PERMANENT",
            CoreError::Internal(_) => "INTERNAL",
        }
    }
}

impl From<sled::Error> for CoreError {
    fn from(e: sled::Error) -> Self {
        CoreError::Internal(format!("sled: {e}"))
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Internal(format!("serde_json: {e}"))
    }
}
