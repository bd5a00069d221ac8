//! HTTP surface (§6): axum router, `{error_code, message}` error shape, and
//! the application state shared by every handler.

pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use persona_core::repository::SledStore;
use persona_core::{CoreError, FeedbackResultRepository, FeedbackSessionRepository, PersonaRepository, ProductRepository, UserRepository};
use persona_core::broker::MessageBroker;
use persona_core::idempotency::IdempotencyCache;
use persona_core::query::QueryService;

use crate::dispatch::DispatchService;

/// Everything a handler needs, cloned cheaply behind `Arc`s.
#[derive(Clone)]
pub struct AppState {
    pub dispatch: Arc<DispatchService>,
    pub query: Arc<QueryService>,
    pub users: Arc<dyn UserRepository>,
    pub products: Arc<dyn ProductRepository>,
}

pub fn build_state(
    store: Arc<SledStore>,
    broker: Arc<dyn MessageBroker>,
    default_model: String,
    idempotency_window: Duration,
) -> AppState {
    let dispatch = Arc::new(DispatchService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        broker,
        IdempotencyCache::new(idempotency_window),
        default_model,
    ));
    let query = Arc::new(QueryService::new(store.clone()));
    AppState {
        dispatch,
        query,
        users: store.clone(),
        products: store,
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/products", post(handlers::create_product).get(handlers::list_products))
        .route("/personas", post(handlers::create_persona_batch))
        .route("/feedback-sessions", post(handlers::create_feedback_session))
        .route("/feedback-sessions/:id", get(handlers::get_feedback_session))
        .route("/health", get(|| async { "OK" }))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// §6 "Exit / error shape": `{error_code, message}`.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error_code: String,
    pub message: String,
    #[serde(skip)]
    pub status: u16,
}

impl ApiError {
    pub fn new(status: StatusCode, error_code: &str, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.to_string(),
            message: message.into(),
            status: status.as_u16(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", message)
    }

    pub fn unauthenticated() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", "missing or malformed bearer token")
    }

    pub fn into_response_parts(self) -> (StatusCode, Json<ApiError>) {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.into_response_parts().into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        let status = StatusCode::from_u16(e.kind().status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, e.error_code(), e.to_string())
    }
}
