//! Route handlers (§6): request/response DTOs plus the thin glue between
//! axum extractors and the dispatch/query services.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use persona_core::domain::characteristics::{ActivitySphere, Gender, IncomeLevel};
use persona_core::domain::feedback_result::FeedbackResult;
use persona_core::domain::feedback_session::{AggregatedInsights, SessionStatus};
use persona_core::repository::{ProductRepository as _, UserRepository as _};
use persona_core::{Product, User};

use crate::auth::{hash_password, issue_access_token, verify_password, AuthenticatedUser};
use crate::dispatch::{StartFeedbackSessionRequest, StartPersonaGenerationRequest};
use crate::http::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub access_token: String,
    pub token_type: &'static str,
}

fn is_plausible_email(email: &str) -> bool {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

/// §6 `POST /auth/register`: password length ∈ [8,128], RFC-5322-ish email,
/// duplicate email -> 400 `EMAIL_ALREADY_EXISTS`.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    if !is_plausible_email(&req.email) {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION", "email is not well-formed"));
    }
    if !(8..=128).contains(&req.password.len()) {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION",
            "password must be between 8 and 128 characters",
        ));
    }

    if state.users.find_by_email(&req.email).await?.is_some() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "EMAIL_ALREADY_EXISTS", "email is already registered"));
    }

    let password_hash = hash_password(&req.password)?;
    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        email: req.email,
        password_hash,
        active: true,
        deleted: false,
        created_at: now,
        updated_at: now,
    };
    state.users.put(&user).await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user_id: user.id,
            access_token: issue_access_token(user.id),
            token_type: "Bearer",
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// §6 `POST /auth/login`: invalid credentials or inactive/soft-deleted user
/// -> 400 `INVALID_CREDENTIALS` / `USER_INACTIVE`.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let user = state
        .users
        .find_by_email(&req.email)
        .await?
        .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "INVALID_CREDENTIALS", "invalid email or password"))?;

    if !verify_password(&req.password, &user.password_hash) {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "INVALID_CREDENTIALS", "invalid email or password"));
    }
    if !user.can_authenticate() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "USER_INACTIVE", "this account is inactive"));
    }

    Ok(Json(AuthResponse {
        user_id: user.id,
        access_token: issue_access_token(user.id),
        token_type: "Bearer",
    }))
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: String,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub category: String,
    pub key_features: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub category: String,
    pub key_features: Vec<String>,
}

impl From<Product> for ProductResponse {
    fn from(p: Product) -> Self {
        Self {
            id: p.id,
            name: p.name,
            description: p.description,
            price: p.price,
            currency: p.currency,
            category: p.category,
            key_features: p.key_features,
        }
    }
}

/// §3 Product entity: an item under evaluation, owned by the creating user.
/// Not in §6's representative route list, but `StartFeedbackSession`
/// requires products the caller already owns (§4.1), so a create path is the
/// minimal supplement needed to exercise the system end to end.
pub async fn create_product(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION", "name must not be empty"));
    }
    if req.category.trim().is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION", "category must not be empty"));
    }

    let now = Utc::now();
    let product = Product {
        id: Uuid::new_v4(),
        owner_user_id: user.user_id,
        name: req.name,
        description: req.description,
        price: req.price,
        currency: req.currency,
        category: req.category,
        key_features: req.key_features,
        deleted: false,
        created_at: now,
        updated_at: now,
    };
    state.products.put(&product).await?;

    Ok((StatusCode::CREATED, Json(product.into())))
}

/// Ownership-scoped listing (I3); soft-deleted products are filtered out.
pub async fn list_products(
    user: AuthenticatedUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let products = state.products.list_by_owner(user.user_id).await?;
    Ok(Json(
        products
            .into_iter()
            .filter(Product::is_usable)
            .map(ProductResponse::from)
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct CreatePersonaBatchRequest {
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

#[derive(Debug, Serialize)]
pub struct JobAcceptedResponse {
    pub job_id: Uuid,
    pub status: &'static str,
    pub persona_ids: Vec<Uuid>,
}

/// §6 `POST /personas` -> 202 `{jobId, status:"GENERATING"}`. `jobId` is the
/// first persona created in the batch; every id in the batch is also
/// returned since the representative interface doesn't otherwise name a way
/// to look up the rest (§1 "exact transport is out of scope").
pub async fn create_persona_batch(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Json(req): Json<CreatePersonaBatchRequest>,
) -> Result<(StatusCode, Json<JobAcceptedResponse>), ApiError> {
    let persona_ids = state
        .dispatch
        .start_persona_generation(
            user.user_id,
            StartPersonaGenerationRequest {
                gender: req.gender,
                country: req.country,
                city: req.city,
                min_age: req.min_age,
                max_age: req.max_age,
                activity_sphere: req.activity_sphere,
                profession: req.profession,
                income_level: req.income_level,
                interests: req.interests,
                additional_params: req.additional_params,
                count: req.count,
                model: req.model,
            },
        )
        .await?;

    let job_id = *persona_ids.first().unwrap_or(&Uuid::nil());
    Ok((
        StatusCode::ACCEPTED,
        Json(JobAcceptedResponse {
            job_id,
            status: "GENERATING",
            persona_ids,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct CreateFeedbackSessionRequest {
    pub product_ids: Vec<Uuid>,
    pub persona_ids: Vec<Uuid>,
    pub language: String,
    pub model: Option<String>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionAcceptedResponse {
    pub job_id: Uuid,
    pub status: &'static str,
}

/// §6 `POST /feedback-sessions` -> 202 `{jobId, status:"PENDING"}`.
pub async fn create_feedback_session(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Json(req): Json<CreateFeedbackSessionRequest>,
) -> Result<(StatusCode, Json<SessionAcceptedResponse>), ApiError> {
    let session_id = state
        .dispatch
        .start_feedback_session(
            user.user_id,
            StartFeedbackSessionRequest {
                product_ids: req.product_ids,
                persona_ids: req.persona_ids,
                language: req.language,
                model: req.model,
                idempotency_key: req.idempotency_key,
            },
        )
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SessionAcceptedResponse {
            job_id: session_id,
            status: "PENDING",
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub size: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct PaginationFooter {
    pub page_number: u32,
    pub page_size: u32,
    pub total_count: u64,
}

#[derive(Debug, Serialize)]
pub struct FeedbackSessionResponse {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub aggregated_insights: Option<AggregatedInsights>,
    pub feedback_results: Vec<FeedbackResult>,
    pub pagination: Option<PaginationFooter>,
}

const DEFAULT_PAGE_SIZE: u32 = 20;

/// §4.7 `GetFeedbackSession`: ownership-checked, transactionally consistent
/// read of the session row plus a page of its results. Pagination is applied
/// whenever `page`/`size` are present; omitted entirely returns every result
/// in one page-sized sweep (§4.7 "if pagination omitted, returns all
/// results").
pub async fn get_feedback_session(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Query(params): Query<PageParams>,
) -> Result<Json<FeedbackSessionResponse>, ApiError> {
    let paginated = params.page.is_some() || params.size.is_some();
    let page_number = params.page.unwrap_or(0);
    let page_size = params.size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 200);

    let view = state
        .query
        .get_feedback_session(user.user_id, session_id, page_number, page_size)
        .await?;

    Ok(Json(FeedbackSessionResponse {
        session_id: view.session.id,
        status: view.session.status,
        aggregated_insights: view.session.aggregated_insights,
        feedback_results: view.results,
        pagination: paginated.then_some(PaginationFooter {
            page_number: view.page.page_number,
            page_size: view.page.page_size,
            total_count: view.page.total_results,
        }),
    }))
}
