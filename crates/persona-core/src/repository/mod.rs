//! Repository traits (§3/§9: "persistence engine choice is out of scope").
//!
//! Dispatch, worker, and query code depend only on these traits; `sled_store`
//! is the one concrete adapter this workspace ships: one `sled::Tree` per
//! collection, JSON-encoded values, hand-maintained secondary indexes.

mod sled_store;

pub use sled_store::SledStore;

use async_trait::async_trait;

use crate::domain::ids::{PersonaId, ProductId, ResultId, SessionId, UserId};
use crate::domain::{FeedbackResult, FeedbackSession, Persona, Product, User};
use crate::error::CoreError;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get(&self, id: UserId) -> Result<Option<User>, CoreError>;
    async fn put(&self, user: &User) -> Result<(), CoreError>;
    /// §6 registration/login: email is unique; this is the lookup the HTTP
    /// layer uses for the `EMAIL_ALREADY_EXISTS` / credential checks.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, CoreError>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn get(&self, id: ProductId) -> Result<Option<Product>, CoreError>;
    async fn put(&self, product: &Product) -> Result<(), CoreError>;
    /// All products owned by `owner`, soft-deleted ones included (callers filter).
    async fn list_by_owner(&self, owner: UserId) -> Result<Vec<Product>, CoreError>;
}

#[async_trait]
pub trait PersonaRepository: Send + Sync {
    async fn get(&self, id: PersonaId) -> Result<Option<Persona>, CoreError>;
    async fn put(&self, persona: &Persona) -> Result<(), CoreError>;
    async fn list_by_owner(&self, owner: UserId) -> Result<Vec<Persona>, CoreError>;
    /// Reuse-lookup index (§3 "characteristics hash"); no caller uses this yet (§9).
    async fn find_by_characteristics_hash(&self, hash: &str) -> Result<Vec<Persona>, CoreError>;
    /// §4.2 step 3 / I4: atomic compare-and-swap claim at the storage layer —
    /// `Persona::try_claim_generation`'s in-memory check re-verified against
    /// whatever is currently on disk, the same technique `create_unique` uses
    /// for the (session, product, persona) uniqueness constraint. `Ok(None)`
    /// means another worker already won the race; the caller moves on.
    async fn try_claim(&self, id: PersonaId, expected_version: u64) -> Result<Option<Persona>, CoreError>;
}

#[async_trait]
pub trait FeedbackSessionRepository: Send + Sync {
    async fn get(&self, id: SessionId) -> Result<Option<FeedbackSession>, CoreError>;
    async fn put(&self, session: &FeedbackSession) -> Result<(), CoreError>;
}

/// Aggregate counts for the termination detector (§4.6 step 2).
#[derive(Debug, Clone, Copy)]
pub struct ResultCounts {
    pub completed: u64,
    pub failed: u64,
    pub total: u64,
}

#[async_trait]
pub trait FeedbackResultRepository: Send + Sync {
    async fn get(&self, id: ResultId) -> Result<Option<FeedbackResult>, CoreError>;
    async fn put(&self, result: &FeedbackResult) -> Result<(), CoreError>;
    /// §3 unique constraint check at creation time: (session_id, product_id, persona_id).
    async fn create_unique(&self, result: &FeedbackResult) -> Result<(), CoreError>;
    async fn list_by_session(&self, session_id: SessionId) -> Result<Vec<FeedbackResult>, CoreError>;
    /// §4.7: a single page of a session's results, ordered by creation.
    async fn page_by_session(
        &self,
        session_id: SessionId,
        page_number: u32,
        page_size: u32,
    ) -> Result<(Vec<FeedbackResult>, u64), CoreError>;
    /// §4.6 step 2: one aggregated query, read under the termination lock.
    async fn counts_for_session(&self, session_id: SessionId) -> Result<ResultCounts, CoreError>;
}

/// §4.7 "transactionally consistent" read: the session row and every one of
/// its results, pinned to a single point in time. Split from the two
/// single-entity repositories above because satisfying this honestly needs
/// an adapter-specific primitive (a sled transaction spanning both trees) —
/// a relational adapter would satisfy it with one `SELECT ... FOR SHARE`
/// transaction instead, so this stays a repository-trait contract rather
/// than something the query service builds out of two separate calls.
#[async_trait]
pub trait FeedbackQueryRepository: Send + Sync {
    async fn get_session_with_page(
        &self,
        session_id: SessionId,
        page_number: u32,
        page_size: u32,
    ) -> Result<Option<(FeedbackSession, Vec<FeedbackResult>, u64)>, CoreError>;
}
