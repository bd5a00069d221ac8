//! Query service (§4.7): ownership-checked, paginated reads over a
//! FeedbackSession and its results.
//!
//! "Transactionally consistent" means the session row and its results page
//! come back from a single `FeedbackQueryRepository::get_session_with_page`
//! call, backed by one `sled` transaction spanning the sessions and results
//! trees — a `TerminationDetector` finalize landing between what would
//! otherwise be two separate reads can't be observed half-applied.

use std::sync::Arc;

use crate::domain::ids::{SessionId, UserId};
use crate::domain::{FeedbackResult, FeedbackSession};
use crate::error::CoreError;
use crate::repository::FeedbackQueryRepository;

#[derive(Debug, Clone)]
pub struct PageInfo {
    pub page_number: u32,
    pub page_size: u32,
    pub total_results: u64,
}

#[derive(Debug, Clone)]
pub struct SessionView {
    pub session: FeedbackSession,
    pub results: Vec<FeedbackResult>,
    pub page: PageInfo,
}

pub struct QueryService {
    store: Arc<dyn FeedbackQueryRepository>,
}

impl QueryService {
    pub fn new(store: Arc<dyn FeedbackQueryRepository>) -> Self {
        Self { store }
    }

    /// §4.7 `GetFeedbackSession`: 404 if missing, 403 if the requester isn't
    /// the owner (I3), otherwise a single page of results alongside the
    /// session's current status and any aggregated insights — all read
    /// atomically via `get_session_with_page`, so ownership is checked
    /// against the same snapshot the results page came from.
    pub async fn get_feedback_session(
        &self,
        requester: UserId,
        session_id: SessionId,
        page_number: u32,
        page_size: u32,
    ) -> Result<SessionView, CoreError> {
        let (session, results, total_results) = self
            .store
            .get_session_with_page(session_id, page_number, page_size)
            .await?
            .ok_or_else(|| CoreError::ResourceNotFound(format!("feedback session {session_id}")))?;

        if session.owner_user_id != requester {
            return Err(CoreError::UnauthorizedAccess);
        }

        Ok(SessionView {
            session,
            results,
            page: PageInfo {
                page_number,
                page_size,
                total_results,
            },
        })
    }
}
