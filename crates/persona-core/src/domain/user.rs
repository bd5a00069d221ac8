//! User entity (§3). Identity/auth mechanics (registration, login, JWT) are the
//! out-of-scope external collaborator from §1/§6 — this crate only models the
//! principal as it's referenced for ownership checks (I3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::UserId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    /// Opaque 60-byte bcrypt-class credential (§3). Never logged, never serialized
    /// to an API response — the HTTP layer strips this field before encoding.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub active: bool,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn can_authenticate(&self) -> bool {
        self.active && !self.deleted
    }
}
