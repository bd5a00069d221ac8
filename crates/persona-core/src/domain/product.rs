//! Product entity (§3): an item under evaluation in a feedback session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::{ProductId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub owner_user_id: UserId,
    pub name: String,
    pub description: String,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub category: String,
    pub key_features: Vec<String>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_usable(&self) -> bool {
        !self.deleted
    }
}
