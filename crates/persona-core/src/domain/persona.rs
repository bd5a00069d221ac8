//! Persona entity and state machine (§3 lifecycles, invariant I4).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::characteristics::Characteristics;
use crate::domain::ids::{PersonaId, UserId};
use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PersonaStatus {
    Generating,
    Active,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub id: PersonaId,
    pub owner_user_id: UserId,
    pub status: PersonaStatus,
    pub name: Option<String>,
    pub detailed_description: Option<String>,
    pub product_attitudes: Option<String>,
    pub characteristics: Characteristics,
    pub characteristics_hash: String,
    pub model: String,
    /// Optimistic-lock version (§3). Bumped on every successful write.
    pub version: u64,
    /// CAS guard (§3, I4): exactly one worker may hold this at a time.
    pub generation_in_progress: bool,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Persona {
    pub fn new_generating(
        owner_user_id: UserId,
        characteristics: Characteristics,
        model: String,
    ) -> Self {
        let now = Utc::now();
        let hash = characteristics.hash();
        Self {
            id: crate::domain::ids::new_id(),
            owner_user_id,
            status: PersonaStatus::Generating,
            name: None,
            detailed_description: None,
            product_attitudes: None,
            characteristics,
            characteristics_hash: hash,
            model,
            version: 0,
            generation_in_progress: false,
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// §4.2 step 3: CAS on `generation_in_progress` guarded by `version`.
    /// Losing the CAS means another worker already claimed this persona.
    pub fn try_claim_generation(&mut self, expected_version: u64) -> Result<(), CoreError> {
        if self.status != PersonaStatus::Generating {
            return Err(CoreError::Internal(
                "try_claim_generation called on a non-GENERATING persona".into(),
            ));
        }
        if self.version != expected_version || self.generation_in_progress {
            return Err(CoreError::AiServicePermanent(
                "generation already claimed by another worker".into(),
            ));
        }
        self.generation_in_progress = true;
        self.version += 1;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// I4: a Persona never leaves GENERATING except through the single winning writer.
    pub fn complete(
        &mut self,
        name: String,
        detailed_description: String,
        product_attitudes: Option<String>,
    ) -> Result<(), CoreError> {
        if self.status != PersonaStatus::Generating {
            return Err(CoreError::Internal(
                "complete() called on a persona that already left GENERATING".into(),
            ));
        }
        self.status = PersonaStatus::Active;
        self.name = Some(name);
        self.detailed_description = Some(detailed_description);
        self.product_attitudes = product_attitudes;
        self.generation_in_progress = false;
        self.version += 1;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Releases a claim taken by `try_claim_generation` without leaving
    /// GENERATING, so a retriable failure can be requeued and reclaimed
    /// instead of wedging the persona behind a CAS guard no one will ever
    /// clear (§4.2 step 6).
    pub fn release_claim(&mut self) {
        self.generation_in_progress = false;
        self.version += 1;
        self.updated_at = Utc::now();
    }

    pub fn fail(&mut self) -> Result<(), CoreError> {
        if self.status != PersonaStatus::Generating {
            return Err(CoreError::Internal(
                "fail() called on a persona that already left GENERATING".into(),
            ));
        }
        self.status = PersonaStatus::Failed;
        self.generation_in_progress = false;
        self.version += 1;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.status == PersonaStatus::Active && !self.deleted
    }
}
