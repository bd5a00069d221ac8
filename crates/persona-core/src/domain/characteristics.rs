//! The persona characteristics bundle (§3) and its deterministic reuse hash.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IncomeLevel {
    Low,
    Medium,
    High,
}

/// Activity sphere enum (§3). Closed set of broad life domains a persona's
/// profession/interests are drawn from; used by the prompt builder's
/// "professions from differing sectors" diversity directive (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivitySphere {
    Technology,
    Healthcare,
    Education,
    Finance,
    Retail,
    Manufacturing,
    Hospitality,
    Creative,
    PublicSector,
    Agriculture,
}

impl ActivitySphere {
    pub const ALL: [ActivitySphere; 10] = [
        ActivitySphere::Technology,
        ActivitySphere::Healthcare,
        ActivitySphere::Education,
        ActivitySphere::Finance,
        ActivitySphere::Retail,
        ActivitySphere::Manufacturing,
        ActivitySphere::Hospitality,
        ActivitySphere::Creative,
        ActivitySphere::PublicSector,
        ActivitySphere::Agriculture,
    ];
}

/// Persona characteristics bundle (§3). `age` is the single chosen age within
/// `[min_age, max_age]`; `min_age`/`max_age` are retained on the entity so the
/// prompt builder can recompute the target-age distribution for a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Characteristics {
    pub country: String,
    pub city: String,
    pub gender: Gender,
    pub min_age: u8,
    pub max_age: u8,
    pub age: u8,
    pub activity_sphere: ActivitySphere,
    pub profession: String,
    pub income_level: IncomeLevel,
    pub interests: Vec<String>,
    pub additional_params: Option<String>,
}

impl Characteristics {
    /// Deterministic digest over the input attributes that define a generation
    /// request (everything except the chosen `age`, which varies per persona
    /// within a batch sharing the same request). Used for the reuse-lookup
    /// index (§3); no query path consumes it yet (§9 Open Questions).
    pub fn request_hash(
        country: &str,
        city: &str,
        gender: Gender,
        min_age: u8,
        max_age: u8,
        activity_sphere: ActivitySphere,
        profession: &str,
        income_level: IncomeLevel,
        interests: &[String],
        additional_params: Option<&str>,
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(country.trim().to_lowercase().as_bytes());
        hasher.update(b"|");
        hasher.update(city.trim().to_lowercase().as_bytes());
        hasher.update(b"|");
        hasher.update(format!("{gender:?}").as_bytes());
        hasher.update(b"|");
        hasher.update(format!("{min_age}-{max_age}").as_bytes());
        hasher.update(b"|");
        hasher.update(format!("{activity_sphere:?}").as_bytes());
        hasher.update(b"|");
        hasher.update(profession.trim().to_lowercase().as_bytes());
        hasher.update(b"|");
        hasher.update(format!("{income_level:?}").as_bytes());
        hasher.update(b"|");
        let mut sorted_interests: Vec<String> =
            interests.iter().map(|i| i.trim().to_lowercase()).collect();
        sorted_interests.sort();
        hasher.update(sorted_interests.join(",").as_bytes());
        hasher.update(b"|");
        hasher.update(additional_params.unwrap_or("").trim().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn hash(&self) -> String {
        Self::request_hash(
            &self.country,
            &self.city,
            self.gender,
            self.min_age,
            self.max_age,
            self.activity_sphere,
            &self.profession,
            self.income_level,
            &self.interests,
            self.additional_params.as_deref(),
        )
    }
}
