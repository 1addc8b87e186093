//! Stored plan variation and its metadata

use chrono::{DateTime, Utc};
use mealplan_core::{MealPlan, PlanRequest};
use serde::{Deserialize, Serialize};

/// One accepted plan stored under a cache key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variation {
    /// Schema version the plan was validated against
    pub version: u32,

    /// Key of the request this plan answers
    pub cache_key: String,

    /// Slot index within the key, `0..max_variations`
    pub slot: usize,

    /// The request, kept so cleanup can re-validate the plan
    pub request: PlanRequest,

    pub plan: MealPlan,

    pub metadata: VariationMetadata,
}

/// Metadata for variation management
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariationMetadata {
    /// When this variation was stored
    pub created_at: DateTime<Utc>,

    /// Wall-clock generation time of the plan (if known)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_seconds: Option<f64>,
}

impl Variation {
    /// Create a new variation stamped with the current time
    pub fn new(version: u32, cache_key: String, slot: usize, request: PlanRequest, plan: MealPlan) -> Self {
        let generation_seconds = plan.generation_time_seconds;
        Self {
            version,
            cache_key,
            slot,
            request,
            plan,
            metadata: VariationMetadata {
                created_at: Utc::now(),
                generation_seconds,
            },
        }
    }

    /// Get age in days since creation
    pub fn age_days(&self) -> i64 {
        (Utc::now() - self.metadata.created_at).num_days()
    }
}
