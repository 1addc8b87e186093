//! Cache key derivation using SHA256 hashing

use mealplan_core::{CURRENT_SCHEMA_VERSION, CuisinePreference, PlanRequest};
use serde_json::json;
use sha2::{Digest, Sha256};

/// Derives deterministic cache keys from plan requests
#[derive(Debug, Clone)]
pub struct CacheKeyGenerator {
    version: u32,
}

impl CacheKeyGenerator {
    /// Create a new key generator with the current schema version
    pub fn new() -> Self {
        Self {
            version: CURRENT_SCHEMA_VERSION,
        }
    }

    /// Create a key generator with a custom schema version
    pub fn with_version(version: u32) -> Self {
        Self { version }
    }

    /// Canonical serialization of a request.
    ///
    /// Object keys are emitted sorted. Health conditions and cuisine
    /// preferences are trimmed, deduplicated and sorted, so their order
    /// never affects identity. Weighted cuisines are normalized through
    /// their parsed form (`Mexican:30.0` and `Mexican:30` are the same).
    pub fn canonical_form(&self, request: &PlanRequest) -> String {
        let cuisines: Vec<String> = request
            .cuisine_preferences
            .iter()
            .map(|raw| CuisinePreference::parse(raw).to_string())
            .collect();

        // Literal keys stay alphabetical so the output is identical whether or
        // not serde_json preserves insertion order.
        json!({
            "cuisine_preferences": sorted_labels(&cuisines),
            "daily_calories": request.daily_calories,
            "health_conditions": sorted_labels(&request.health_conditions),
            "include_cheat_meal": request.include_cheat_meal,
            "number_of_days": request.number_of_days,
            "version": self.version,
        })
        .to_string()
    }

    /// Generate the 64 hex character key for a request
    pub fn generate_key(&self, request: &PlanRequest) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_form(request).as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Get the schema version mixed into every key
    pub fn version(&self) -> u32 {
        self.version
    }
}

impl Default for CacheKeyGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn sorted_labels(labels: &[String]) -> Vec<String> {
    let mut labels: Vec<String> = labels
        .iter()
        .map(|label| label.trim().to_string())
        .filter(|label| !label.is_empty())
        .collect();
    labels.sort();
    labels.dedup();
    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> PlanRequest {
        PlanRequest::new(3, 2000)
            .with_health_conditions(["diabetes", "hypertension"])
            .with_cuisines(["Italian", "Mexican:30"])
    }

    #[test]
    fn test_key_generation_deterministic() {
        let keygen = CacheKeyGenerator::new();

        let key1 = keygen.generate_key(&request());
        let key2 = keygen.generate_key(&request());

        assert_eq!(key1, key2, "Same inputs should produce same key");
    }

    #[test]
    fn test_label_order_is_insignificant() {
        let keygen = CacheKeyGenerator::new();
        let reordered = PlanRequest::new(3, 2000)
            .with_health_conditions(["hypertension", " diabetes"])
            .with_cuisines(["Mexican:30.0", "Italian", "Italian"]);

        assert_eq!(keygen.generate_key(&request()), keygen.generate_key(&reordered));
    }

    #[test]
    fn test_every_field_changes_the_key() {
        let keygen = CacheKeyGenerator::new();
        let base = keygen.generate_key(&request());

        let variants = vec![
            PlanRequest { number_of_days: 4, ..request() },
            PlanRequest { daily_calories: 2100, ..request() },
            request().with_health_conditions(["diabetes"]),
            request().with_cuisines(["Italian", "Mexican:40"]),
            request().with_cheat_meal(true),
        ];

        for variant in variants {
            assert_ne!(base, keygen.generate_key(&variant), "{:?} should change the key", variant);
        }
    }

    #[test]
    fn test_key_generation_different_versions() {
        let keygen1 = CacheKeyGenerator::with_version(1);
        let keygen2 = CacheKeyGenerator::with_version(2);

        assert_ne!(
            keygen1.generate_key(&request()),
            keygen2.generate_key(&request()),
            "Different versions should produce different keys"
        );
    }

    #[test]
    fn test_canonical_form_sorts_keys() {
        let keygen = CacheKeyGenerator::with_version(7);
        let canonical = keygen.canonical_form(&PlanRequest::new(1, 1500).with_cuisines(["Thai", "Greek"]));

        assert_eq!(
            canonical,
            r#"{"cuisine_preferences":["Greek","Thai"],"daily_calories":1500,"health_conditions":[],"include_cheat_meal":false,"number_of_days":1,"version":7}"#
        );
    }

    #[test]
    fn test_key_is_64_chars() {
        let keygen = CacheKeyGenerator::new();
        let key = keygen.generate_key(&request());

        assert_eq!(key.len(), 64, "SHA256 hash should be 64 hex characters");
    }
}
