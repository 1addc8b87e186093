//! Cache purge and maintenance

use mealplan_core::{PlanValidator, ValidationResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::entry::Variation;
use crate::error::StorageError;
use crate::storage::{TEMP_EXTENSION, slot_index};

/// Cleanup statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupStats {
    /// Number of slot files examined
    pub scanned_count: usize,
    /// Number of files removed
    pub removed_count: usize,
    /// Bytes freed
    pub freed_bytes: u64,
}

/// Cleanup policy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanupPolicy {
    /// Remove variations written under another schema version
    pub remove_version_mismatch: bool,

    /// Maximum age in days before a variation is dropped (unbounded when `None`)
    pub max_age_days: Option<i64>,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self {
            remove_version_mismatch: true,
            max_age_days: None,
        }
    }
}

/// Why a stored file is removed
#[derive(Debug, Clone, PartialEq)]
enum Verdict {
    Keep,
    Remove(String),
}

/// Cache cleanup manager
pub struct CleanupManager {
    cache_dir: PathBuf,
    policy: CleanupPolicy,
    version: u32,
}

impl CleanupManager {
    pub fn new<P: AsRef<Path>>(cache_dir: P, policy: CleanupPolicy, version: u32) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
            policy,
            version,
        }
    }

    /// Remove unreadable, stale and structurally invalid variations.
    ///
    /// Calorie tolerance is not re-checked. Leftover temp files and empty
    /// directories are removed as well. Running it twice removes nothing
    /// the second time.
    pub fn purge(&self, validator: &PlanValidator) -> Result<CleanupStats, StorageError> {
        let mut stats = CleanupStats::default();

        if !self.cache_dir.exists() {
            return Ok(stats);
        }

        let files: Vec<PathBuf> = walkdir::WalkDir::new(&self.cache_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .collect();

        for path in files {
            let verdict = if path.extension().is_some_and(|ext| ext == TEMP_EXTENSION) {
                Verdict::Remove("leftover temp file".to_string())
            } else if let Some(slot) = slot_index(&path) {
                stats.scanned_count += 1;
                self.inspect(&path, slot, validator)
            } else {
                Verdict::Keep
            };

            if let Verdict::Remove(reason) = verdict {
                let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                fs::remove_file(&path).map_err(StorageError::io(&path))?;
                log::info!("Purged {}: {}", path.display(), reason);
                stats.removed_count += 1;
                stats.freed_bytes += size;
            }
        }

        self.remove_empty_dirs();

        log::info!(
            "Purge complete: {} of {} variations removed, {} bytes freed",
            stats.removed_count,
            stats.scanned_count,
            stats.freed_bytes
        );

        Ok(stats)
    }

    fn inspect(&self, path: &Path, slot: usize, validator: &PlanValidator) -> Verdict {
        let raw: Value = match fs::read_to_string(path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
        {
            Some(raw) => raw,
            None => return Verdict::Remove("unreadable".to_string()),
        };

        let variation: Variation = match serde_json::from_value(raw.clone()) {
            Ok(variation) => variation,
            Err(e) => return Verdict::Remove(format!("unparseable variation: {}", e)),
        };

        if self.policy.remove_version_mismatch && variation.version != self.version {
            return Verdict::Remove(format!(
                "schema version {} (current {})",
                variation.version, self.version
            ));
        }

        let dir_key = path
            .parent()
            .and_then(|dir| dir.file_name())
            .and_then(|name| name.to_str());
        if dir_key != Some(variation.cache_key.as_str()) || variation.slot != slot {
            return Verdict::Remove("misplaced variation".to_string());
        }

        if let Some(max_age) = self.policy.max_age_days {
            if variation.age_days() > max_age {
                return Verdict::Remove(format!("older than {} days", max_age));
            }
        }

        match validator.validate_structure(&raw["plan"], Some(variation.request.number_of_days)) {
            ValidationResult::Valid => Verdict::Keep,
            invalid => Verdict::Remove(invalid.to_string()),
        }
    }

    fn remove_empty_dirs(&self) {
        for entry in walkdir::WalkDir::new(&self.cache_dir)
            .min_depth(1)
            .contents_first(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if entry.file_type().is_dir() {
                // Fails harmlessly on non-empty directories.
                let _ = fs::remove_dir(entry.path());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::CacheKeyGenerator;
    use crate::random::SeededRandom;
    use crate::storage::{StoreConfig, VariationStore};
    use crate::testing::sample_plan;
    use chrono::{Duration, Utc};
    use mealplan_core::{PlanRequest, PlanSchema};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        _temp_dir: TempDir,
        store: VariationStore,
        key: String,
        request: PlanRequest,
    }

    impl Fixture {
        fn new() -> Self {
            let temp_dir = TempDir::new().unwrap();
            let store = VariationStore::new(
                temp_dir.path(),
                StoreConfig {
                    fresh_probability: 0.0,
                    ..StoreConfig::default()
                },
                2,
                Arc::new(SeededRandom::with_seed(5)),
            )
            .unwrap();
            let request = PlanRequest::new(2, 2000);
            let key = CacheKeyGenerator::with_version(2).generate_key(&request);
            Self {
                _temp_dir: temp_dir,
                store,
                key,
                request,
            }
        }

        fn slot_file(&self, slot: usize) -> PathBuf {
            self.store
                .cache_dir()
                .join(&self.key[..2])
                .join(&self.key)
                .join(format!("{}.json", slot))
        }

        fn rewrite(&self, slot: usize, edit: impl FnOnce(&mut Value)) {
            let path = self.slot_file(slot);
            let mut value: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
            edit(&mut value);
            fs::write(&path, serde_json::to_string(&value).unwrap()).unwrap();
        }
    }

    #[test]
    fn test_valid_variations_survive() {
        let fx = Fixture::new();
        fx.store.put(&fx.key, &fx.request, &sample_plan(2, 2000)).unwrap();
        fx.store.put(&fx.key, &fx.request, &sample_plan(2, 2000)).unwrap();

        let stats = fx.store.purge_invalid(&PlanValidator::default()).unwrap();

        assert_eq!(stats.scanned_count, 2);
        assert_eq!(stats.removed_count, 0);
        assert_eq!(fx.store.variations(&fx.key).len(), 2);
    }

    #[test]
    fn test_calorie_drift_is_not_purged() {
        let fx = Fixture::new();
        fx.store.put(&fx.key, &fx.request, &sample_plan(2, 2600)).unwrap();

        let stats = fx.store.purge_invalid(&PlanValidator::default()).unwrap();
        assert_eq!(stats.removed_count, 0);
    }

    #[test]
    fn test_removes_unreadable_and_invalid() {
        let fx = Fixture::new();
        for _ in 0..3 {
            fx.store.put(&fx.key, &fx.request, &sample_plan(2, 2000)).unwrap();
        }
        fs::write(fx.slot_file(0), "garbage").unwrap();
        fx.rewrite(1, |value| {
            value["plan"]["meal_plan"].as_array_mut().unwrap().pop();
        });

        let stats = fx.store.purge_invalid(&PlanValidator::default()).unwrap();

        assert_eq!(stats.removed_count, 2);
        assert!(stats.freed_bytes > 0);
        let remaining: Vec<usize> = fx.store.variations(&fx.key).iter().map(|v| v.slot).collect();
        assert_eq!(remaining, vec![2]);
    }

    #[test]
    fn test_removes_missing_recipe_details_under_current_schema() {
        let fx = Fixture::new();
        fx.store.put(&fx.key, &fx.request, &sample_plan(2, 2000)).unwrap();
        fx.rewrite(0, |value| {
            value["plan"]["meal_plan"][0]["meals"][0]
                .as_object_mut()
                .unwrap()
                .remove("recipe_steps");
        });

        let legacy = PlanValidator::new(PlanSchema::new(1), 50.0);
        assert_eq!(fx.store.purge_invalid(&legacy).unwrap().removed_count, 0);

        let current = PlanValidator::default();
        assert_eq!(fx.store.purge_invalid(&current).unwrap().removed_count, 1);
    }

    #[test]
    fn test_removes_version_mismatch() {
        let fx = Fixture::new();
        fx.store.put(&fx.key, &fx.request, &sample_plan(2, 2000)).unwrap();
        fx.rewrite(0, |value| value["version"] = Value::from(1));

        let stats = fx.store.purge_invalid(&PlanValidator::default()).unwrap();
        assert_eq!(stats.removed_count, 1);
    }

    #[test]
    fn test_max_age_policy() {
        let fx = Fixture::new();
        fx.store.put(&fx.key, &fx.request, &sample_plan(2, 2000)).unwrap();
        let old = (Utc::now() - Duration::days(40)).to_rfc3339();
        fx.rewrite(0, |value| value["metadata"]["created_at"] = Value::from(old));

        let manager = CleanupManager::new(
            fx.store.cache_dir(),
            CleanupPolicy {
                remove_version_mismatch: true,
                max_age_days: Some(30),
            },
            2,
        );
        let stats = manager.purge(&PlanValidator::default()).unwrap();
        assert_eq!(stats.removed_count, 1);
    }

    #[test]
    fn test_purge_is_idempotent_and_cleans_directories() {
        let fx = Fixture::new();
        fx.store.put(&fx.key, &fx.request, &sample_plan(2, 2000)).unwrap();
        fs::write(fx.slot_file(0), "garbage").unwrap();
        fs::write(fx.slot_file(0).with_extension("json.tmp"), "partial").unwrap();

        let first = fx.store.purge_invalid(&PlanValidator::default()).unwrap();
        assert_eq!(first.removed_count, 2);
        assert!(!fx.slot_file(0).parent().unwrap().exists());

        let second = fx.store.purge_invalid(&PlanValidator::default()).unwrap();
        assert_eq!(second, CleanupStats::default());
    }
}
