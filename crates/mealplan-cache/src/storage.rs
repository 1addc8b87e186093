//! Variation storage with file-based persistence

use mealplan_core::{MealPlan, PlanRequest, PlanValidator};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::cleanup::{CleanupManager, CleanupPolicy, CleanupStats};
use crate::entry::Variation;
use crate::error::StorageError;
use crate::random::RandomSource;

pub const DEFAULT_MAX_VARIATIONS: usize = 3;
pub const DEFAULT_FRESH_PROBABILITY: f64 = 0.10;

pub(crate) const SLOT_EXTENSION: &str = "json";
pub(crate) const TEMP_EXTENSION: &str = "tmp";

/// Bounds and retrieval behaviour of a store
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Maximum variations kept per key
    pub max_variations: usize,

    /// Probability that a lookup ignores stored variations
    pub fresh_probability: f64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_variations: DEFAULT_MAX_VARIATIONS,
            fresh_probability: DEFAULT_FRESH_PROBABILITY,
        }
    }
}

/// Where a `put` landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PutOutcome {
    pub slot: usize,
    /// Slot whose previous variation was replaced, if the key was full
    pub evicted: Option<usize>,
}

/// Store-wide counters for the operational CLI
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub keys: usize,
    pub variations: usize,
    pub total_size_bytes: u64,
}

/// Bounded per-key variation store
///
/// Layout: `<cache_dir>/<key[..2]>/<key>/<slot>.json`. Mutations are
/// serialized by an internal lock and every slot file is replaced through a
/// temp file and rename, so readers always see a complete variation.
pub struct VariationStore {
    cache_dir: PathBuf,
    config: StoreConfig,
    version: u32,
    random: Arc<dyn RandomSource>,
    cleanup_policy: CleanupPolicy,
    write_lock: Mutex<()>,
}

impl VariationStore {
    /// Open (or create) a store rooted at `cache_dir`
    pub fn new<P: AsRef<Path>>(
        cache_dir: P,
        config: StoreConfig,
        version: u32,
        random: Arc<dyn RandomSource>,
    ) -> Result<Self, StorageError> {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        fs::create_dir_all(&cache_dir).map_err(StorageError::io(&cache_dir))?;

        Ok(Self {
            cache_dir,
            config,
            version,
            random,
            cleanup_policy: CleanupPolicy::default(),
            write_lock: Mutex::new(()),
        })
    }

    /// Replace the policy used by [`VariationStore::purge_invalid`]
    pub fn with_cleanup_policy(mut self, policy: CleanupPolicy) -> Self {
        self.cleanup_policy = policy;
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    fn key_dir(&self, key: &str) -> PathBuf {
        let prefix = key.get(..2).unwrap_or(key);
        self.cache_dir.join(prefix).join(key)
    }

    fn slot_path(&self, key: &str, slot: usize) -> PathBuf {
        self.key_dir(key).join(format!("{}.{}", slot, SLOT_EXTENSION))
    }

    /// Randomized lookup.
    ///
    /// Returns `None` with probability `fresh_probability` even when variations
    /// exist, otherwise a uniformly chosen readable variation.
    pub fn try_get(&self, key: &str) -> Option<Variation> {
        if self.random.chance(self.config.fresh_probability) {
            log::debug!("Cache bypass: {}", short(key));
            return None;
        }

        let mut variations = self.variations(key);
        if variations.is_empty() {
            log::debug!("Cache miss: {}", short(key));
            return None;
        }

        let index = self.random.pick(variations.len());
        let variation = variations.swap_remove(index.min(variations.len() - 1));
        log::info!("Cache hit: {} slot {}", short(key), variation.slot);
        Some(variation)
    }

    /// All readable variations stored under `key`, ordered by slot.
    ///
    /// Unreadable files and variations written under another schema
    /// version are skipped.
    pub fn variations(&self, key: &str) -> Vec<Variation> {
        if !is_valid_key(key) {
            return Vec::new();
        }

        let dir = self.key_dir(key);
        let slots = match occupied_slots(&dir) {
            Ok(slots) => slots,
            Err(e) => {
                if !e.is_not_found() {
                    log::warn!("Failed to list variations for {}: {}", short(key), e);
                }
                return Vec::new();
            }
        };

        slots
            .into_iter()
            .filter_map(|slot| match read_variation(&dir.join(format!("{}.{}", slot, SLOT_EXTENSION))) {
                Ok(variation) if variation.version == self.version && variation.cache_key == key => {
                    Some(variation)
                }
                Ok(variation) => {
                    log::debug!(
                        "Skipping variation {} slot {} (version {}, key {})",
                        short(key),
                        slot,
                        variation.version,
                        short(&variation.cache_key)
                    );
                    None
                }
                Err(e) => {
                    log::warn!("Skipping unreadable variation: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Store a validated plan.
    ///
    /// When the key already holds `max_variations` entries, one is chosen
    /// uniformly at random and replaced; otherwise the lowest free slot is used.
    pub fn put(&self, key: &str, request: &PlanRequest, plan: &MealPlan) -> Result<PutOutcome, StorageError> {
        if !is_valid_key(key) {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let dir = self.key_dir(key);
        fs::create_dir_all(&dir).map_err(StorageError::io(&dir))?;

        let max = self.config.max_variations.max(1);
        let mut occupied = occupied_slots(&dir)?;

        let outcome = if occupied.len() >= max {
            let victim = occupied.swap_remove(self.random.pick(occupied.len()));
            // A lowered bound can leave more than one surplus variation behind.
            while occupied.len() >= max {
                let extra = occupied.swap_remove(self.random.pick(occupied.len()));
                let path = self.slot_path(key, extra);
                fs::remove_file(&path).map_err(StorageError::io(&path))?;
                log::debug!("Removed surplus variation: {}", path.display());
            }
            PutOutcome {
                slot: victim,
                evicted: Some(victim),
            }
        } else {
            let slot = (0..).find(|slot| !occupied.contains(slot)).unwrap_or(occupied.len());
            PutOutcome { slot, evicted: None }
        };

        let variation = Variation::new(self.version, key.to_string(), outcome.slot, request.clone(), plan.clone());
        let path = self.slot_path(key, outcome.slot);
        write_atomically(&path, &variation)?;

        match outcome.evicted {
            Some(slot) => log::info!("Cache stored: {} slot {} (evicted previous variation)", short(key), slot),
            None => log::info!("Cache stored: {} slot {}", short(key), outcome.slot),
        }

        Ok(outcome)
    }

    /// Every key with at least one slot file, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = walkdir::WalkDir::new(&self.cache_dir)
            .min_depth(2)
            .max_depth(2)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|entry| entry.file_type().is_dir())
            .filter(|entry| occupied_slots(entry.path()).is_ok_and(|slots| !slots.is_empty()))
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .collect();
        keys.sort();
        keys
    }

    /// Count keys, slot files and bytes on disk
    pub fn stats(&self) -> StoreStats {
        let mut stats = StoreStats {
            keys: self.keys().len(),
            ..StoreStats::default()
        };

        for entry in walkdir::WalkDir::new(&self.cache_dir)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if entry.file_type().is_file() {
                if let Ok(metadata) = entry.metadata() {
                    stats.total_size_bytes += metadata.len();
                }
                if slot_index(entry.path()).is_some() {
                    stats.variations += 1;
                }
            }
        }

        stats
    }

    /// Remove every stored variation, returning how many were removed
    pub fn clear_all(&self) -> Result<usize, StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let count = walkdir::WalkDir::new(&self.cache_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|entry| entry.file_type().is_file() && slot_index(entry.path()).is_some())
            .count();

        if self.cache_dir.exists() {
            fs::remove_dir_all(&self.cache_dir).map_err(StorageError::io(&self.cache_dir))?;
        }
        fs::create_dir_all(&self.cache_dir).map_err(StorageError::io(&self.cache_dir))?;

        log::info!("Cache cleared: {} variations removed", count);
        Ok(count)
    }

    /// Remove variations that are unreadable, stale, or structurally invalid
    pub fn purge_invalid(&self, validator: &PlanValidator) -> Result<CleanupStats, StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        CleanupManager::new(&self.cache_dir, self.cleanup_policy.clone(), self.version).purge(validator)
    }
}

/// Keys are hex digests; anything else could escape the cache directory.
pub(crate) fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_hexdigit())
}

/// Slot index of a `<n>.json` file, `None` for anything else
pub(crate) fn slot_index(path: &Path) -> Option<usize> {
    if path.extension().and_then(|ext| ext.to_str()) != Some(SLOT_EXTENSION) {
        return None;
    }
    path.file_stem()?.to_str()?.parse().ok()
}

pub(crate) fn occupied_slots(dir: &Path) -> Result<Vec<usize>, StorageError> {
    let mut slots = Vec::new();
    for entry in fs::read_dir(dir).map_err(StorageError::io(dir))? {
        let entry = entry.map_err(StorageError::io(dir))?;
        if let Some(slot) = slot_index(&entry.path()) {
            slots.push(slot);
        }
    }
    slots.sort_unstable();
    Ok(slots)
}

pub(crate) fn read_variation(path: &Path) -> Result<Variation, StorageError> {
    let content = fs::read_to_string(path).map_err(StorageError::io(path))?;
    serde_json::from_str(&content).map_err(StorageError::serialization(path))
}

fn write_atomically(path: &Path, variation: &Variation) -> Result<(), StorageError> {
    let content = serde_json::to_string_pretty(variation).map_err(StorageError::serialization(path))?;

    let temp_path = path.with_extension(format!("{}.{}", SLOT_EXTENSION, TEMP_EXTENSION));
    fs::write(&temp_path, content).map_err(StorageError::io(&temp_path))?;
    if let Err(source) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(StorageError::Io {
            path: path.to_path_buf(),
            source,
        });
    }

    log::debug!("Variation saved: {}", path.display());
    Ok(())
}

fn short(key: &str) -> &str {
    key.get(..8).unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::CacheKeyGenerator;
    use crate::random::{ScriptedRandom, SeededRandom};
    use crate::testing::sample_plan;
    use tempfile::TempDir;

    fn store_with(dir: &TempDir, config: StoreConfig, random: impl RandomSource + 'static) -> VariationStore {
        VariationStore::new(dir.path(), config, 2, Arc::new(random)).unwrap()
    }

    fn never_fresh() -> StoreConfig {
        StoreConfig {
            fresh_probability: 0.0,
            ..StoreConfig::default()
        }
    }

    fn key_for(request: &PlanRequest) -> String {
        CacheKeyGenerator::with_version(2).generate_key(request)
    }

    #[test]
    fn test_put_and_get() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_with(&temp_dir, never_fresh(), SeededRandom::with_seed(1));
        let request = PlanRequest::new(2, 2000);
        let key = key_for(&request);

        assert!(store.try_get(&key).is_none());

        let outcome = store.put(&key, &request, &sample_plan(2, 2000)).unwrap();
        assert_eq!(outcome, PutOutcome { slot: 0, evicted: None });

        let variation = store.try_get(&key).unwrap();
        assert_eq!(variation.plan, sample_plan(2, 2000));
        assert_eq!(variation.request, request);
        assert_eq!(variation.slot, 0);
        assert!(temp_dir.path().join(&key[..2]).join(&key).join("0.json").exists());
    }

    #[test]
    fn test_fills_lowest_free_slot() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_with(&temp_dir, never_fresh(), SeededRandom::with_seed(1));
        let request = PlanRequest::new(1, 1500);
        let key = key_for(&request);

        for expected in 0..3 {
            let outcome = store.put(&key, &request, &sample_plan(1, 1500)).unwrap();
            assert_eq!(outcome.slot, expected);
        }

        fs::remove_file(store.slot_path(&key, 1)).unwrap();
        assert_eq!(store.put(&key, &request, &sample_plan(1, 1500)).unwrap().slot, 1);
    }

    #[test]
    fn test_eviction_replaces_exactly_one() {
        let temp_dir = TempDir::new().unwrap();
        let random = ScriptedRandom::new().with_picks([1]);
        let store = store_with(&temp_dir, never_fresh(), random);
        let request = PlanRequest::new(1, 1500);
        let key = key_for(&request);

        for calories in [1500, 1510, 1520] {
            store.put(&key, &request, &sample_plan(1, calories)).unwrap();
        }

        let outcome = store.put(&key, &request, &sample_plan(1, 1490)).unwrap();
        assert_eq!(outcome, PutOutcome { slot: 1, evicted: Some(1) });

        let totals: Vec<f64> = store
            .variations(&key)
            .iter()
            .map(|v| v.plan.meal_plan[0].total_calories)
            .collect();
        assert_eq!(totals, vec![1500.0, 1490.0, 1520.0]);
    }

    #[test]
    fn test_bound_never_exceeded() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_with(&temp_dir, never_fresh(), SeededRandom::with_seed(9));
        let request = PlanRequest::new(1, 1500);
        let key = key_for(&request);

        for _ in 0..10 {
            store.put(&key, &request, &sample_plan(1, 1500)).unwrap();
            assert!(store.variations(&key).len() <= DEFAULT_MAX_VARIATIONS);
        }
        assert_eq!(store.variations(&key).len(), DEFAULT_MAX_VARIATIONS);
    }

    #[test]
    fn test_lowered_bound_trims_surplus() {
        let temp_dir = TempDir::new().unwrap();
        let request = PlanRequest::new(1, 1500);
        let key = key_for(&request);

        let wide = store_with(&temp_dir, never_fresh(), SeededRandom::with_seed(3));
        for _ in 0..3 {
            wide.put(&key, &request, &sample_plan(1, 1500)).unwrap();
        }

        let narrow = store_with(
            &temp_dir,
            StoreConfig {
                max_variations: 1,
                fresh_probability: 0.0,
            },
            SeededRandom::with_seed(3),
        );
        let outcome = narrow.put(&key, &request, &sample_plan(1, 1500)).unwrap();

        assert!(outcome.evicted.is_some());
        assert_eq!(narrow.variations(&key).len(), 1);
    }

    #[test]
    fn test_fresh_bypass_ignores_stored_variations() {
        let temp_dir = TempDir::new().unwrap();
        let random = ScriptedRandom::new().with_chances([true, false]);
        let store = store_with(&temp_dir, StoreConfig::default(), random);
        let request = PlanRequest::new(1, 1500);
        let key = key_for(&request);
        store.put(&key, &request, &sample_plan(1, 1500)).unwrap();

        assert!(store.try_get(&key).is_none(), "first lookup is forced fresh");
        assert!(store.try_get(&key).is_some());
    }

    #[test]
    fn test_fresh_probability_is_roughly_respected() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_with(&temp_dir, StoreConfig::default(), SeededRandom::with_seed(2024));
        let request = PlanRequest::new(1, 1500);
        let key = key_for(&request);
        store.put(&key, &request, &sample_plan(1, 1500)).unwrap();

        let misses = (0..2000).filter(|_| store.try_get(&key).is_none()).count();
        assert!((100..=300).contains(&misses), "got {} misses out of 2000", misses);
    }

    #[test]
    fn test_retrieval_is_uniform() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_with(&temp_dir, never_fresh(), SeededRandom::with_seed(77));
        let request = PlanRequest::new(1, 1500);
        let key = key_for(&request);
        for _ in 0..3 {
            store.put(&key, &request, &sample_plan(1, 1500)).unwrap();
        }

        let mut counts = [0usize; 3];
        for _ in 0..3000 {
            counts[store.try_get(&key).unwrap().slot] += 1;
        }
        for count in counts {
            assert!((850..=1150).contains(&count), "uneven selection: {:?}", counts);
        }
    }

    #[test]
    fn test_unreadable_variation_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_with(&temp_dir, never_fresh(), SeededRandom::with_seed(1));
        let request = PlanRequest::new(1, 1500);
        let key = key_for(&request);
        store.put(&key, &request, &sample_plan(1, 1500)).unwrap();
        fs::write(store.slot_path(&key, 1), "{ not json").unwrap();

        let variations = store.variations(&key);
        assert_eq!(variations.len(), 1);
        assert_eq!(variations[0].slot, 0);
    }

    #[test]
    fn test_invalid_key_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_with(&temp_dir, never_fresh(), SeededRandom::with_seed(1));

        let err = store
            .put("../escape", &PlanRequest::new(1, 1500), &sample_plan(1, 1500))
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
        assert!(store.variations("../escape").is_empty());
    }

    #[test]
    fn test_keys_stats_and_clear_all() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_with(&temp_dir, never_fresh(), SeededRandom::with_seed(1));

        let first = PlanRequest::new(1, 1500);
        let second = PlanRequest::new(2, 1800);
        store.put(&key_for(&first), &first, &sample_plan(1, 1500)).unwrap();
        store.put(&key_for(&first), &first, &sample_plan(1, 1500)).unwrap();
        store.put(&key_for(&second), &second, &sample_plan(2, 1800)).unwrap();

        let mut expected = vec![key_for(&first), key_for(&second)];
        expected.sort();
        assert_eq!(store.keys(), expected);

        let stats = store.stats();
        assert_eq!(stats.keys, 2);
        assert_eq!(stats.variations, 3);
        assert!(stats.total_size_bytes > 0);

        assert_eq!(store.clear_all().unwrap(), 3);
        assert!(store.keys().is_empty());
        assert_eq!(store.stats(), StoreStats::default());
        assert!(temp_dir.path().exists());
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_with(&temp_dir, never_fresh(), SeededRandom::with_seed(1));
        let request = PlanRequest::new(1, 1500);
        let key = key_for(&request);
        for _ in 0..5 {
            store.put(&key, &request, &sample_plan(1, 1500)).unwrap();
        }

        let leftovers = walkdir::WalkDir::new(temp_dir.path())
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == TEMP_EXTENSION))
            .count();
        assert_eq!(leftovers, 0);
    }
}
