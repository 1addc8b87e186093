//! Wires configuration into a ready-to-use generator.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use mealplan_cache::{CleanupStats, RandomSource, RequestLog, SeededRandom, VariationStore};
use mealplan_core::{MealPlan, PlanRequest};
use mealplan_generator::{CompletionBackend, GenaiBackend, GenerationError, MealPlanGenerator};

use crate::config::MealPlannerConfig;

/// The generator together with the store and request log it writes to.
pub struct MealPlanService {
    store: Arc<VariationStore>,
    request_log: Arc<RequestLog>,
    generator: MealPlanGenerator,
}

impl MealPlanService {
    /// Build a service talking to the configured LLM provider.
    pub fn from_config(config: &MealPlannerConfig) -> Result<Self> {
        let backend = Arc::new(GenaiBackend::new(config.to_genai_config()));
        Self::with_backend(config, backend, random_source(config))
    }

    pub fn with_backend(
        config: &MealPlannerConfig,
        backend: Arc<dyn CompletionBackend>,
        random: Arc<dyn RandomSource>,
    ) -> Result<Self> {
        let validator = config.to_validator();
        let store = open_store(config, Arc::clone(&random))?;
        let request_log = Arc::new(
            RequestLog::new(&config.logging.directory)
                .with_context(|| format!("Failed to open request log in {}", config.logging.directory.display()))?,
        );

        if config.cache.enabled && config.cache.purge_on_startup {
            match store.purge_invalid(&validator) {
                Ok(stats) => log_purge(&stats),
                Err(e) => warn!("Startup cache purge failed: {}", e),
            }
        }

        let generator = MealPlanGenerator::new(backend, validator, random)
            .with_store(Arc::clone(&store))
            .with_request_log(Arc::clone(&request_log))
            .with_config(config.to_generator_config());

        Ok(Self {
            store,
            request_log,
            generator,
        })
    }

    pub async fn generate(&self, request: &PlanRequest) -> Result<MealPlan, GenerationError> {
        self.generator.generate(request).await
    }

    pub fn cache_key(&self, request: &PlanRequest) -> String {
        self.generator.cache_key(request)
    }

    pub fn store(&self) -> &VariationStore {
        &self.store
    }

    pub fn request_log(&self) -> &RequestLog {
        &self.request_log
    }

    pub fn generator(&self) -> &MealPlanGenerator {
        &self.generator
    }
}

/// Open the variation store described by `config` without a generator,
/// for the maintenance commands.
pub fn open_store(config: &MealPlannerConfig, random: Arc<dyn RandomSource>) -> Result<Arc<VariationStore>> {
    let store = VariationStore::new(
        &config.cache.directory,
        config.to_store_config(),
        config.generation.schema_version,
        random,
    )
    .with_context(|| format!("Failed to open cache directory {}", config.cache.directory.display()))?
    .with_cleanup_policy(config.to_cleanup_policy());

    Ok(Arc::new(store))
}

pub fn random_source(config: &MealPlannerConfig) -> Arc<dyn RandomSource> {
    match config.cache.seed {
        Some(seed) => Arc::new(SeededRandom::with_seed(seed)),
        None => Arc::new(SeededRandom::from_entropy()),
    }
}

fn log_purge(stats: &CleanupStats) {
    if stats.removed_count > 0 {
        info!(
            "Startup purge removed {} of {} cached files ({} bytes)",
            stats.removed_count, stats.scanned_count, stats.freed_bytes
        );
    }
}
