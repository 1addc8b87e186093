//! Request orchestration: cache lookup, generation attempts, validation,
//! cache population and outcome logging.

use std::sync::Arc;
use std::time::{Duration, Instant};

use mealplan_cache::{CacheKeyGenerator, Outcome, RandomSource, RequestLog, VariationStore};
use mealplan_core::{MealPlan, PlanRequest, PlanValidator};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::backend::CompletionBackend;
use crate::error::GenerationError;
use crate::parser::parse_candidate;
use crate::prompt::PromptBuilder;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Tunables for [`MealPlanGenerator`].
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    pub max_attempts: u32,
    /// Upper bound on a single completion call
    pub request_timeout: Duration,
    /// Base delay before a retry; zero disables backoff
    pub retry_backoff: Duration,
    /// When false the variation store is neither read nor written
    pub cache_enabled: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            retry_backoff: Duration::ZERO,
            cache_enabled: true,
        }
    }
}

impl GeneratorConfig {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn with_retry_backoff(mut self, retry_backoff: Duration) -> Self {
        self.retry_backoff = retry_backoff;
        self
    }

    pub fn with_cache_enabled(mut self, cache_enabled: bool) -> Self {
        self.cache_enabled = cache_enabled;
        self
    }
}

/// Serves meal plan requests from the variation cache or the completion
/// backend. Holds no persistent state of its own.
pub struct MealPlanGenerator {
    backend: Arc<dyn CompletionBackend>,
    store: Option<Arc<VariationStore>>,
    request_log: Option<Arc<RequestLog>>,
    validator: PlanValidator,
    key_generator: CacheKeyGenerator,
    prompts: PromptBuilder,
    random: Arc<dyn RandomSource>,
    config: GeneratorConfig,
}

impl MealPlanGenerator {
    pub fn new(backend: Arc<dyn CompletionBackend>, validator: PlanValidator, random: Arc<dyn RandomSource>) -> Self {
        let key_generator = CacheKeyGenerator::with_version(validator.schema().version);
        let prompts = PromptBuilder::new(
            validator.calorie_tolerance(),
            validator.schema().requires_recipe_details(),
        );

        Self {
            backend,
            store: None,
            request_log: None,
            validator,
            key_generator,
            prompts,
            random,
            config: GeneratorConfig::default(),
        }
    }

    pub fn with_store(mut self, store: Arc<VariationStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_request_log(mut self, request_log: Arc<RequestLog>) -> Self {
        self.request_log = Some(request_log);
        self
    }

    pub fn with_config(mut self, config: GeneratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn validator(&self) -> &PlanValidator {
        &self.validator
    }

    /// Cache key this generator uses for `request`
    pub fn cache_key(&self, request: &PlanRequest) -> String {
        self.key_generator.generate_key(request)
    }

    fn cache(&self) -> Option<&VariationStore> {
        self.store.as_deref().filter(|_| self.config.cache_enabled)
    }

    /// Produce a validated plan for `request`.
    ///
    /// Exactly one request log entry is written for every request that
    /// passes input validation, and at most one variation is stored.
    pub async fn generate(&self, request: &PlanRequest) -> Result<MealPlan, GenerationError> {
        request.validate()?;

        let key = self.cache_key(request);
        let started = Instant::now();

        if let Some(store) = self.cache() {
            if let Some(variation) = store.try_get(&key) {
                let verdict = self.validator.validate_plan(&variation.plan, request);
                if verdict.is_valid() {
                    let mut plan = variation.plan;
                    // Hits report no generation time; the stored value belongs to the original call.
                    plan.generation_time_seconds = None;
                    self.record(&key, Outcome::CacheHit, started.elapsed().as_secs_f64());
                    info!("Served {} from cache (slot {})", short(&key), variation.slot);
                    return Ok(plan);
                }
                debug!(
                    "Cached slot {} for {} fails current validation ({}), generating",
                    variation.slot,
                    short(&key),
                    verdict
                );
            }
        }

        match self.run_attempts(request).await {
            Ok(mut plan) => {
                let elapsed = started.elapsed().as_secs_f64();
                plan.generation_time_seconds = Some(elapsed);

                if let Some(store) = self.cache() {
                    if let Err(e) = store.put(&key, request, &plan) {
                        warn!("Failed to cache plan for {}: {}", short(&key), e);
                    }
                }

                self.record(&key, Outcome::ApiCall, elapsed);
                info!("Generated plan for {} in {:.2}s", short(&key), elapsed);
                Ok(plan)
            }
            Err(e) => {
                self.record(&key, Outcome::Error, started.elapsed().as_secs_f64());
                error!("Meal plan generation failed for {}: {}", short(&key), e);
                Err(e)
            }
        }
    }

    async fn run_attempts(&self, request: &PlanRequest) -> Result<MealPlan, GenerationError> {
        let max_attempts = self.config.max_attempts.max(1);
        let system_prompt = self.prompts.system_prompt();
        let user_prompt = self.prompts.user_prompt(request);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                if let Some(delay) = self.backoff_delay(attempt) {
                    debug!("Retrying after {:?}", delay);
                    tokio::time::sleep(delay).await;
                }
            }

            match self.attempt(&system_prompt, &user_prompt, request).await {
                Ok(plan) => {
                    debug!("Generation attempt {}/{} accepted", attempt, max_attempts);
                    return Ok(plan);
                }
                Err(e) if !e.is_retryable() => {
                    warn!("Generation attempt {}/{} failed, not retrying: {}", attempt, max_attempts, e);
                    return Err(e);
                }
                Err(e) => {
                    warn!("Generation attempt {}/{} failed: {}", attempt, max_attempts, e);
                    last_error = Some(e);
                }
            }
        }

        Err(GenerationError::GenerationExhausted {
            attempts: max_attempts,
            last_error: Box::new(
                last_error.unwrap_or_else(|| GenerationError::Transport("no attempt was made".to_string())),
            ),
        })
    }

    /// One transport call followed by fence stripping, parsing and validation.
    async fn attempt(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        request: &PlanRequest,
    ) -> Result<MealPlan, GenerationError> {
        let raw = timeout(
            self.config.request_timeout,
            self.backend.complete(system_prompt, user_prompt),
        )
        .await
        .map_err(|_| GenerationError::Timeout {
            timeout_secs: self.config.request_timeout.as_secs(),
        })??;

        let candidate = parse_candidate(&raw)?;
        GenerationError::check_validation(self.validator.validate(&candidate, request))?;

        serde_json::from_value(candidate)
            .map_err(|e| GenerationError::MalformedResult(format!("plan does not match meal plan types: {}", e)))
    }

    /// Exponential backoff with jitter in `[delay / 2, delay)`.
    fn backoff_delay(&self, attempt: u32) -> Option<Duration> {
        if self.config.retry_backoff.is_zero() {
            return None;
        }
        let exponent = attempt.saturating_sub(2).min(5);
        let delay = self.config.retry_backoff * (1u32 << exponent);
        Some(delay.mul_f64(0.5 + self.random.unit() * 0.5))
    }

    fn record(&self, key: &str, outcome: Outcome, duration_seconds: f64) {
        if let Some(request_log) = &self.request_log {
            if let Err(e) = request_log.append(key, outcome, duration_seconds) {
                warn!("Failed to write request log entry: {}", e);
            }
        }
    }
}

fn short(key: &str) -> &str {
    key.get(..8).unwrap_or(key)
}
