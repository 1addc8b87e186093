use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mealplan_cache::{CleanupPolicy, DEFAULT_FRESH_PROBABILITY, DEFAULT_MAX_VARIATIONS, StoreConfig};
use mealplan_core::{CURRENT_SCHEMA_VERSION, DEFAULT_CALORIE_TOLERANCE, PlanSchema, PlanValidator, plan_json_schema};
use mealplan_generator::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_MODEL, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_TEMPERATURE, GenaiConfig,
    GeneratorConfig,
};

use crate::cli::args::Args;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct MealPlannerConfig {
    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct LlmConfig {
    #[serde(default = "default_model")]
    pub model: String,

    /// OpenAI-compatible endpoint; the model's own provider is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Ask the provider to enforce the plan JSON schema on its response
    #[serde(default)]
    pub structured_output: bool,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_base_url: None,
            temperature: default_temperature(),
            request_timeout_secs: default_request_timeout_secs(),
            structured_output: false,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base retry delay in milliseconds, 0 retries immediately
    #[serde(default)]
    pub retry_backoff_ms: u64,

    #[serde(default = "default_calorie_tolerance")]
    pub calorie_tolerance: f64,

    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Require exactly this many meals per day
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meals_per_day: Option<usize>,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_calorie_tolerance() -> f64 {
    DEFAULT_CALORIE_TOLERANCE
}

fn default_schema_version() -> u32 {
    CURRENT_SCHEMA_VERSION
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_backoff_ms: 0,
            calorie_tolerance: default_calorie_tolerance(),
            schema_version: default_schema_version(),
            meals_per_day: None,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    #[serde(default = "default_cache_directory")]
    pub directory: PathBuf,

    #[serde(default = "default_max_variations")]
    pub max_variations: usize,

    /// Probability of ignoring stored variations on lookup
    #[serde(default = "default_fresh_probability")]
    pub fresh_probability: f64,

    /// Drop invalid variations when the service starts
    #[serde(default = "default_purge_on_startup")]
    pub purge_on_startup: bool,

    /// Drop variations older than this many days during a purge
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age_days: Option<i64>,

    /// Seed for cache randomness, for reproducible runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_directory() -> PathBuf {
    PathBuf::from("cache")
}

fn default_max_variations() -> usize {
    DEFAULT_MAX_VARIATIONS
}

fn default_fresh_probability() -> f64 {
    DEFAULT_FRESH_PROBABILITY
}

fn default_purge_on_startup() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            directory: default_cache_directory(),
            max_variations: default_max_variations(),
            fresh_probability: default_fresh_probability(),
            purge_on_startup: default_purge_on_startup(),
            max_age_days: None,
            seed: None,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Directory holding `request_logs.jsonl`
    #[serde(default = "default_log_directory")]
    pub directory: PathBuf,
}

fn default_log_directory() -> PathBuf {
    PathBuf::from("logs")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_log_directory(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Invalid range in {field}: {value} (valid range: {valid_range})")]
    InvalidRange {
        field: String,
        value: String,
        valid_range: String,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidEnvVar { key: String, value: String },

    #[error("Failed to load config file {}: {source}", .path.display())]
    FileError {
        path: PathBuf,
        #[source]
        source: Box<ConfigError>,
    },

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl MealPlannerConfig {
    /// Fold a config layer into `base`. Keys set in `layer` win, nested
    /// tables merge key by key, and keys the layer leaves out keep their
    /// earlier value even when that value is the default.
    pub fn merge_layer(base: &mut toml::Table, layer: toml::Table) {
        for (key, value) in layer {
            match (base.get_mut(&key), value) {
                (Some(toml::Value::Table(existing)), toml::Value::Table(nested)) => {
                    Self::merge_layer(existing, nested);
                }
                (_, value) => {
                    base.insert(key, value);
                }
            }
        }
    }

    /// Read a config file as a raw table, keeping only the keys it sets
    pub fn load_layer<P: AsRef<Path>>(path: P) -> Result<toml::Table, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(content.parse::<toml::Table>()?)
    }

    /// Resolve merged layers over the defaults
    pub fn from_layers(layers: toml::Table) -> Result<Self, ConfigError> {
        Ok(toml::Value::Table(layers).try_into()?)
    }

    pub fn generate_default_config() -> String {
        let body = toml::to_string_pretty(&Self::default()).unwrap_or_default();
        format!(
            "# Mealplanner configuration\n\
             # Precedence: defaults < ~/.config/mealplanner/config.toml < ./mealplanner.toml\n\
             #             < --config FILE < MEALPLANNER_* environment < command line\n\
             #\n\
             # [llm] api_base_url = \"https://api.example.com/v1\"  (OpenAI-compatible endpoint)\n\
             # [generation] meals_per_day = 3\n\
             # [cache] seed = 42\n\
             \n{}",
            body
        )
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::from_layers(Self::load_layer(path)?)
    }

    /// Get the user config file path (~/.config/mealplanner/config.toml)
    pub fn get_user_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config/mealplanner/config.toml"))
    }

    /// Get the current directory config file path (./mealplanner.toml)
    pub fn get_current_config_path() -> PathBuf {
        PathBuf::from("./mealplanner.toml")
    }

    /// Merge the config files found on disk, in priority order:
    /// 1. User config (~/.config/mealplanner/config.toml) - lowest priority (base)
    /// 2. Current directory (./mealplanner.toml)
    fn discovered_layers() -> toml::Table {
        let mut merged = toml::Table::new();
        let candidates = Self::get_user_config_path()
            .into_iter()
            .chain(std::iter::once(Self::get_current_config_path()));

        for path in candidates {
            if !path.exists() {
                continue;
            }
            match Self::load_layer(&path) {
                Ok(layer) => {
                    Self::merge_layer(&mut merged, layer);
                    tracing::debug!("Loaded config from: {}", path.display());
                }
                Err(e) => tracing::warn!("Ignoring unreadable config {}: {}", path.display(), e),
            }
        }

        merged
    }

    /// Load the user and current directory configs over the defaults
    pub fn load_with_merged_configs() -> Self {
        Self::from_layers(Self::discovered_layers()).unwrap_or_else(|e| {
            tracing::warn!("Ignoring invalid config files: {}", e);
            Self::default()
        })
    }

    pub fn apply_env_vars(&mut self, env_vars: &HashMap<String, String>) -> Result<(), ConfigError> {
        fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
            value.trim().parse().map_err(|_| ConfigError::InvalidEnvVar {
                key: key.to_string(),
                value: value.to_string(),
            })
        }

        for (key, value) in env_vars {
            if let Some(config_key) = key.strip_prefix("MEALPLANNER_") {
                match config_key {
                    "LLM_MODEL" => self.llm.model = value.clone(),
                    "LLM_API_BASE_URL" => self.llm.api_base_url = Some(value.clone()),
                    "LLM_TEMPERATURE" => self.llm.temperature = parse(key, value)?,
                    "LLM_REQUEST_TIMEOUT_SECS" => self.llm.request_timeout_secs = parse(key, value)?,
                    "LLM_STRUCTURED_OUTPUT" => self.llm.structured_output = parse(key, value)?,
                    "GENERATION_MAX_ATTEMPTS" => self.generation.max_attempts = parse(key, value)?,
                    "GENERATION_RETRY_BACKOFF_MS" => self.generation.retry_backoff_ms = parse(key, value)?,
                    "GENERATION_CALORIE_TOLERANCE" => self.generation.calorie_tolerance = parse(key, value)?,
                    "GENERATION_SCHEMA_VERSION" => self.generation.schema_version = parse(key, value)?,
                    "GENERATION_MEALS_PER_DAY" => self.generation.meals_per_day = Some(parse(key, value)?),
                    "CACHE_ENABLED" => self.cache.enabled = parse(key, value)?,
                    "CACHE_DIRECTORY" => self.cache.directory = PathBuf::from(value),
                    "CACHE_MAX_VARIATIONS" => self.cache.max_variations = parse(key, value)?,
                    "CACHE_FRESH_PROBABILITY" => self.cache.fresh_probability = parse(key, value)?,
                    "CACHE_PURGE_ON_STARTUP" => self.cache.purge_on_startup = parse(key, value)?,
                    "CACHE_MAX_AGE_DAYS" => self.cache.max_age_days = Some(parse(key, value)?),
                    "CACHE_SEED" => self.cache.seed = Some(parse(key, value)?),
                    "LOGGING_DIRECTORY" => self.logging.directory = PathBuf::from(value),
                    _ => {} // Ignore unknown environment variables
                }
            }
        }
        Ok(())
    }

    pub fn apply_args(&mut self, args: &Args) {
        if let Some(ref model) = args.model {
            self.llm.model = model.clone();
        }
        if let Some(ref base_url) = args.api_base_url {
            self.llm.api_base_url = Some(base_url.clone());
        }
        if let Some(ref cache_dir) = args.cache_dir {
            self.cache.directory = cache_dir.clone();
        }
        if let Some(ref log_dir) = args.log_dir {
            self.logging.directory = log_dir.clone();
        }
        if args.no_cache {
            self.cache.enabled = false;
        }
        if let Some(seed) = args.seed {
            self.cache.seed = Some(seed);
        }
    }

    /// Load configuration with full precedence chain:
    /// 1. Default values (lowest)
    /// 2. User config (~/.config/mealplanner/config.toml)
    /// 3. Current directory (./mealplanner.toml)
    /// 4. Explicit `--config` file
    /// 5. Environment variables (MEALPLANNER_*)
    /// 6. CLI arguments (highest)
    pub fn load_with_precedence(
        config_path: Option<&Path>,
        cli_args: &Args,
        env_vars: &HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let mut layers = Self::discovered_layers();

        if let Some(path) = config_path {
            let explicit = Self::load_layer(path).map_err(|e| ConfigError::FileError {
                path: path.to_path_buf(),
                source: Box::new(e),
            })?;
            Self::merge_layer(&mut layers, explicit);
        }

        let mut config = Self::from_layers(layers)?;

        config.apply_env_vars(env_vars)?;
        config.apply_args(cli_args);
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn out_of_range(field: &str, value: impl ToString, valid_range: &str) -> ConfigError {
            ConfigError::InvalidRange {
                field: field.to_string(),
                value: value.to_string(),
                valid_range: valid_range.to_string(),
            }
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(out_of_range("llm.temperature", self.llm.temperature, "0.0-2.0"));
        }
        if self.llm.request_timeout_secs == 0 {
            return Err(out_of_range("llm.request_timeout_secs", 0, ">= 1"));
        }
        if !(1..=10).contains(&self.generation.max_attempts) {
            return Err(out_of_range("generation.max_attempts", self.generation.max_attempts, "1-10"));
        }
        if !self.generation.calorie_tolerance.is_finite() || self.generation.calorie_tolerance < 0.0 {
            return Err(out_of_range(
                "generation.calorie_tolerance",
                self.generation.calorie_tolerance,
                ">= 0",
            ));
        }
        if self.generation.schema_version == 0 {
            return Err(out_of_range("generation.schema_version", 0, ">= 1"));
        }
        if let Some(meals) = self.generation.meals_per_day {
            if !(1..=10).contains(&meals) {
                return Err(out_of_range("generation.meals_per_day", meals, "1-10"));
            }
        }
        if !(1..=100).contains(&self.cache.max_variations) {
            return Err(out_of_range("cache.max_variations", self.cache.max_variations, "1-100"));
        }
        if !(0.0..=1.0).contains(&self.cache.fresh_probability) {
            return Err(out_of_range("cache.fresh_probability", self.cache.fresh_probability, "0.0-1.0"));
        }
        if let Some(days) = self.cache.max_age_days {
            if days < 1 {
                return Err(out_of_range("cache.max_age_days", days, ">= 1"));
            }
        }

        Ok(())
    }

    pub fn to_validator(&self) -> PlanValidator {
        PlanValidator::new(
            PlanSchema::new(self.generation.schema_version).with_meals_per_day(self.generation.meals_per_day),
            self.generation.calorie_tolerance,
        )
    }

    pub fn to_store_config(&self) -> StoreConfig {
        StoreConfig {
            max_variations: self.cache.max_variations,
            fresh_probability: self.cache.fresh_probability,
        }
    }

    pub fn to_cleanup_policy(&self) -> CleanupPolicy {
        CleanupPolicy {
            max_age_days: self.cache.max_age_days,
            ..CleanupPolicy::default()
        }
    }

    pub fn to_generator_config(&self) -> GeneratorConfig {
        GeneratorConfig::default()
            .with_max_attempts(self.generation.max_attempts)
            .with_request_timeout(Duration::from_secs(self.llm.request_timeout_secs))
            .with_retry_backoff(Duration::from_millis(self.generation.retry_backoff_ms))
            .with_cache_enabled(self.cache.enabled)
    }

    pub fn to_genai_config(&self) -> GenaiConfig {
        GenaiConfig {
            model: self.llm.model.clone(),
            api_base_url: self.llm.api_base_url.clone(),
            temperature: self.llm.temperature,
            response_schema: self
                .llm
                .structured_output
                .then(|| plan_json_schema(self.to_validator().schema().requires_recipe_details())),
        }
    }
}
