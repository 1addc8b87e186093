//! Meal plan generation for mealplanner.
//!
//! Wraps an LLM completion call with prompt construction, response
//! parsing, plan validation, bounded retries, the variation cache and the
//! request outcome log.

pub mod backend;
pub mod error;
pub mod generator;
pub mod parser;
pub mod prompt;

pub use backend::{CompletionBackend, DEFAULT_MODEL, DEFAULT_TEMPERATURE, GenaiBackend, GenaiConfig};
pub use error::GenerationError;
pub use generator::{DEFAULT_MAX_ATTEMPTS, DEFAULT_REQUEST_TIMEOUT_SECS, GeneratorConfig, MealPlanGenerator};
pub use parser::{parse_candidate, strip_code_fence};
pub use prompt::{CuisineAllocation, PromptBuilder, cuisine_distribution, format_distribution};
