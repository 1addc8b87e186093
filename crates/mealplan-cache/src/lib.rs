//! Mealplanner cache for generated meal plans
//!
//! This crate keeps a bounded set of validated plan variations per request,
//! so repeated requests can be served locally while still rotating through
//! different plans, and records how each request was served.

pub mod cleanup;
pub mod entry;
pub mod error;
pub mod key;
pub mod random;
pub mod request_log;
pub mod storage;

#[cfg(test)]
mod testing;

pub use cleanup::{CleanupManager, CleanupPolicy, CleanupStats};
pub use entry::{Variation, VariationMetadata};
pub use error::StorageError;
pub use key::CacheKeyGenerator;
pub use random::{RandomSource, ScriptedRandom, SeededRandom};
pub use request_log::{LogStats, Outcome, REQUEST_LOG_FILE, RequestLog, RequestLogEntry};
pub use storage::{
    DEFAULT_FRESH_PROBABILITY, DEFAULT_MAX_VARIATIONS, PutOutcome, StoreConfig, StoreStats, VariationStore,
};
