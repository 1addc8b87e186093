pub mod cli;
pub mod config;
pub mod display;
pub mod service;

// Re-export core types for convenience
pub use mealplan_core::{MealPlan, PlanRequest, PlanValidator};
pub use mealplan_generator::GenerationError;
