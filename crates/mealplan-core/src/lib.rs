//! Core types for the mealplanner service.
//!
//! This crate provides the values shared by every other component:
//! - Plan requests and cuisine preferences
//! - Generated meal plan structures and their JSON schema
//! - The plan validator and schema versioning

mod plan;
mod request;
mod validator;

pub use plan::{DayPlan, Ingredient, Meal, MealPlan, Nutrition, plan_json_schema};
pub use request::{CuisinePreference, ESTIMATED_MEALS_PER_DAY, PlanRequest, RequestError};
pub use validator::{
    CURRENT_SCHEMA_VERSION, DEFAULT_CALORIE_TOLERANCE, PlanSchema, PlanValidator, ValidationResult,
};
