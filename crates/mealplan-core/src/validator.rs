//! Structural and calorie checks for candidate meal plans.
//!
//! Candidates are checked as raw JSON so that missing or mistyped fields are
//! reported with a reason instead of a serde error.

use serde_json::Value;
use std::fmt;

use crate::plan::MealPlan;
use crate::request::PlanRequest;

/// Schema version of generated plans. Bumping it invalidates every cached plan.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Default maximum deviation between a day's total and the daily target.
pub const DEFAULT_CALORIE_TOLERANCE: f64 = 50.0;

const BASE_MEAL_FIELDS: &[&str] = &["type", "name", "cuisine", "calories", "nutrition"];
const DETAILED_MEAL_FIELDS: &[&str] = &[
    "type",
    "name",
    "cuisine",
    "calories",
    "nutrition",
    "ingredients",
    "recipe_steps",
];
const NUTRITION_FIELDS: &[&str] = &["protein", "carbs", "fat"];

/// Shape requirements tied to a schema version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSchema {
    pub version: u32,
    /// Exact number of meals every day must contain, when fixed.
    pub meals_per_day: Option<usize>,
}

impl PlanSchema {
    pub fn new(version: u32) -> Self {
        Self {
            version,
            meals_per_day: None,
        }
    }

    pub fn with_meals_per_day(mut self, meals_per_day: Option<usize>) -> Self {
        self.meals_per_day = meals_per_day;
        self
    }

    /// Ingredients and recipe steps became mandatory in version 2.
    pub fn requires_recipe_details(&self) -> bool {
        self.version >= 2
    }

    fn required_meal_fields(&self) -> &'static [&'static str] {
        if self.requires_recipe_details() {
            DETAILED_MEAL_FIELDS
        } else {
            BASE_MEAL_FIELDS
        }
    }
}

impl Default for PlanSchema {
    fn default() -> Self {
        Self::new(CURRENT_SCHEMA_VERSION)
    }
}

/// Outcome of validating one candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationResult {
    Valid,
    InvalidStructure(String),
    InvalidCalorieBounds { day: u32, actual: f64, expected: u32 },
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationResult::Valid => write!(f, "valid"),
            ValidationResult::InvalidStructure(reason) => write!(f, "invalid structure: {}", reason),
            ValidationResult::InvalidCalorieBounds {
                day,
                actual,
                expected,
            } => write!(
                f,
                "day {} totals {} calories, expected {} within tolerance",
                day, actual, expected
            ),
        }
    }
}

/// Checks candidates against a schema and a calorie tolerance window.
#[derive(Debug, Clone)]
pub struct PlanValidator {
    schema: PlanSchema,
    calorie_tolerance: f64,
}

impl Default for PlanValidator {
    fn default() -> Self {
        Self::new(PlanSchema::default(), DEFAULT_CALORIE_TOLERANCE)
    }
}

impl PlanValidator {
    pub fn new(schema: PlanSchema, calorie_tolerance: f64) -> Self {
        Self {
            schema,
            calorie_tolerance,
        }
    }

    pub fn schema(&self) -> &PlanSchema {
        &self.schema
    }

    pub fn calorie_tolerance(&self) -> f64 {
        self.calorie_tolerance
    }

    /// Run every check in order; the first failure wins.
    pub fn validate(&self, candidate: &Value, request: &PlanRequest) -> ValidationResult {
        if let Err(reason) = self.check_structure(candidate, Some(request.number_of_days)) {
            return ValidationResult::InvalidStructure(reason);
        }
        self.check_calories(candidate, request)
    }

    /// Structural checks only, skipping the calorie window.
    pub fn validate_structure(&self, candidate: &Value, expected_days: Option<u32>) -> ValidationResult {
        match self.check_structure(candidate, expected_days) {
            Ok(()) => ValidationResult::Valid,
            Err(reason) => ValidationResult::InvalidStructure(reason),
        }
    }

    /// Validate an already typed plan.
    pub fn validate_plan(&self, plan: &MealPlan, request: &PlanRequest) -> ValidationResult {
        match serde_json::to_value(plan) {
            Ok(value) => self.validate(&value, request),
            Err(e) => ValidationResult::InvalidStructure(format!("unserializable plan: {}", e)),
        }
    }

    fn check_structure(&self, candidate: &Value, expected_days: Option<u32>) -> Result<(), String> {
        let days = candidate
            .get("meal_plan")
            .and_then(Value::as_array)
            .ok_or_else(|| "missing 'meal_plan' list".to_string())?;

        if let Some(expected) = expected_days {
            if days.len() != expected as usize {
                return Err(format!("expected {} days, got {}", expected, days.len()));
            }
        }

        for (index, day) in days.iter().enumerate() {
            let position = index + 1;

            if day.get("day").and_then(Value::as_u64).is_none() {
                return Err(format!("day entry {} has no integer 'day' index", position));
            }

            let meals = day
                .get("meals")
                .and_then(Value::as_array)
                .ok_or_else(|| format!("day entry {} has no 'meals' list", position))?;

            if !day.get("total_calories").is_some_and(Value::is_number) {
                return Err(format!("day entry {} has no numeric 'total_calories'", position));
            }

            if let Some(expected_meals) = self.schema.meals_per_day {
                if meals.len() != expected_meals {
                    return Err(format!(
                        "day entry {} has {} meals, expected {}",
                        position,
                        meals.len(),
                        expected_meals
                    ));
                }
            }

            for (meal_index, meal) in meals.iter().enumerate() {
                self.check_meal(meal).map_err(|field| {
                    format!(
                        "day entry {} meal {} has a missing or invalid '{}'",
                        position,
                        meal_index + 1,
                        field
                    )
                })?;
            }
        }

        Ok(())
    }

    fn check_meal(&self, meal: &Value) -> Result<(), &'static str> {
        for &field in self.schema.required_meal_fields() {
            let value = meal.get(field).ok_or(field)?;
            let well_formed = match field {
                "calories" => value.is_number(),
                "nutrition" => NUTRITION_FIELDS
                    .iter()
                    .all(|key| value.get(*key).is_some_and(Value::is_string)),
                "ingredients" => value.as_array().is_some_and(|items| {
                    items.iter().all(|item| {
                        item.get("item").is_some_and(Value::is_string)
                            && item.get("amount").is_some_and(Value::is_string)
                    })
                }),
                "recipe_steps" => value
                    .as_array()
                    .is_some_and(|steps| steps.iter().all(Value::is_string)),
                _ => value.is_string(),
            };
            if !well_formed {
                return Err(field);
            }
        }
        Ok(())
    }

    fn check_calories(&self, candidate: &Value, request: &PlanRequest) -> ValidationResult {
        let expected = request.daily_calories;
        let days = candidate
            .get("meal_plan")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for (index, day) in days.iter().enumerate() {
            let day_index = day
                .get("day")
                .and_then(Value::as_u64)
                .map(|d| d as u32)
                .unwrap_or(index as u32 + 1);

            let Some(actual) = day.get("total_calories").and_then(Value::as_f64) else {
                return ValidationResult::InvalidStructure(format!(
                    "day entry {} has no numeric 'total_calories'",
                    index + 1
                ));
            };

            if (actual - f64::from(expected)).abs() > self.calorie_tolerance {
                return ValidationResult::InvalidCalorieBounds {
                    day: day_index,
                    actual,
                    expected,
                };
            }
        }

        ValidationResult::Valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meal(calories: u32) -> Value {
        json!({
            "type": "lunch",
            "name": "Risotto",
            "cuisine": "Italian",
            "calories": calories,
            "nutrition": {"protein": "20g", "carbs": "80g", "fat": "15g"},
            "ingredients": [{"item": "arborio rice", "amount": "100g"}],
            "recipe_steps": ["Toast rice", "Add stock"]
        })
    }

    fn plan(days: u32, total: u32) -> Value {
        let entries: Vec<Value> = (1..=days)
            .map(|day| {
                json!({
                    "day": day,
                    "meals": [meal(total / 2), meal(total - total / 2)],
                    "total_calories": total
                })
            })
            .collect();
        json!({ "meal_plan": entries })
    }

    #[test]
    fn test_valid_plan() {
        let validator = PlanValidator::default();
        let request = PlanRequest::new(3, 2000);
        assert_eq!(validator.validate(&plan(3, 2000), &request), ValidationResult::Valid);
    }

    #[test]
    fn test_missing_meal_plan_list() {
        let validator = PlanValidator::default();
        let request = PlanRequest::new(1, 2000);
        let result = validator.validate(&json!({"days": []}), &request);
        assert!(matches!(result, ValidationResult::InvalidStructure(_)));
    }

    #[test]
    fn test_day_count_mismatch() {
        let validator = PlanValidator::default();
        let request = PlanRequest::new(3, 2000);
        match validator.validate(&plan(2, 2000), &request) {
            ValidationResult::InvalidStructure(reason) => {
                assert!(reason.contains("expected 3 days, got 2"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_missing_recipe_steps_rejected_by_current_schema() {
        let mut candidate = plan(1, 2000);
        candidate["meal_plan"][0]["meals"][1]
            .as_object_mut()
            .unwrap()
            .remove("recipe_steps");

        let request = PlanRequest::new(1, 2000);
        let result = PlanValidator::default().validate(&candidate, &request);
        match result {
            ValidationResult::InvalidStructure(reason) => {
                assert!(reason.contains("meal 2"));
                assert!(reason.contains("recipe_steps"));
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let legacy = PlanValidator::new(PlanSchema::new(1), DEFAULT_CALORIE_TOLERANCE);
        assert!(legacy.validate(&candidate, &request).is_valid());
    }

    #[test]
    fn test_nutrition_must_be_quantity_strings() {
        let mut candidate = plan(1, 2000);
        candidate["meal_plan"][0]["meals"][0]["nutrition"]["fat"] = json!(15);

        let result = PlanValidator::default().validate(&candidate, &PlanRequest::new(1, 2000));
        assert!(matches!(result, ValidationResult::InvalidStructure(_)));
    }

    #[test]
    fn test_fixed_meal_count() {
        let schema = PlanSchema::default().with_meals_per_day(Some(3));
        let validator = PlanValidator::new(schema, DEFAULT_CALORIE_TOLERANCE);
        let result = validator.validate(&plan(1, 2000), &PlanRequest::new(1, 2000));
        match result {
            ValidationResult::InvalidStructure(reason) => assert!(reason.contains("expected 3")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_calorie_tolerance_window() {
        let validator = PlanValidator::default();
        let request = PlanRequest::new(2, 2000);

        assert!(validator.validate(&plan(2, 2050), &request).is_valid());
        assert!(validator.validate(&plan(2, 1950), &request).is_valid());

        assert_eq!(
            validator.validate(&plan(2, 2051), &request),
            ValidationResult::InvalidCalorieBounds {
                day: 1,
                actual: 2051.0,
                expected: 2000
            }
        );
    }

    #[test]
    fn test_calorie_violation_reports_offending_day() {
        let mut candidate = plan(3, 2000);
        candidate["meal_plan"][2]["total_calories"] = json!(1500);

        let result = PlanValidator::default().validate(&candidate, &PlanRequest::new(3, 2000));
        assert_eq!(
            result,
            ValidationResult::InvalidCalorieBounds {
                day: 3,
                actual: 1500.0,
                expected: 2000
            }
        );
    }

    #[test]
    fn test_structure_checked_before_calories() {
        let validator = PlanValidator::default();
        let result = validator.validate(&plan(2, 900), &PlanRequest::new(3, 2000));
        assert!(matches!(result, ValidationResult::InvalidStructure(_)));
    }

    #[test]
    fn test_validate_structure_ignores_calories() {
        let validator = PlanValidator::default();
        assert!(validator.validate_structure(&plan(2, 900), Some(2)).is_valid());
        assert!(validator.validate_structure(&plan(2, 900), None).is_valid());
        assert!(!validator.validate_structure(&plan(2, 900), Some(4)).is_valid());
    }

    #[test]
    fn test_validate_typed_plan() {
        let typed: MealPlan = serde_json::from_value(plan(1, 1800)).unwrap();
        let validator = PlanValidator::default();
        assert!(validator.validate_plan(&typed, &PlanRequest::new(1, 1800)).is_valid());
        assert!(!validator.validate_plan(&typed, &PlanRequest::new(1, 2500)).is_valid());
    }
}
