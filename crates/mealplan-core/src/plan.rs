//! Generated meal plan types.

use serde::{Deserialize, Serialize};
use serde_json::json;

/// A complete generated plan, one entry per requested day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealPlan {
    pub meal_plan: Vec<DayPlan>,
    /// Wall-clock seconds spent producing this plan, attached on acceptance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_time_seconds: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayPlan {
    pub day: u32,
    pub meals: Vec<Meal>,
    pub total_calories: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
    #[serde(rename = "type")]
    pub meal_type: String,
    pub name: String,
    pub cuisine: String,
    pub calories: f64,
    pub nutrition: Nutrition,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub recipe_steps: Vec<String>,
}

/// Macronutrients as quantity strings such as `"25g"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nutrition {
    pub protein: String,
    pub carbs: String,
    pub fat: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub item: String,
    pub amount: String,
}

impl MealPlan {
    pub fn day_count(&self) -> usize {
        self.meal_plan.len()
    }

    pub fn total_meals(&self) -> usize {
        self.meal_plan.iter().map(|day| day.meals.len()).sum()
    }

    /// Cuisine labels in order of first appearance.
    pub fn cuisines(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for meal in self.meal_plan.iter().flat_map(|day| day.meals.iter()) {
            if !seen.contains(&meal.cuisine.as_str()) {
                seen.push(meal.cuisine.as_str());
            }
        }
        seen
    }
}

/// JSON schema of the plan structure requested from the model.
pub fn plan_json_schema(require_recipe_details: bool) -> serde_json::Value {
    let mut meal_required = vec!["type", "name", "cuisine", "calories", "nutrition"];
    if require_recipe_details {
        meal_required.extend(["ingredients", "recipe_steps"]);
    }

    json!({
        "type": "object",
        "properties": {
            "meal_plan": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "day": { "type": "integer" },
                        "meals": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "type": { "type": "string", "enum": ["breakfast", "lunch", "dinner", "snack"] },
                                    "name": { "type": "string" },
                                    "cuisine": { "type": "string" },
                                    "calories": { "type": "number" },
                                    "nutrition": {
                                        "type": "object",
                                        "properties": {
                                            "protein": { "type": "string" },
                                            "carbs": { "type": "string" },
                                            "fat": { "type": "string" }
                                        },
                                        "required": ["protein", "carbs", "fat"]
                                    },
                                    "ingredients": {
                                        "type": "array",
                                        "items": {
                                            "type": "object",
                                            "properties": {
                                                "item": { "type": "string" },
                                                "amount": { "type": "string" }
                                            },
                                            "required": ["item", "amount"]
                                        }
                                    },
                                    "recipe_steps": {
                                        "type": "array",
                                        "items": { "type": "string" }
                                    }
                                },
                                "required": meal_required
                            }
                        },
                        "total_calories": { "type": "number" }
                    },
                    "required": ["day", "meals", "total_calories"]
                }
            }
        },
        "required": ["meal_plan"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "meal_plan": [
                {
                    "day": 1,
                    "meals": [
                        {
                            "type": "breakfast",
                            "name": "Frittata",
                            "cuisine": "Italian",
                            "calories": 500,
                            "nutrition": {"protein": "30g", "carbs": "20g", "fat": "25g"},
                            "ingredients": [{"item": "eggs", "amount": "3"}],
                            "recipe_steps": ["Whisk", "Bake"]
                        },
                        {
                            "type": "dinner",
                            "name": "Tacos",
                            "cuisine": "Mexican",
                            "calories": 700,
                            "nutrition": {"protein": "35g", "carbs": "60g", "fat": "30g"}
                        }
                    ],
                    "total_calories": 1200
                }
            ]
        }"#
    }

    #[test]
    fn test_plan_deserialization() {
        let plan: MealPlan = serde_json::from_str(sample_json()).unwrap();
        assert_eq!(plan.day_count(), 1);
        assert_eq!(plan.total_meals(), 2);
        assert_eq!(plan.meal_plan[0].meals[0].meal_type, "breakfast");
        assert_eq!(plan.meal_plan[0].meals[1].ingredients.len(), 0);
        assert_eq!(plan.cuisines(), vec!["Italian", "Mexican"]);
        assert_eq!(plan.generation_time_seconds, None);
    }

    #[test]
    fn test_generation_time_serialized_only_when_present() {
        let mut plan: MealPlan = serde_json::from_str(sample_json()).unwrap();
        let json = serde_json::to_string(&plan).unwrap();
        assert!(!json.contains("generation_time_seconds"));

        plan.generation_time_seconds = Some(4.2);
        let json = serde_json::to_string(&plan).unwrap();
        assert!(json.contains("\"generation_time_seconds\":4.2"));
    }

    #[test]
    fn test_empty_recipe_details_survive_serialization() {
        let plan: MealPlan = serde_json::from_str(sample_json()).unwrap();
        let value = serde_json::to_value(&plan).unwrap();
        let dinner = &value["meal_plan"][0]["meals"][1];
        assert_eq!(dinner["ingredients"], json!([]));
        assert_eq!(dinner["recipe_steps"], json!([]));

        let validator = crate::PlanValidator::default();
        assert!(validator.validate_plan(&plan, &crate::PlanRequest::new(1, 1200)).is_valid());
    }

    #[test]
    fn test_schema_requires_recipe_details_when_asked() {
        let strict = plan_json_schema(true);
        let required = &strict["properties"]["meal_plan"]["items"]["properties"]["meals"]["items"]["required"];
        assert!(required.as_array().unwrap().iter().any(|v| v == "recipe_steps"));

        let relaxed = plan_json_schema(false);
        let required = &relaxed["properties"]["meal_plan"]["items"]["properties"]["meals"]["items"]["required"];
        assert!(!required.as_array().unwrap().iter().any(|v| v == "ingredients"));
    }
}
