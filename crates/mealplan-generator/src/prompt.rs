//! Prompt construction for meal plan generation.

use mealplan_core::{DEFAULT_CALORIE_TOLERANCE, PlanRequest};
use std::fmt;

/// Meal slots requested for one cuisine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CuisineAllocation {
    pub label: String,
    pub meals: u32,
}

impl fmt::Display for CuisineAllocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} meals", self.label, self.meals)
    }
}

/// Split the estimated meal count between the requested cuisines.
///
/// Weighted preferences get `round(pct / 100 * total)` slots. Whatever is
/// left (never below zero) is shared evenly by the unweighted ones, with
/// leftover slots going to the earliest of them. Output keeps request order.
pub fn cuisine_distribution(request: &PlanRequest) -> Vec<CuisineAllocation> {
    let total = request.estimated_total_meals();
    let cuisines = request.cuisines();

    let weighted: Vec<Option<u32>> = cuisines
        .iter()
        .map(|c| c.percentage.map(|pct| (pct / 100.0 * f64::from(total)).round() as u32))
        .collect();

    let claimed = weighted.iter().flatten().fold(0u32, |acc, &n| acc.saturating_add(n));
    let remaining = total.saturating_sub(claimed);
    let unweighted = weighted.iter().filter(|w| w.is_none()).count() as u32;

    let (share, mut leftover) = if unweighted > 0 {
        (remaining / unweighted, remaining % unweighted)
    } else {
        (0, 0)
    };

    cuisines
        .into_iter()
        .zip(weighted)
        .map(|(cuisine, weight)| {
            let meals = weight.unwrap_or_else(|| {
                let extra = u32::from(leftover > 0);
                leftover -= extra;
                share + extra
            });
            CuisineAllocation {
                label: cuisine.label,
                meals,
            }
        })
        .collect()
}

/// Render allocations as `Italian:9 meals, Thai:6 meals`.
pub fn format_distribution(allocations: &[CuisineAllocation]) -> String {
    allocations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Builds the system and user prompts sent to the completion backend.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    calorie_tolerance: f64,
    require_recipe_details: bool,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            calorie_tolerance: DEFAULT_CALORIE_TOLERANCE,
            require_recipe_details: true,
        }
    }
}

impl PromptBuilder {
    pub fn new(calorie_tolerance: f64, require_recipe_details: bool) -> Self {
        Self {
            calorie_tolerance,
            require_recipe_details,
        }
    }

    pub fn system_prompt(&self) -> String {
        let recipe_fields = if self.require_recipe_details {
            r#",
          "ingredients": [{"item": "ingredient name", "amount": "quantity with unit"}],
          "recipe_steps": ["Step 1 description", "Step 2 description"]"#
        } else {
            ""
        };

        format!(
            r#"You are a professional nutritionist and meal planner. You must respond with ONLY valid JSON, no other text, following exactly this structure:
{{
  "meal_plan": [
    {{
      "day": 1,
      "meals": [
        {{
          "type": "breakfast/lunch/dinner",
          "name": "dish name",
          "cuisine": "cuisine type",
          "calories": number,
          "nutrition": {{"protein": "Xg", "carbs": "Xg", "fat": "Xg"}}{recipe_fields}
        }}
      ],
      "total_calories": number
    }}
  ]
}}"#
        )
    }

    pub fn user_prompt(&self, request: &PlanRequest) -> String {
        let health = if request.health_conditions.is_empty() {
            "None".to_string()
        } else {
            request.health_conditions.join(", ")
        };

        let distribution = format_distribution(&cuisine_distribution(request));
        let cuisines = if distribution.is_empty() {
            "Any".to_string()
        } else {
            distribution
        };

        let cheat_meal = if request.include_cheat_meal {
            "Include one cheat meal"
        } else {
            "No cheat meals"
        };

        format!(
            "Create a {days}-day meal plan with:\n\
             - Daily calorie target: {calories} calories\n\
             - Health conditions: {health}\n\
             - Cuisines: {cuisines}\n\
             - {cheat_meal}\n\
             - Each day's total_calories must be within {tolerance} calories of {calories}\n\
             \n\
             IMPORTANT: Respond with ONLY the JSON structure, no additional text or explanations.",
            days = request.number_of_days,
            calories = request.daily_calories,
            tolerance = self.calorie_tolerance,
        )
    }
}
