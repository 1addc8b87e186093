use mealplan_core::{DayPlan, Ingredient, Meal, MealPlan, Nutrition};

pub(crate) fn sample_meal(meal_type: &str, calories: f64) -> Meal {
    Meal {
        meal_type: meal_type.to_string(),
        name: format!("{} bowl", meal_type),
        cuisine: "Mediterranean".to_string(),
        calories,
        nutrition: Nutrition {
            protein: "20g".to_string(),
            carbs: "45g".to_string(),
            fat: "12g".to_string(),
        },
        ingredients: vec![Ingredient {
            item: "chickpeas".to_string(),
            amount: "1 cup".to_string(),
        }],
        recipe_steps: vec!["Combine".to_string(), "Serve".to_string()],
    }
}

/// A plan whose every day totals exactly `daily_calories`.
pub(crate) fn sample_plan(days: u32, daily_calories: u32) -> MealPlan {
    let third = f64::from(daily_calories) / 3.0;
    MealPlan {
        meal_plan: (1..=days)
            .map(|day| DayPlan {
                day,
                meals: vec![
                    sample_meal("breakfast", third),
                    sample_meal("lunch", third),
                    sample_meal("dinner", third),
                ],
                total_calories: f64::from(daily_calories),
            })
            .collect(),
        generation_time_seconds: None,
    }
}
