use mealplan_core::{Meal, MealPlan};

/// Human-readable rendering of a generated plan.
pub trait MealPlanExt {
    /// Print the plan to stdout.
    fn print_readable(&self);
    /// Convert to markdown format.
    fn to_markdown(&self) -> String;
}

impl MealPlanExt for MealPlan {
    fn print_readable(&self) {
        println!("\n🍽️  Meal Plan");
        println!("{}", "=".repeat(80));
        println!(
            "   {} days, {} meals, cuisines: {}",
            self.day_count(),
            self.total_meals(),
            cuisine_summary(self)
        );
        if let Some(seconds) = self.generation_time_seconds {
            println!("   Generated in {:.1}s", seconds);
        }

        for day in &self.meal_plan {
            println!("\n📅 Day {} ({:.0} kcal)", day.day, day.total_calories);
            println!("{}", "-".repeat(80));

            for meal in &day.meals {
                println!(
                    "  {:<10} {} [{}] {:.0} kcal",
                    meal.meal_type, meal.name, meal.cuisine, meal.calories
                );
                println!(
                    "             protein {}, carbs {}, fat {}",
                    meal.nutrition.protein, meal.nutrition.carbs, meal.nutrition.fat
                );
            }
        }

        println!();
    }

    fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str("# Meal Plan\n\n");
        md.push_str(&format!(
            "{} days, {} meals. Cuisines: {}\n\n",
            self.day_count(),
            self.total_meals(),
            cuisine_summary(self)
        ));

        for day in &self.meal_plan {
            md.push_str(&format!("## Day {} ({:.0} kcal)\n\n", day.day, day.total_calories));
            for meal in &day.meals {
                push_meal(&mut md, meal);
            }
        }

        md
    }
}

fn cuisine_summary(plan: &MealPlan) -> String {
    let cuisines = plan.cuisines();
    if cuisines.is_empty() {
        "none".to_string()
    } else {
        cuisines.join(", ")
    }
}

fn push_meal(md: &mut String, meal: &Meal) {
    md.push_str(&format!(
        "### {}: {}\n\n*{}, {:.0} kcal. Protein {}, carbs {}, fat {}*\n\n",
        capitalize(&meal.meal_type),
        meal.name,
        meal.cuisine,
        meal.calories,
        meal.nutrition.protein,
        meal.nutrition.carbs,
        meal.nutrition.fat
    ));

    if !meal.ingredients.is_empty() {
        md.push_str("**Ingredients**\n\n");
        for ingredient in &meal.ingredients {
            md.push_str(&format!("- {} {}\n", ingredient.amount, ingredient.item));
        }
        md.push('\n');
    }

    if !meal.recipe_steps.is_empty() {
        md.push_str("**Steps**\n\n");
        for (i, step) in meal.recipe_steps.iter().enumerate() {
            md.push_str(&format!("{}. {}\n", i + 1, step));
        }
        md.push('\n');
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
