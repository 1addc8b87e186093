//! Generate command: produce a meal plan from the cache or the LLM.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use mealplan_core::MealPlan;

use crate::cli::args::GenerateArgs;
use crate::cli::ui::{self, StatusPrinter};
use crate::config::MealPlannerConfig;
use crate::display::MealPlanExt;
use crate::service::MealPlanService;

pub async fn run_generate_command(args: GenerateArgs, config: &MealPlannerConfig) -> Result<()> {
    let printer = StatusPrinter::new();
    let request = args.to_request();
    request.validate()?;

    let service = MealPlanService::from_config(config)?;
    let key = service.cache_key(&request);

    printer.info("Request", &format!("{} days at {} kcal/day", request.number_of_days, request.daily_calories));
    printer.dim(&format!("cache key {} ({})", ui::short_key(&key), config.llm.model));
    if !config.cache.enabled {
        printer.warning("Cache", "disabled, every request calls the model");
    }

    let spinner = ui::progress::create_spinner("Generating meal plan...");
    let result = service.generate(&request).await;
    spinner.finish_and_clear();

    let plan = match result {
        Ok(plan) => plan,
        Err(e) => {
            printer.error("Failed", &e.to_string());
            return Err(e.into());
        }
    };

    match plan.generation_time_seconds {
        Some(seconds) => printer.success("Generated", &format!("{}-day plan in {:.1}s", plan.day_count(), seconds)),
        None => printer.success("Cached", &format!("{}-day plan served from cache", plan.day_count())),
    }

    if let Some(output) = &args.output {
        write_plan(&plan, output)?;
        printer.success("Saved", &output.display().to_string());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        plan.print_readable();
    }

    Ok(())
}

/// Markdown for `.md` paths, pretty JSON for anything else
fn write_plan(plan: &MealPlan, path: &Path) -> Result<()> {
    let contents = match path.extension().and_then(|ext| ext.to_str()) {
        Some("md") => plan.to_markdown(),
        _ => serde_json::to_string_pretty(plan)?,
    };
    fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn plan() -> MealPlan {
        MealPlan {
            meal_plan: Vec::new(),
            generation_time_seconds: Some(1.5),
        }
    }

    #[test]
    fn test_write_plan_json_and_markdown() {
        let dir = TempDir::new().unwrap();

        let json_path = dir.path().join("plan.json");
        write_plan(&plan(), &json_path).unwrap();
        let parsed: MealPlan = serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(parsed, plan());

        let md_path = dir.path().join("plan.md");
        write_plan(&plan(), &md_path).unwrap();
        assert!(fs::read_to_string(&md_path).unwrap().starts_with("# Meal Plan"));
    }
}
