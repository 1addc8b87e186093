//! Request log summary

use anyhow::{Context, Result};

use mealplan_cache::{LogStats, RequestLog};

use crate::config::MealPlannerConfig;

pub async fn run_stats_command(config: &MealPlannerConfig) -> Result<()> {
    let log_dir = &config.logging.directory;
    let request_log =
        RequestLog::new(log_dir).with_context(|| format!("Failed to open request log in {}", log_dir.display()))?;
    let stats = request_log.stats()?;

    println!("📊 Request statistics");
    println!("   Log: {}", request_log.path().display());
    print!("{}", render_stats(&stats));

    Ok(())
}

fn render_stats(stats: &LogStats) -> String {
    if stats.total_requests() == 0 {
        return "\n💡 No requests logged yet\n".to_string();
    }

    let mut out = String::new();
    out.push_str(&format!("\n   Total requests: {}\n", stats.total_requests()));
    out.push_str(&format!("   Cache hits: {}\n", stats.cache_hits));
    out.push_str(&format!("   API calls: {}\n", stats.api_calls));
    out.push_str(&format!("   Errors: {}\n", stats.errors));

    if let Some(rate) = stats.hit_rate() {
        out.push_str(&format!("\n📈 Cache hit rate: {:.1}%\n", rate * 100.0));
    }
    if let Some(avg) = stats.avg_api_seconds() {
        out.push_str(&format!("⏱️  Average generation time: {:.2}s\n", avg));
    }

    out
}
