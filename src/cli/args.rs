use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use mealplan_core::PlanRequest;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about = None
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbosity: u8,

    /// Model used for generation (overrides config)
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// OpenAI-compatible API base URL
    #[arg(long, global = true)]
    pub api_base_url: Option<String>,

    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Bypass the variation cache entirely
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Seed cache randomness for reproducible runs
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Print a default configuration file and exit
    #[arg(long)]
    pub generate_config: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a meal plan
    Generate(GenerateArgs),

    /// Inspect and maintain the variation cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Summarize the request log
    Stats,
}

#[derive(clap::Args, Debug, Clone)]
pub struct GenerateArgs {
    /// Number of days to plan
    #[arg(short, long, default_value = "7")]
    pub days: u32,

    /// Daily calorie target
    #[arg(long, default_value = "2000")]
    pub calories: u32,

    /// Health condition to account for (repeatable)
    #[arg(long = "health", value_name = "CONDITION")]
    pub health_conditions: Vec<String>,

    /// Cuisine preference, optionally weighted as `Label:pct` (repeatable)
    #[arg(long = "cuisine", value_name = "CUISINE")]
    pub cuisines: Vec<String>,

    #[arg(long)]
    pub cheat_meal: bool,

    /// Print the plan as JSON instead of the readable summary
    #[arg(long)]
    pub json: bool,

    /// Also write the plan as JSON to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl GenerateArgs {
    pub fn to_request(&self) -> PlanRequest {
        PlanRequest::new(self.days, self.calories)
            .with_health_conditions(self.health_conditions.iter())
            .with_cuisines(self.cuisines.iter())
            .with_cheat_meal(self.cheat_meal)
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum CacheAction {
    /// List cached keys with their variation counts
    List,

    /// Show the variations stored under a key
    View {
        /// Cache key (a unique prefix is enough)
        key: String,

        /// Only show this slot
        #[arg(long)]
        slot: Option<usize>,
    },

    /// Show cache statistics
    Stats,

    /// Remove every cached variation
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Remove invalid or stale variations
    Purge,
}

pub fn validate_generate_args(args: &GenerateArgs) -> Result<()> {
    if let Some(output) = &args.output {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                return Err(anyhow::anyhow!("Output directory does not exist: {}", parent.display()));
            }
        }
    }

    Ok(())
}
