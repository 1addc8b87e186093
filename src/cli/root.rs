use anyhow::Result;
use clap::Parser;
use std::collections::HashMap;
use tracing_subscriber::EnvFilter;

use crate::cli::args::{Args, Commands, validate_generate_args};
use crate::cli::commands::{handle_cache_command, run_generate_command, run_stats_command};
use crate::config::MealPlannerConfig;

pub struct RootCommand;

impl RootCommand {
    pub async fn execute() -> Result<()> {
        let args = Args::parse();
        init_tracing(args.verbosity);

        if args.generate_config {
            println!("{}", MealPlannerConfig::generate_default_config());
            return Ok(());
        }

        let env_vars: HashMap<String, String> = std::env::vars().collect();
        let config = MealPlannerConfig::load_with_precedence(args.config.as_deref(), &args, &env_vars)?;

        match &args.command {
            Some(Commands::Generate(generate_args)) => {
                validate_generate_args(generate_args)?;
                run_generate_command(generate_args.clone(), &config).await
            }
            Some(Commands::Cache { action }) => handle_cache_command(action, &config).await,
            Some(Commands::Stats) => run_stats_command(&config).await,
            None => {
                eprintln!("No command given. Try `mealplanner generate --days 3` or `mealplanner --help`.");
                Ok(())
            }
        }
    }
}

/// `RUST_LOG` wins; otherwise `-v` raises the level from warn.
fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
