//! Cache management commands

use anyhow::{Result, bail};
use std::io::{self, Write};

use mealplan_cache::{Variation, VariationStore};

use crate::cli::args::CacheAction;
use crate::cli::ui::short_key;
use crate::config::MealPlannerConfig;
use crate::service::{open_store, random_source};

/// Execute cache command
pub async fn handle_cache_command(action: &CacheAction, config: &MealPlannerConfig) -> Result<()> {
    let cache_dir = &config.cache.directory;
    let store = open_store(config, random_source(config))?;

    match action {
        CacheAction::List => {
            println!("📦 Cached meal plans");
            println!("   Directory: {}", cache_dir.display());

            let keys = store.keys();
            if keys.is_empty() {
                println!("\n💡 Cache is empty");
                return Ok(());
            }

            println!();
            println!("   {:<14} {:>10} {:>6} {:>6}  {}", "KEY", "VARIATIONS", "DAYS", "MEALS", "CALORIES");
            for key in &keys {
                let variations = store.variations(key);
                let Some(first) = variations.first() else {
                    continue;
                };
                println!(
                    "   {:<14} {:>10} {:>6} {:>6}  {}",
                    short_key(key),
                    variations.len(),
                    first.plan.day_count(),
                    first.plan.total_meals(),
                    first.request.daily_calories
                );
            }
            println!("\n   {} keys", keys.len());
        }

        CacheAction::View { key, slot } => {
            let full_key = resolve_key(&store, key)?;
            let variations: Vec<Variation> = store
                .variations(&full_key)
                .into_iter()
                .filter(|v| slot.is_none_or(|s| v.slot == s))
                .collect();

            if variations.is_empty() {
                bail!("No variation stored for {} in slot {:?}", full_key, slot);
            }

            println!("🔎 {}", full_key);
            for variation in &variations {
                println!(
                    "\n── slot {} (created {}, {} days old) ──",
                    variation.slot,
                    variation.metadata.created_at.to_rfc3339(),
                    variation.age_days()
                );
                println!("{}", serde_json::to_string_pretty(&variation.plan)?);
            }
        }

        CacheAction::Stats => {
            println!("📊 Cache statistics");
            println!("   Directory: {}", cache_dir.display());

            let stats = store.stats();

            println!("\nSize:");
            println!("   Keys: {}", stats.keys);
            println!("   Variations: {}", stats.variations);
            println!("   Total size: {} KB ({} bytes)", stats.total_size_bytes / 1024, stats.total_size_bytes);

            println!("\nConfiguration:");
            println!("   Enabled: {}", config.cache.enabled);
            println!("   Max variations per key: {}", config.cache.max_variations);
            println!("   Fresh generation probability: {:.0}%", config.cache.fresh_probability * 100.0);
            println!("   Schema version: {}", store.version());
            match config.cache.max_age_days {
                Some(days) => println!("   Max age: {} days", days),
                None => println!("   Max age: unlimited"),
            }

            if stats.keys == 0 {
                println!("\n💡 Cache is empty");
            } else {
                let fill = stats.variations as f64 / (stats.keys * config.cache.max_variations) as f64 * 100.0;
                println!("\n📈 Slot usage: {:.1}% of capacity for cached keys", fill);
            }
        }

        CacheAction::Clear { yes } => {
            println!("🗑️  Clear all cache");
            println!("   Directory: {}", cache_dir.display());

            let stats = store.stats();
            println!(
                "\n⚠️  Warning: This will delete ALL {} variations across {} keys",
                stats.variations, stats.keys
            );

            if !yes {
                print!("   Continue? [y/N]: ");
                io::stdout().flush()?;

                let mut input = String::new();
                io::stdin().read_line(&mut input)?;

                if !input.trim().eq_ignore_ascii_case("y") {
                    println!("   Aborted");
                    return Ok(());
                }
            }

            let removed = store.clear_all()?;
            println!("\n✅ Removed {} variations", removed);
        }

        CacheAction::Purge => {
            println!("🧹 Cache purge");
            println!("   Directory: {}", cache_dir.display());

            let policy = config.to_cleanup_policy();
            println!("\nPolicy:");
            println!("   Remove version mismatch: {}", policy.remove_version_mismatch);
            if let Some(days) = policy.max_age_days {
                println!("   Max age: {} days", days);
            }

            let stats = store.purge_invalid(&config.to_validator())?;
            println!("\n✅ Purge complete");
            println!("   Scanned {} files", stats.scanned_count);
            println!("   Removed {} invalid entries", stats.removed_count);
            println!("   Freed {} bytes", stats.freed_bytes);
        }
    }

    Ok(())
}

/// Expand a unique key prefix to the full cache key
fn resolve_key(store: &VariationStore, prefix: &str) -> Result<String> {
    let prefix = prefix.trim().trim_end_matches('…').to_ascii_lowercase();
    if prefix.is_empty() {
        bail!("Cache key must not be empty");
    }

    let matches: Vec<String> = store.keys().into_iter().filter(|k| k.starts_with(&prefix)).collect();
    match matches.as_slice() {
        [key] => Ok(key.clone()),
        [] => bail!("No cached key matches {}", prefix),
        many => bail!("{} cached keys match {}, use a longer prefix", many.len(), prefix),
    }
}
