pub mod cache;
pub mod generate;
pub mod stats;

pub use cache::handle_cache_command;
pub use generate::run_generate_command;
pub use stats::run_stats_command;
