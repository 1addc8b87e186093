pub mod args;
pub mod commands;
pub mod root;
pub mod ui;

pub use args::{Args, CacheAction, Commands, GenerateArgs, validate_generate_args};
pub use root::RootCommand;
