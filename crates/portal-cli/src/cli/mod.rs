pub mod commands;
pub mod config;

pub use commands::{run_list, run_mark_read, run_watch};
pub use config::{default_config_path, resolve, Overrides};
