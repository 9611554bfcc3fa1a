pub mod commands;
pub mod config;

pub use commands::{execute, print_json, CliCommand};
pub use config::CliConfig;
