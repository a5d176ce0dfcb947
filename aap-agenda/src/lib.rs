pub mod cli;
pub mod file_store;
pub mod load_config;

pub use cli::{run, Cli, Commands};
