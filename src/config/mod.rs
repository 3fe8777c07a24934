//! Configuration loading and merging
//!
//! Precedence is CLI > environment > config file > defaults.

pub mod loader;
pub mod merge;

pub use loader::{apply_env, load_config, load_file_config, ENV_PREFIX};
pub use merge::{merge_cli_with_config, CliOverrides};
