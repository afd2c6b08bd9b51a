//! Shared configuration for opencode-courier.
//!
//! Currently this is path resolution: where the bot keeps its state, which
//! env file to load, and helpers to create the directory tree on startup.

pub mod config;

pub use config::{
    config_dir, ensure_all_dirs, ensure_runtime_state_dir, ensure_state_dir, env_file, logs_dir,
    runtime_state_dir, state_dir, users_dir,
};
