//! Configuration paths.
//!
//! All bot state lives under `~/.opencode-courier/`:
//!
//! ```text
//! ~/.opencode-courier/
//! ├── config/       # .env.local and user configuration
//! ├── logs/         # Application logs
//! └── state/        # Runtime state
//!     └── users/    # One JSON file of session state per user
//! ```
//!
//! # Environment Variables
//!
//! - `COURIER_STATE_DIR`: Override the base state directory
//! - `COURIER_CONFIG_DIR`: Override the config directory
//! - `COURIER_LOG_DIR`: Override the log directory

use std::path::PathBuf;
use std::sync::OnceLock;

/// Environment variable for a custom state directory.
pub const STATE_DIR_ENV: &str = "COURIER_STATE_DIR";

/// Environment variable for a custom config directory.
pub const CONFIG_DIR_ENV: &str = "COURIER_CONFIG_DIR";

/// Environment variable for a custom log directory.
pub const LOG_DIR_ENV: &str = "COURIER_LOG_DIR";

/// Default state directory name under home.
const DEFAULT_STATE_DIR: &str = ".opencode-courier";

const CONFIG_SUBDIR: &str = "config";
const LOGS_SUBDIR: &str = "logs";
const STATE_SUBDIR: &str = "state";
const USERS_SUBDIR: &str = "users";

static STATE_DIR_CACHE: OnceLock<PathBuf> = OnceLock::new();

/// Get the base state directory.
///
/// Resolution order:
/// 1. `COURIER_STATE_DIR` environment variable if set
/// 2. `~/.opencode-courier` if a home directory is available
/// 3. `.opencode-courier` in the current directory as a fallback
pub fn state_dir() -> PathBuf {
    STATE_DIR_CACHE
        .get_or_init(|| {
            std::env::var(STATE_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    dirs::home_dir()
                        .map(|h| h.join(DEFAULT_STATE_DIR))
                        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR))
                })
        })
        .clone()
}

/// Get the user config directory.
///
/// Defaults to `~/.opencode-courier/config/` or `COURIER_CONFIG_DIR`.
pub fn config_dir() -> PathBuf {
    std::env::var(CONFIG_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| state_dir().join(CONFIG_SUBDIR))
}

/// Get the logs directory.
///
/// Defaults to `~/.opencode-courier/logs/` or `COURIER_LOG_DIR`.
pub fn logs_dir() -> PathBuf {
    std::env::var(LOG_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| state_dir().join(LOGS_SUBDIR))
}

/// Get the runtime state directory.
///
/// Base path for the registry store and other runtime files.
pub fn runtime_state_dir() -> PathBuf {
    state_dir().join(STATE_SUBDIR)
}

/// Get the per-user session state directory.
pub fn users_dir() -> PathBuf {
    runtime_state_dir().join(USERS_SUBDIR)
}

/// Get the `.env.local` file path.
///
/// Environment file for secrets (bot token, agent URL).
pub fn env_file() -> PathBuf {
    config_dir().join(".env.local")
}

/// Ensure the state directory and all subdirectories exist.
///
/// # Errors
/// Returns an error if any directory cannot be created.
pub fn ensure_all_dirs() -> std::io::Result<()> {
    std::fs::create_dir_all(config_dir())?;
    std::fs::create_dir_all(logs_dir())?;
    std::fs::create_dir_all(runtime_state_dir())?;
    std::fs::create_dir_all(users_dir())?;
    Ok(())
}

/// Ensure the base state directory exists.
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn ensure_state_dir() -> std::io::Result<()> {
    let dir = state_dir();
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
    }
    Ok(())
}

/// Ensure the runtime state directory exists.
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn ensure_runtime_state_dir() -> std::io::Result<()> {
    let dir = runtime_state_dir();
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
    }
    Ok(())
}
