//! Telegram bot interface for OpenCode Courier.
//!
//! This crate provides a Telegram bot that keeps a per-user registry of
//! coding sessions and forwards every plain message to the active session
//! on an OpenCode server, sending the agent's reply back into the chat.
//!
//! # Features
//!
//! - Per-user sessions: create, list, switch, rename, delete
//! - Lazy default session: just sending a message works
//! - Provider and model selection backed by the server's catalog
//! - Optional display of the agent's reasoning blocks
//!
//! # Environment Variables
//!
//! Required:
//! - `TELEGRAM_BOT_TOKEN`: Bot token from @BotFather
//!
//! Optional:
//! - `OPENCODE_API_URL`: OpenCode server URL (default: http://localhost:8000)
//! - `COURIER_STATE_DIR`: State directory (default: ~/.opencode-courier)
//!
//! # Example
//!
//! ```no_run
//! use courier_telegram::CourierBot;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Initialize with state directory
//!     let state_dir = Path::new("/path/to/state");
//!     let bot = CourierBot::new(state_dir)?;
//!
//!     // Start in polling mode
//!     bot.start_polling().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Commands
//!
//! - `/start` - Welcome message and help
//! - `/help` - Show available commands
//! - `/new_session [label]` - Create a session and make it active
//! - `/list_sessions` - List sessions, active one marked
//! - `/switch_session <id>` - Change the active session
//! - `/delete_session <id>` - Delete a session
//! - `/rename_session <label>` - Relabel the active session
//! - `/status` - Show the active session and settings
//! - `/providers` - Pick a provider and model interactively
//! - `/model <provider>/<model>` - Set the model directly
//! - `/thinking` - Toggle display of the agent's reasoning
//! - `/settings` - Preference menu with inline toggles
//! - `/debug <description>` - Ask the agent to debug an issue
//! - `/refactor [focus]` - Ask the agent to refactor the code
//! - `/version` - Show the bot version and agent server status

pub mod bot;
pub mod error;
pub mod format;
pub mod handlers;
pub mod state;

pub use bot::CourierBot;
pub use error::{Result, TelegramError};
pub use state::{create_shared_state, BotState, ForwardReply};
