//! OpenCode Courier Telegram bot binary.
//!
//! Start the bot with:
//! ```bash
//! TELEGRAM_BOT_TOKEN=xxx cargo run -p courier-telegram
//! ```

use clap::Parser;
use courier_core::config;
use courier_telegram::CourierBot;
use tracing_subscriber::EnvFilter;

/// OpenCode Courier - drive an OpenCode coding agent from Telegram
#[derive(Parser, Debug)]
#[command(name = "courier-telegram")]
#[command(about = "Telegram bot that forwards your messages to an OpenCode agent")]
struct Args {
    /// Verbose logging (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load environment variables from config directory first
    let env_path = config::env_file();
    if env_path.exists() {
        let _ = dotenvy::from_path(&env_path);
    }
    // Also try local .env.local or .env
    let _ = dotenvy::from_filename(".env.local").or_else(|_| dotenvy::dotenv());

    // Initialize logging based on verbosity
    let filter = match args.verbose {
        0 => "courier_telegram=info,courier_registry=info,teloxide=warn",
        1 => "courier_telegram=debug,courier_registry=debug,teloxide=info",
        2 => "courier_telegram=trace,courier_registry=trace,teloxide=debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Ensure all directories exist
    if let Err(e) = config::ensure_all_dirs() {
        tracing::warn!(error = %e, "Failed to create all directories");
    }

    // Session state lives under the runtime state directory
    let state_dir = config::runtime_state_dir();

    // Create the bot
    let bot = CourierBot::new(&state_dir)?;

    // Get bot info
    match bot.get_me().await {
        Ok(username) => {
            tracing::info!(username = %username, "Bot initialized successfully");
            println!("\n[robot] OpenCode Courier");
            println!("   Bot: @{}", username);
            println!("   State: {}", state_dir.display());
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to get bot info");
            return Err(e.into());
        }
    }

    println!("\n[phone] Open Telegram and send /start to begin");
    println!("   Press Ctrl+C to stop\n");

    // Start the bot
    bot.start_polling().await?;

    Ok(())
}
