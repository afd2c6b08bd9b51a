//! Command and message handlers for the Telegram bot.

use std::sync::Arc;

use courier_agent::{PromptReply, ProviderCatalog};
use courier_models::{Session, SessionId, UserId, UserPreferences};
use courier_registry::RegistryError;
use teloxide::prelude::*;
use teloxide::types::{
    CallbackQuery, ChatAction, ChatId, InlineKeyboardButton, InlineKeyboardMarkup, MessageId,
    ParseMode,
};
use teloxide::utils::command::BotCommands;
use tracing::{debug, error, info};

use crate::format::{html_escape, split_message, truncate};
use crate::state::{BotState, ForwardReply};

/// Bot commands.
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "snake_case", description = "Available commands:")]
pub enum Command {
    #[command(description = "Start the bot and get help")]
    Start,
    #[command(description = "Show help message")]
    Help,
    #[command(description = "Create a session and make it active: /new_session [label]")]
    NewSession(String),
    #[command(description = "List your sessions")]
    ListSessions,
    #[command(description = "Switch the active session: /switch_session <id>")]
    SwitchSession(String),
    #[command(description = "Delete a session: /delete_session <id>")]
    DeleteSession(String),
    #[command(description = "Relabel the active session: /rename_session <label>")]
    RenameSession(String),
    #[command(description = "Show the active session and settings")]
    Status,
    #[command(description = "Pick a provider and model")]
    Providers,
    #[command(description = "Set the model directly: /model <provider>/<model>")]
    Model(String),
    #[command(description = "Toggle display of the agent's reasoning")]
    Thinking,
    #[command(description = "Open the settings menu")]
    Settings,
    #[command(description = "Ask the agent to debug an issue: /debug <description>")]
    Debug(String),
    #[command(description = "Ask the agent to refactor the code: /refactor [focus]")]
    Refactor(String),
    #[command(description = "Show the bot version and agent server status")]
    Version,
}

/// Dispatch a parsed command to its handler.
pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: Arc<BotState>,
) -> ResponseResult<()> {
    match cmd {
        Command::Start => handle_start(bot, msg, state).await,
        Command::Help => handle_help(bot, msg).await,
        Command::NewSession(label) => handle_new_session(bot, msg, state, label).await,
        Command::ListSessions => handle_list_sessions(bot, msg, state).await,
        Command::SwitchSession(arg) => handle_switch_session(bot, msg, state, arg).await,
        Command::DeleteSession(arg) => handle_delete_session(bot, msg, state, arg).await,
        Command::RenameSession(label) => handle_rename_session(bot, msg, state, label).await,
        Command::Status => handle_status(bot, msg, state).await,
        Command::Providers => handle_providers(bot, msg, state).await,
        Command::Model(arg) => handle_model(bot, msg, state, arg).await,
        Command::Thinking => handle_thinking(bot, msg, state).await,
        Command::Settings => handle_settings(bot, msg, state).await,
        Command::Debug(description) => handle_debug(bot, msg, state, description).await,
        Command::Refactor(focus) => handle_refactor(bot, msg, state, focus).await,
        Command::Version => handle_version(bot, msg, state).await,
    }
}

/// Sessions are keyed by the sending user; channel posts without a sender
/// fall back to the chat id.
fn user_of(msg: &Message) -> UserId {
    msg.from
        .as_ref()
        .map(|u| UserId::new(u.id.0 as i64))
        .unwrap_or_else(|| UserId::new(msg.chat.id.0))
}

/// Handle the /start command.
pub async fn handle_start(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    info!(chat_id = %msg.chat.id, user = ?msg.from.as_ref().map(|u| &u.username), "Received /start");

    let welcome = format!(
        "Welcome to OpenCode Courier! 🚀\n\n\
         I forward your messages to an OpenCode coding agent and send its \
         replies back here.\n\n\
         <b>Getting started:</b>\n\
         1. Just send a message to talk to your active session\n\
         2. Use /new_session to start a fresh conversation\n\
         3. Use /providers to pick a provider and model\n\n\
         <b>Agent server:</b> <code>{}</code>\n\n\
         Type /help for all commands.",
        html_escape(state.agent().base_url())
    );

    bot.send_message(msg.chat.id, welcome)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Handle the /help command.
pub async fn handle_help(bot: Bot, msg: Message) -> ResponseResult<()> {
    bot.send_message(msg.chat.id, Command::descriptions().to_string())
        .await?;
    Ok(())
}

/// Handle the /new_session command.
pub async fn handle_new_session(
    bot: Bot,
    msg: Message,
    state: Arc<BotState>,
    label: String,
) -> ResponseResult<()> {
    let user = user_of(&msg);
    let label = label.trim();
    let label = (!label.is_empty()).then(|| label.to_string());

    match state.registry().create_session(user, label).await {
        Ok(session) => {
            bot.send_message(
                msg.chat.id,
                format!(
                    "✅ Created session <b>{}</b>\n<b>ID:</b> <code>{}</code>\n\n\
                     It is active now; just send a message to talk to the agent.",
                    html_escape(&session.title()),
                    session.id
                ),
            )
            .parse_mode(ParseMode::Html)
            .await?;
            info!(chat_id = %msg.chat.id, session = %session.id, "User created session");
        }
        Err(e) => {
            error!(chat_id = %msg.chat.id, error = %e, "Session creation failed");
            bot.send_message(msg.chat.id, format!("❌ Could not create session: {}", e))
                .await?;
        }
    }
    Ok(())
}

/// Handle the /list_sessions command.
pub async fn handle_list_sessions(
    bot: Bot,
    msg: Message,
    state: Arc<BotState>,
) -> ResponseResult<()> {
    let user = user_of(&msg);
    let sessions = state.registry().list_sessions(user).await;

    if sessions.is_empty() {
        bot.send_message(
            msg.chat.id,
            "No sessions yet.\n\nSend any message or use /new_session to start one.",
        )
        .await?;
        return Ok(());
    }

    let active = state.registry().active_session_id(user).await;
    let text = sessions_overview(&sessions, active.as_ref());
    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Handle the /switch_session command.
///
/// Without an argument, offers the sessions as an inline keyboard.
pub async fn handle_switch_session(
    bot: Bot,
    msg: Message,
    state: Arc<BotState>,
    arg: String,
) -> ResponseResult<()> {
    let user = user_of(&msg);
    let arg = arg.trim();

    if arg.is_empty() {
        let sessions = state.registry().list_sessions(user).await;
        if sessions.is_empty() {
            bot.send_message(
                msg.chat.id,
                "No sessions yet.\n\nSend any message or use /new_session to start one.",
            )
            .await?;
            return Ok(());
        }
        let active = state.registry().active_session_id(user).await;
        let keyboard = sessions_keyboard(&sessions, active.as_ref());
        bot.send_message(msg.chat.id, "Pick a session to activate:")
            .reply_markup(keyboard)
            .await?;
        return Ok(());
    }

    let id = SessionId::from_string(arg);
    match state.registry().switch_session(user, &id).await {
        Ok(session) => {
            bot.send_message(
                msg.chat.id,
                format!("🔄 Switched to <b>{}</b>", html_escape(&session.title())),
            )
            .parse_mode(ParseMode::Html)
            .await?;
            info!(chat_id = %msg.chat.id, session = %session.id, "User switched session");
        }
        Err(RegistryError::SessionNotFound(_)) => {
            bot.send_message(
                msg.chat.id,
                format!(
                    "❌ Session not found: <code>{}</code>\n\nUse /list_sessions to see yours.",
                    html_escape(arg)
                ),
            )
            .parse_mode(ParseMode::Html)
            .await?;
        }
        Err(e) => {
            error!(chat_id = %msg.chat.id, error = %e, "Switch failed");
            bot.send_message(msg.chat.id, format!("❌ Error: {}", e))
                .await?;
        }
    }
    Ok(())
}

/// Handle the /delete_session command.
pub async fn handle_delete_session(
    bot: Bot,
    msg: Message,
    state: Arc<BotState>,
    arg: String,
) -> ResponseResult<()> {
    let user = user_of(&msg);
    let arg = arg.trim();

    if arg.is_empty() {
        bot.send_message(
            msg.chat.id,
            "Please specify a session.\n\n<b>Usage:</b> <code>/delete_session &lt;id&gt;</code>\n\n\
             Use /list_sessions to see ids.",
        )
        .parse_mode(ParseMode::Html)
        .await?;
        return Ok(());
    }

    let id = SessionId::from_string(arg);
    match state.registry().delete_session(user, &id).await {
        Ok(()) => {
            state.forget_remote(&id).await;
            let followup = match state.registry().active_session_id(user).await {
                Some(active) => format!("Active session is now <code>{}</code>.", active),
                None => "No sessions left; your next message starts a fresh one.".to_string(),
            };
            bot.send_message(
                msg.chat.id,
                format!("🗑 Deleted <code>{}</code>\n{}", html_escape(arg), followup),
            )
            .parse_mode(ParseMode::Html)
            .await?;
            info!(chat_id = %msg.chat.id, session = %arg, "User deleted session");
        }
        Err(RegistryError::SessionNotFound(_)) => {
            bot.send_message(
                msg.chat.id,
                format!(
                    "❌ Session not found: <code>{}</code>\n\nUse /list_sessions to see yours.",
                    html_escape(arg)
                ),
            )
            .parse_mode(ParseMode::Html)
            .await?;
        }
        Err(e) => {
            error!(chat_id = %msg.chat.id, error = %e, "Delete failed");
            bot.send_message(msg.chat.id, format!("❌ Error: {}", e))
                .await?;
        }
    }
    Ok(())
}

/// Handle the /rename_session command. Relabels the active session.
pub async fn handle_rename_session(
    bot: Bot,
    msg: Message,
    state: Arc<BotState>,
    label: String,
) -> ResponseResult<()> {
    let user = user_of(&msg);
    let label = label.trim();

    if label.is_empty() {
        bot.send_message(
            msg.chat.id,
            "Please provide a label.\n\n<b>Usage:</b> <code>/rename_session &lt;label&gt;</code>",
        )
        .parse_mode(ParseMode::Html)
        .await?;
        return Ok(());
    }

    let session = match state.registry().get_active_session(user).await {
        Ok(session) => session,
        Err(e) => {
            bot.send_message(msg.chat.id, format!("❌ Error: {}", e))
                .await?;
            return Ok(());
        }
    };

    match state
        .registry()
        .rename_session(user, &session.id, Some(label.to_string()))
        .await
    {
        Ok(renamed) => {
            bot.send_message(
                msg.chat.id,
                format!(
                    "✏️ Renamed <code>{}</code> to <b>{}</b>",
                    renamed.id,
                    html_escape(label)
                ),
            )
            .parse_mode(ParseMode::Html)
            .await?;
        }
        Err(e) => {
            bot.send_message(msg.chat.id, format!("❌ Error: {}", e))
                .await?;
        }
    }
    Ok(())
}

/// Handle the /status command.
pub async fn handle_status(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let user = user_of(&msg);
    let sessions = state.registry().list_sessions(user).await;
    let active = state.registry().active_session_id(user).await;
    let prefs = state.registry().preferences(user).await;

    let active_line = match active
        .as_ref()
        .and_then(|id| sessions.iter().find(|s| &s.id == id))
    {
        Some(session) => format!(
            "🟢 Active: <b>{}</b> (<code>{}</code>)",
            html_escape(&session.title()),
            session.id
        ),
        None => "💤 Active: none (your next message starts one)".to_string(),
    };
    let model_line = match prefs.selection() {
        Some((provider, model)) => format!("<code>{}/{}</code>", provider, model),
        None => "agent default".to_string(),
    };

    let status = format!(
        "📊 <b>Status</b>\n\n{}\n🗂 Sessions: {}\n🤖 Model: {}\n🧠 Thinking display: {}\n\
         🔌 Agent server: <code>{}</code>",
        active_line,
        sessions.len(),
        model_line,
        if prefs.show_thinking { "on" } else { "off" },
        html_escape(state.agent().base_url()),
    );

    bot.send_message(msg.chat.id, status)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Handle the /providers command. Shows connected providers as buttons.
pub async fn handle_providers(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let user = user_of(&msg);
    let prefs = state.registry().preferences(user).await;

    match state.agent().providers().await {
        Ok(catalog) => {
            let (text, keyboard) = providers_view(&prefs, &catalog);
            let request = bot.send_message(msg.chat.id, text).parse_mode(ParseMode::Html);
            match keyboard {
                Some(keyboard) => request.reply_markup(keyboard).await?,
                None => request.await?,
            };
        }
        Err(e) => {
            error!(chat_id = %msg.chat.id, error = %e, "Provider catalog fetch failed");
            bot.send_message(
                msg.chat.id,
                format!("❌ Could not reach the agent server: {}", e),
            )
            .await?;
        }
    }
    Ok(())
}

/// Handle the /model command: `/model <provider>/<model>`.
pub async fn handle_model(
    bot: Bot,
    msg: Message,
    state: Arc<BotState>,
    arg: String,
) -> ResponseResult<()> {
    let user = user_of(&msg);
    let arg = arg.trim();

    if arg.is_empty() {
        // No argument: offer the interactive picker instead.
        return handle_providers(bot, msg, state).await;
    }

    let Some((provider_id, model_id)) = arg.split_once('/') else {
        bot.send_message(
            msg.chat.id,
            "Usage: <code>/model &lt;provider&gt;/&lt;model&gt;</code>\n\n\
             Example: <code>/model anthropic/claude-sonnet-4</code>\n\
             Use /providers to browse what is available.",
        )
        .parse_mode(ParseMode::Html)
        .await?;
        return Ok(());
    };

    let catalog = match state.agent().providers().await {
        Ok(catalog) => catalog,
        Err(e) => {
            error!(chat_id = %msg.chat.id, error = %e, "Provider catalog fetch failed");
            bot.send_message(
                msg.chat.id,
                format!("❌ Could not reach the agent server: {}", e),
            )
            .await?;
            return Ok(());
        }
    };

    let Some(provider) = catalog
        .find(provider_id)
        .filter(|_| catalog.is_connected(provider_id))
    else {
        bot.send_message(
            msg.chat.id,
            format!(
                "❌ Provider <code>{}</code> not found or not connected.\n\
                 Use /providers to see what is available.",
                html_escape(provider_id)
            ),
        )
        .parse_mode(ParseMode::Html)
        .await?;
        return Ok(());
    };

    if !provider.models.contains_key(model_id) {
        let shown: Vec<&str> = provider.model_ids().take(5).collect();
        let more = provider.models.len().saturating_sub(shown.len());
        let mut listing = shown.join(", ");
        if more > 0 {
            listing.push_str(&format!(" ... and {} more", more));
        }
        bot.send_message(
            msg.chat.id,
            format!(
                "❌ Model <code>{}</code> not found for <code>{}</code>.\nAvailable: {}",
                html_escape(model_id),
                html_escape(provider_id),
                html_escape(&listing)
            ),
        )
        .parse_mode(ParseMode::Html)
        .await?;
        return Ok(());
    }

    match state.registry().set_model(user, provider_id, model_id).await {
        Ok(()) => {
            bot.send_message(
                msg.chat.id,
                format!(
                    "✅ Now using <code>{}/{}</code>",
                    html_escape(provider_id),
                    html_escape(model_id)
                ),
            )
            .parse_mode(ParseMode::Html)
            .await?;
        }
        Err(e) => {
            bot.send_message(msg.chat.id, format!("❌ Could not save selection: {}", e))
                .await?;
        }
    }
    Ok(())
}

/// Handle the /thinking command.
pub async fn handle_thinking(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let user = user_of(&msg);
    let text = match state.registry().toggle_thinking(user).await {
        Ok(true) => {
            "🧠 Thinking display is ON. Reasoning blocks will be shown before replies.".to_string()
        }
        Ok(false) => "🧠 Thinking display is OFF.".to_string(),
        Err(e) => format!("❌ Error: {}", e),
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

/// Handle the /settings command. Shows the preference menu.
pub async fn handle_settings(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let user = user_of(&msg);
    let prefs = state.registry().preferences(user).await;
    let sessions = state.registry().list_sessions(user).await;
    let active = state.registry().active_session_id(user).await;
    let active = active
        .as_ref()
        .and_then(|id| sessions.iter().find(|s| &s.id == id));

    let (text, keyboard) = settings_view(&prefs, active);
    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

/// Handle the /debug command: wrap the description in a debugging prompt
/// and forward it like any other message.
pub async fn handle_debug(
    bot: Bot,
    msg: Message,
    state: Arc<BotState>,
    description: String,
) -> ResponseResult<()> {
    let description = description.trim();
    if description.is_empty() {
        bot.send_message(
            msg.chat.id,
            "Please describe the error or issue.\n\n\
             <b>Usage:</b> <code>/debug &lt;description&gt;</code>\n\
             Example: <code>/debug the parser panics on empty input</code>",
        )
        .parse_mode(ParseMode::Html)
        .await?;
        return Ok(());
    }

    let user = user_of(&msg);
    info!(chat_id = %msg.chat.id, "Debug request");
    forward_and_reply(&bot, &msg, &state, user, &debug_prompt(description)).await
}

/// Handle the /refactor command. The argument narrows the focus; without
/// one the agent is asked for general improvements.
pub async fn handle_refactor(
    bot: Bot,
    msg: Message,
    state: Arc<BotState>,
    focus: String,
) -> ResponseResult<()> {
    let user = user_of(&msg);
    info!(chat_id = %msg.chat.id, "Refactor request");
    forward_and_reply(&bot, &msg, &state, user, &refactor_prompt(focus.trim())).await
}

/// Handle the /version command.
pub async fn handle_version(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let agent_line = match state.agent().providers().await {
        Ok(catalog) => format!("reachable, {} provider(s) connected", catalog.connected.len()),
        Err(e) => format!("unreachable: {}", truncate(&e.to_string(), 120)),
    };

    bot.send_message(
        msg.chat.id,
        format!(
            "🤖 OpenCode Courier v{}\n🔌 Agent server: {} ({})",
            env!("CARGO_PKG_VERSION"),
            state.agent().base_url(),
            agent_line
        ),
    )
    .await?;
    Ok(())
}

/// The forwarded prompt for /debug.
fn debug_prompt(description: &str) -> String {
    format!(
        "Debug this issue: {}\n\nFind the cause, fix it, and summarize what was wrong.",
        description
    )
}

/// The forwarded prompt for /refactor.
fn refactor_prompt(focus: &str) -> String {
    let focus = if focus.is_empty() {
        "general improvements"
    } else {
        focus
    };
    format!(
        "Refactor the code in this session. Focus: {}\n\n\
         Apply the changes and summarize what you improved.",
        focus
    )
}

/// Handle a plain text message: forward it to the active session.
pub async fn handle_message(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let user = user_of(&msg);
    debug!(chat_id = %msg.chat.id, len = text.len(), "Forwarding message");
    forward_and_reply(&bot, &msg, &state, user, text).await
}

/// Forward a prompt through the registry to the agent, keeping the user
/// informed with a status message that is removed or edited at the end.
async fn forward_and_reply(
    bot: &Bot,
    msg: &Message,
    state: &BotState,
    user: UserId,
    prompt: &str,
) -> ResponseResult<()> {
    bot.send_chat_action(msg.chat.id, ChatAction::Typing).await?;
    let status = bot
        .send_message(
            msg.chat.id,
            "⏳ Forwarded to the agent. This can take a few minutes.",
        )
        .await?;

    match state.forward(user, prompt).await {
        Ok(outcome) => {
            let _ = bot.delete_message(msg.chat.id, status.id).await;
            send_reply(bot, msg.chat.id, &outcome).await?;
        }
        Err(e) => {
            error!(chat_id = %msg.chat.id, error = %e, "Forwarding failed");
            let error_text = format!(
                "❌ <b>Agent request failed</b>\n\n<pre>{}</pre>",
                html_escape(&truncate(&e.to_string(), 500))
            );
            let edited = bot
                .edit_message_text(msg.chat.id, status.id, &error_text)
                .parse_mode(ParseMode::Html)
                .await;
            if edited.is_err() {
                bot.send_message(msg.chat.id, error_text)
                    .parse_mode(ParseMode::Html)
                    .await?;
            }
        }
    }
    Ok(())
}

/// Send the agent's reply, reasoning first when enabled, split into
/// Telegram-sized chunks.
async fn send_reply(bot: &Bot, chat_id: ChatId, outcome: &ForwardReply) -> ResponseResult<()> {
    let messages = reply_messages(&outcome.reply, outcome.show_thinking);
    let has_answer = messages.iter().any(|(_, is_reasoning)| !is_reasoning);

    for (chunk, is_reasoning) in messages {
        if is_reasoning {
            bot.send_message(chat_id, format!("🤔 <i>{}</i>", html_escape(&chunk)))
                .parse_mode(ParseMode::Html)
                .await?;
        } else {
            // Answers go out as plain text; agent output routinely contains
            // characters that break Telegram's markup parsers.
            bot.send_message(chat_id, chunk).await?;
        }
    }

    if !has_answer {
        bot.send_message(
            chat_id,
            "⚠️ The agent returned an empty reply. Try rephrasing, or check the server logs.",
        )
        .await?;
    }
    Ok(())
}

/// The chunks to send for one reply, in order, flagged as reasoning or
/// answer. Reasoning is dropped entirely when the user has it hidden.
fn reply_messages(reply: &PromptReply, show_thinking: bool) -> Vec<(String, bool)> {
    let mut out = Vec::new();
    if show_thinking {
        for block in reply.reasoning() {
            for chunk in split_message(block) {
                out.push((chunk, true));
            }
        }
    }
    let text = reply.text();
    if !text.trim().is_empty() {
        for chunk in split_message(&text) {
            out.push((chunk, false));
        }
    }
    out
}

/// Handle an inline keyboard callback.
pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<BotState>,
) -> ResponseResult<()> {
    let user = UserId::new(q.from.id.0 as i64);
    let data = q.data.clone().unwrap_or_default();
    let target = q.message.as_ref().map(|m| (m.chat().id, m.id()));

    let Some((chat_id, message_id)) = target else {
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    };
    debug!(chat_id = %chat_id, data = %data, "Callback received");

    if let Some(raw_id) = data.strip_prefix("switch:") {
        let id = SessionId::from_string(raw_id);
        match state.registry().switch_session(user, &id).await {
            Ok(session) => {
                bot.answer_callback_query(q.id)
                    .text(format!("Switched to {}", session.title()))
                    .await?;
                bot.edit_message_text(
                    chat_id,
                    message_id,
                    format!("🔄 Active session: <b>{}</b>", html_escape(&session.title())),
                )
                .parse_mode(ParseMode::Html)
                .await?;
            }
            Err(e) => {
                bot.answer_callback_query(q.id)
                    .text(format!("❌ {}", e))
                    .show_alert(true)
                    .await?;
            }
        }
    } else if let Some(provider_id) = data.strip_prefix("provider:") {
        let catalog = match state.agent().providers().await {
            Ok(catalog) => catalog,
            Err(e) => {
                bot.answer_callback_query(q.id)
                    .text(format!("❌ {}", e))
                    .show_alert(true)
                    .await?;
                return Ok(());
            }
        };

        // Picking a provider selects its first model right away; the model
        // keyboard then lets the user refine.
        let first_model = catalog
            .find(provider_id)
            .filter(|_| catalog.is_connected(provider_id))
            .and_then(|p| p.model_ids().next().map(str::to_string));
        let Some(model) = first_model else {
            bot.answer_callback_query(q.id)
                .text("❌ Provider not available")
                .show_alert(true)
                .await?;
            return Ok(());
        };

        if let Err(e) = state.registry().set_model(user, provider_id, model).await {
            bot.answer_callback_query(q.id)
                .text(format!("❌ {}", e))
                .show_alert(true)
                .await?;
            return Ok(());
        }

        let prefs = state.registry().preferences(user).await;
        let (text, keyboard) = models_view(&prefs, &catalog, provider_id);
        edit_view(&bot, chat_id, message_id, text, keyboard).await?;
        bot.answer_callback_query(q.id).await?;
    } else if let Some(rest) = data.strip_prefix("model:") {
        // Model buttons carry an index into the provider's stable model
        // listing; the id itself can blow Telegram's 64-byte data cap.
        let parsed = rest
            .rsplit_once(':')
            .and_then(|(provider_id, index)| Some((provider_id, index.parse::<usize>().ok()?)));
        let Some((provider_id, index)) = parsed else {
            bot.answer_callback_query(q.id).await?;
            return Ok(());
        };

        let catalog = match state.agent().providers().await {
            Ok(catalog) => catalog,
            Err(e) => {
                bot.answer_callback_query(q.id)
                    .text(format!("❌ {}", e))
                    .show_alert(true)
                    .await?;
                return Ok(());
            }
        };
        let model_id = catalog
            .find(provider_id)
            .filter(|_| catalog.is_connected(provider_id))
            .and_then(|p| p.model_ids().nth(index).map(str::to_string));
        let Some(model_id) = model_id else {
            bot.answer_callback_query(q.id)
                .text("❌ Model not available")
                .show_alert(true)
                .await?;
            return Ok(());
        };

        if let Err(e) = state
            .registry()
            .set_model(user, provider_id, model_id.clone())
            .await
        {
            bot.answer_callback_query(q.id)
                .text(format!("❌ {}", e))
                .show_alert(true)
                .await?;
            return Ok(());
        }

        let prefs = state.registry().preferences(user).await;
        let (text, keyboard) = models_view(&prefs, &catalog, provider_id);
        edit_view(&bot, chat_id, message_id, text, keyboard).await?;
        bot.answer_callback_query(q.id)
            .text(format!("✅ Selected {}", model_id))
            .await?;
    } else if data == "settings:thinking" {
        let enabled = match state.registry().toggle_thinking(user).await {
            Ok(enabled) => enabled,
            Err(e) => {
                bot.answer_callback_query(q.id)
                    .text(format!("❌ {}", e))
                    .show_alert(true)
                    .await?;
                return Ok(());
            }
        };

        let prefs = state.registry().preferences(user).await;
        let sessions = state.registry().list_sessions(user).await;
        let active_id = state.registry().active_session_id(user).await;
        let active = active_id
            .as_ref()
            .and_then(|id| sessions.iter().find(|s| &s.id == id));
        let (text, keyboard) = settings_view(&prefs, active);
        edit_view(&bot, chat_id, message_id, text, Some(keyboard)).await?;
        bot.answer_callback_query(q.id)
            .text(format!(
                "Thinking display turned {}",
                if enabled { "ON" } else { "OFF" }
            ))
            .await?;
    } else if data == "providers:back" {
        let catalog = match state.agent().providers().await {
            Ok(catalog) => catalog,
            Err(e) => {
                bot.answer_callback_query(q.id)
                    .text(format!("❌ {}", e))
                    .show_alert(true)
                    .await?;
                return Ok(());
            }
        };
        let prefs = state.registry().preferences(user).await;
        let (text, keyboard) = providers_view(&prefs, &catalog);
        edit_view(&bot, chat_id, message_id, text, keyboard).await?;
        bot.answer_callback_query(q.id).await?;
    } else {
        debug!(data = %data, "Ignoring unknown callback");
        bot.answer_callback_query(q.id).await?;
    }
    Ok(())
}

async fn edit_view(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    text: String,
    keyboard: Option<InlineKeyboardMarkup>,
) -> ResponseResult<()> {
    let request = bot
        .edit_message_text(chat_id, message_id, text)
        .parse_mode(ParseMode::Html);
    match keyboard {
        Some(keyboard) => request.reply_markup(keyboard).await?,
        None => request.await?,
    };
    Ok(())
}

/// The session list as HTML, active session marked.
fn sessions_overview(sessions: &[Session], active: Option<&SessionId>) -> String {
    let mut text = String::from("📋 <b>Your sessions:</b>\n\n");
    for session in sessions {
        let marker = if active == Some(&session.id) { " 🟢" } else { "" };
        text.push_str(&format!(
            "• <b>{}</b>{}\n  <code>{}</code>\n  Created: {}\n",
            html_escape(&session.title()),
            marker,
            session.id,
            session.created_at.format("%Y-%m-%d %H:%M UTC"),
        ));
    }
    text.push_str("\nUse /switch_session to change the active one.");
    text
}

/// One button per session, callback data `switch:<id>`.
fn sessions_keyboard(sessions: &[Session], active: Option<&SessionId>) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = sessions
        .iter()
        .map(|session| {
            let marker = if active == Some(&session.id) { "🟢 " } else { "" };
            vec![InlineKeyboardButton::callback(
                format!("{}{}", marker, session.title()),
                format!("switch:{}", session.id),
            )]
        })
        .collect();
    InlineKeyboardMarkup::new(rows)
}

/// The provider picker: connected providers only, current choice marked.
fn providers_view(
    prefs: &UserPreferences,
    catalog: &ProviderCatalog,
) -> (String, Option<InlineKeyboardMarkup>) {
    let connected: Vec<_> = catalog
        .all
        .iter()
        .filter(|p| catalog.is_connected(&p.id))
        .collect();

    if connected.is_empty() {
        return (
            "⚠️ No connected providers on the agent server.\n\n\
             Connect one in OpenCode, then try again."
                .to_string(),
            None,
        );
    }

    let current = prefs
        .selection()
        .map(|(p, m)| format!("{}/{}", p, m))
        .unwrap_or_else(|| "agent default".to_string());
    let text = format!(
        "<b>Current selection:</b> <code>{}</code>\n\nSelect a provider:",
        html_escape(&current)
    );

    let rows: Vec<Vec<InlineKeyboardButton>> = connected
        .iter()
        .map(|provider| {
            let marker = if prefs.provider.as_deref() == Some(provider.id.as_str()) {
                "✅ "
            } else {
                ""
            };
            vec![InlineKeyboardButton::callback(
                format!("{}{}", marker, provider.display_name()),
                format!("provider:{}", provider.id),
            )]
        })
        .collect();

    (text, Some(InlineKeyboardMarkup::new(rows)))
}

/// The model picker for one provider, with a back button.
fn models_view(
    prefs: &UserPreferences,
    catalog: &ProviderCatalog,
    provider_id: &str,
) -> (String, Option<InlineKeyboardMarkup>) {
    let Some(provider) = catalog
        .find(provider_id)
        .filter(|_| catalog.is_connected(provider_id))
    else {
        return ("❌ Provider not available.".to_string(), None);
    };
    if provider.models.is_empty() {
        return (
            format!("❌ Provider {} has no models.", provider.display_name()),
            None,
        );
    }

    let text = format!(
        "<b>Select a model for {}:</b>",
        html_escape(provider.display_name())
    );

    // Buttons carry the model's position in the stable listing; callback
    // data is capped at 64 bytes and model ids can exceed it.
    let mut rows: Vec<Vec<InlineKeyboardButton>> = provider
        .model_ids()
        .enumerate()
        .map(|(index, model_id)| {
            let marker = if prefs.provider.as_deref() == Some(provider_id)
                && prefs.model.as_deref() == Some(model_id)
            {
                "✅ "
            } else {
                ""
            };
            vec![InlineKeyboardButton::callback(
                format!("{}{}", marker, model_id),
                format!("model:{}:{}", provider_id, index),
            )]
        })
        .collect();
    rows.push(vec![InlineKeyboardButton::callback(
        "« Back to providers",
        "providers:back",
    )]);

    (text, Some(InlineKeyboardMarkup::new(rows)))
}

/// The settings menu: preference summary plus toggle buttons.
fn settings_view(
    prefs: &UserPreferences,
    active: Option<&Session>,
) -> (String, InlineKeyboardMarkup) {
    let session_line = match active {
        Some(session) => format!(
            "<b>{}</b> (<code>{}</code>)",
            html_escape(&session.title()),
            session.id.short()
        ),
        None => "none".to_string(),
    };
    let model_line = match prefs.selection() {
        Some((provider, model)) => format!("<code>{}/{}</code>", provider, model),
        None => "agent default".to_string(),
    };

    let text = format!(
        "⚙️ <b>Settings</b>\n\n\
         • Thinking display: {}\n\
         • Model: {}\n\
         • Active session: {}\n\n\
         Use the buttons below to change settings.",
        if prefs.show_thinking { "ON" } else { "OFF" },
        model_line,
        session_line
    );

    let toggle_label = if prefs.show_thinking {
        "✅ Thinking display ON"
    } else {
        "❌ Thinking display OFF"
    };
    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            toggle_label,
            "settings:thinking",
        )],
        vec![InlineKeyboardButton::callback(
            "🌐 Provider and model",
            "providers:back",
        )],
    ]);
    (text, keyboard)
}
