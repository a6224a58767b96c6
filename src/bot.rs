use crate::config::Config;
use crate::editor::availability::AvailabilityWorkflow;
use crate::editor::interests::InterestsWorkflow;
use crate::editor::languages::LanguagesWorkflow;
use crate::editor::Editor;
use crate::handlers;
use crate::i18n::t;
use crate::session_store::SessionStore;
use crate::storage::ProfileStore;
use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, ChatId, Message, User};
use tracing::{error, info};

/// Всё, что нужно обработчикам: хранилища, редакторы и настройки
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn ProfileStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub languages: Editor<LanguagesWorkflow>,
    pub interests: Editor<InterestsWorkflow>,
    pub availability: Editor<AvailabilityWorkflow>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn ProfileStore>, sessions: Arc<dyn SessionStore>) -> Self {
        let ttl = config.session_ttl;
        Self {
            languages: Editor::new(LanguagesWorkflow, sessions.clone(), ttl),
            interests: Editor::new(InterestsWorkflow, sessions.clone(), ttl),
            availability: Editor::new(AvailabilityWorkflow, sessions.clone(), ttl),
            config,
            store,
            sessions,
        }
    }
}

pub async fn start_bot(bot: Bot, state: Arc<AppState>) -> Result<()> {
    info!("Bot is starting...");

    let state_clone1 = state.clone();
    let state_clone2 = state.clone();
    let state_clone3 = state.clone();
    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter(|msg: Message| {
                    if let Some(text) = msg.text() {
                        text.starts_with('/')
                    } else {
                        false
                    }
                })
                .endpoint(move |bot: Bot, msg: Message| {
                    let state = state_clone1.clone();
                    async move { handle_commands(bot, msg, state).await }
                }),
        )
        .branch(
            Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
                let state = state_clone2.clone();
                async move { handle_callback(bot, q, state).await }
            }),
        )
        .branch(Update::filter_message().endpoint(move |bot: Bot, msg: Message| {
            let state = state_clone3.clone();
            async move { handle_messages(bot, msg, state).await }
        }));

    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

/// Логирует ошибку обработчика и показывает пользователю общее сообщение на его языке
async fn report_failure(
    bot: &Bot,
    chat_id: ChatId,
    state: &AppState,
    user: Option<&User>,
    context: &str,
    e: anyhow::Error,
) -> ResponseResult<()> {
    error!("Error handling {}: {:#}", context, e);
    let text = match user {
        Some(user) => handlers::failure_text(state, user.id.0 as i64, user.language_code.as_deref()).await,
        None => t(&state.config.default_language, "error.generic"),
    };
    bot.send_message(chat_id, text).await?;
    Ok(())
}

async fn handle_commands(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let text = msg.text().unwrap_or_default();
    // `/start@my_bot` в группах
    let command = text
        .split_whitespace()
        .next()
        .unwrap_or("")
        .split('@')
        .next()
        .unwrap_or("")
        .to_string();

    let chat_id = msg.chat.id;
    let user = msg.from().cloned();
    let result = match command.as_str() {
        "/start" => handlers::handle_start(bot.clone(), msg, &state).await,
        "/help" => handlers::handle_help(bot.clone(), msg, &state).await,
        "/profile" => handlers::handle_profile(bot.clone(), msg, &state).await,
        "/feedback" => handlers::handle_feedback_command(bot.clone(), msg, &state).await,
        "/admin" => handlers::handle_admin_command(bot.clone(), msg, &state).await,
        _ => {
            // Неизвестная команда, игнорируем
            Ok(())
        }
    };

    if let Err(e) = result {
        report_failure(&bot, chat_id, &state, user.as_ref(), &command, e).await?;
    }
    Ok(())
}

async fn handle_callback(bot: Bot, q: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    let chat_id = q.message.as_ref().map(|m| m.chat.id);
    let payload = q.data.clone().unwrap_or_default();
    let user = q.from.clone();

    if let Err(e) = handlers::handle_callback(bot.clone(), q, &state).await {
        match chat_id {
            Some(chat_id) => report_failure(&bot, chat_id, &state, Some(&user), &payload, e).await?,
            None => error!("Error handling callback {}: {:#}", payload, e),
        }
    }
    Ok(())
}

async fn handle_messages(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let chat_id = msg.chat.id;
    let user = msg.from().cloned();
    if let Err(e) = handlers::handle_message(bot.clone(), msg, &state).await {
        report_failure(&bot, chat_id, &state, user.as_ref(), "message", e).await?;
    }
    Ok(())
}
