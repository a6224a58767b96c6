use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, Message, MessageId, ParseMode};
use teloxide::{ApiError, RequestError};
use tracing::{debug, info, warn};

use crate::admin;
use crate::bot::AppState;
use crate::callback::{CallbackData, EditorAction, ProfileAction};
use crate::editor::render::{render, render_report, summary_lines, Button, Screen};
use crate::editor::{Editor, Workflow};
use crate::error::EditorError;
use crate::feedback::{self, FeedbackOutcome, MAX_FEEDBACK_CHARS};
use crate::i18n::{self, t, t_args};
use crate::models::{Language, NewUser, UserState};
use crate::storage::ProfileStore;
use crate::utils::{escape_html, to_markup};

/// Какой раздел профиля редактируется
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditTarget {
    Languages,
    Interests,
    Availability,
}

impl EditTarget {
    /// Следующий раздел в анкете нового пользователя
    pub fn next_in_onboarding(self) -> Option<Self> {
        match self {
            Self::Languages => Some(Self::Interests),
            Self::Interests => Some(Self::Availability),
            Self::Availability => None,
        }
    }
}

/// Ответ на нажатие кнопки редактора
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorReply {
    /// Перерисовать текущее сообщение
    Screen(Screen),
    /// Всплывающее предупреждение, сообщение не меняется
    Alert(String),
    /// Сессия закрыта: заменить сообщение текстом и при необходимости открыть следующий экран
    Finished { text: String, next: Option<Screen> },
}

/// Язык ответа: выбранный в профиле, затем язык клиента Telegram, затем язык по умолчанию
pub async fn user_lang(state: &AppState, user_id: i64, telegram_code: Option<&str>) -> Result<String> {
    if let Some(code) = state.store.get_user(user_id).await?.and_then(|u| u.interface_code()) {
        return Ok(code.to_string());
    }
    if let Some(code) = telegram_code.and_then(i18n::supported) {
        return Ok(code.to_string());
    }
    Ok(state.config.default_language.clone())
}

/// Общее сообщение об ошибке на языке пользователя; если язык не удалось узнать, на языке по умолчанию
pub async fn failure_text(state: &AppState, user_id: i64, telegram_code: Option<&str>) -> String {
    let lang = match user_lang(state, user_id, telegram_code).await {
        Ok(lang) => lang,
        Err(e) => {
            warn!("Failed to resolve language of user {}: {:#}", user_id, e);
            state.config.default_language.clone()
        }
    };
    t(&lang, "error.generic")
}

async fn open_editor<W: Workflow>(
    editor: &Editor<W>,
    store: &dyn ProfileStore,
    user_id: i64,
    lang: &str,
) -> Result<Screen> {
    let session = editor.begin(store, user_id).await?;
    Ok(render(editor.workflow(), &session, lang))
}

/// Начинает новую сессию редактирования раздела и возвращает её первый экран
pub async fn open(state: &AppState, target: EditTarget, user_id: i64, lang: &str) -> Result<Screen> {
    let store = state.store.as_ref();
    match target {
        EditTarget::Languages => open_editor(&state.languages, store, user_id, lang).await,
        EditTarget::Interests => open_editor(&state.interests, store, user_id, lang).await,
        EditTarget::Availability => open_editor(&state.availability, store, user_id, lang).await,
    }
}

/// Ошибки, которые показываются пользователю; остальные уходят выше
fn recover(err: EditorError, lang: &str) -> Result<EditorReply> {
    match err {
        EditorError::SessionNotFound => Ok(EditorReply::Finished {
            text: t(lang, err.message_key()),
            next: None,
        }),
        EditorError::Validation(_) => Ok(EditorReply::Alert(t(lang, err.message_key()))),
        EditorError::UnknownField(_)
        | EditorError::UnknownOption { .. }
        | EditorError::WrongKind(_)
        | EditorError::UnknownStep(_) => {
            warn!("Rejected editor input: {}", err);
            Ok(EditorReply::Alert(t(lang, "error.generic")))
        }
        other => Err(other.into()),
    }
}

async fn drive<W: Workflow>(
    editor: &Editor<W>,
    target: EditTarget,
    state: &AppState,
    user_id: i64,
    lang: &str,
    action: EditorAction,
) -> Result<EditorReply> {
    let workflow = editor.workflow();
    let session = match action {
        EditorAction::Toggle { field, value } => editor.toggle(user_id, &field, &value).await,
        EditorAction::Select { field, value } => editor.select(user_id, &field, &value).await,
        EditorAction::Goto(step) => editor.goto(user_id, &step).await,
        EditorAction::Save => return save(editor, target, state, user_id, lang).await,
        EditorAction::Cancel => {
            return match editor.abort(user_id).await {
                Ok(()) => Ok(EditorReply::Finished {
                    text: t(lang, "common.discarded"),
                    next: None,
                }),
                Err(e) => recover(e, lang),
            }
        }
    };

    match session {
        Ok(session) => Ok(EditorReply::Screen(render(workflow, &session, lang))),
        Err(e) => recover(e, lang),
    }
}

async fn save<W: Workflow>(
    editor: &Editor<W>,
    target: EditTarget,
    state: &AppState,
    user_id: i64,
    lang: &str,
) -> Result<EditorReply> {
    let onboarding = state
        .store
        .get_user(user_id)
        .await?
        .map_or(false, |u| u.state == UserState::Onboarding);

    let report = match editor.commit(state.store.as_ref(), user_id).await {
        Ok(report) => report,
        Err(e) => return recover(e, lang),
    };
    let mut text = render_report(editor.workflow(), &report, lang);
    if !onboarding {
        return Ok(EditorReply::Finished { text, next: None });
    }

    // язык интерфейса мог только что смениться
    let lang = user_lang(state, user_id, Some(lang)).await?;
    let next = match target.next_in_onboarding() {
        Some(next) => Some(open(state, next, user_id, &lang).await?),
        None => {
            info!("User {} finished onboarding", user_id);
            text.push_str("\n\n");
            text.push_str(&t(&lang, "onboarding.complete"));
            None
        }
    };
    Ok(EditorReply::Finished { text, next })
}

/// Применяет действие к сессии редактора по короткому имени сценария.
/// `None`, если такого сценария нет.
pub async fn editor_callback(
    state: &AppState,
    user_id: i64,
    lang: &str,
    short_tag: &str,
    action: EditorAction,
) -> Result<Option<EditorReply>> {
    let reply = if short_tag == state.languages.workflow().short_tag() {
        drive(&state.languages, EditTarget::Languages, state, user_id, lang, action).await?
    } else if short_tag == state.interests.workflow().short_tag() {
        drive(&state.interests, EditTarget::Interests, state, user_id, lang, action).await?
    } else if short_tag == state.availability.workflow().short_tag() {
        drive(&state.availability, EditTarget::Availability, state, user_id, lang, action).await?
    } else {
        return Ok(None);
    };
    Ok(Some(reply))
}

async fn profile_section<W: Workflow>(
    workflow: &W,
    store: &dyn ProfileStore,
    user_id: i64,
    lang: &str,
) -> Result<Vec<String>> {
    let values = workflow.load(store, user_id).await?;
    let mut lines = vec![String::new(), t(lang, &format!("editor.{}.title", workflow.tag()))];
    lines.extend(summary_lines(workflow, &values, lang));
    Ok(lines)
}

/// Профиль: сводка по всем трём разделам и кнопки для их изменения
pub async fn profile_screen(state: &AppState, user_id: i64, lang: &str) -> Result<Screen> {
    let store = state.store.as_ref();
    let mut lines = vec![t(lang, "profile.title")];
    lines.extend(profile_section(state.languages.workflow(), store, user_id, lang).await?);
    lines.extend(profile_section(state.interests.workflow(), store, user_id, lang).await?);
    lines.extend(profile_section(state.availability.workflow(), store, user_id, lang).await?);

    let edit = |key: &str, action: ProfileAction| vec![Button::new(t(lang, key), &CallbackData::Profile(action))];
    Ok(Screen {
        text: lines.join("\n"),
        keyboard: vec![
            edit("profile.edit_languages", ProfileAction::Languages),
            edit("profile.edit_interests", ProfileAction::Interests),
            edit("profile.edit_availability", ProfileAction::Availability),
        ],
    })
}

async fn send_screen(bot: &Bot, chat_id: ChatId, screen: &Screen) -> ResponseResult<()> {
    bot.send_message(chat_id, &screen.text)
        .parse_mode(ParseMode::Html)
        .reply_markup(to_markup(screen))
        .await?;
    Ok(())
}

async fn send_text(bot: &Bot, chat_id: ChatId, text: &str) -> ResponseResult<()> {
    bot.send_message(chat_id, text).parse_mode(ParseMode::Html).await?;
    Ok(())
}

/// Telegram отвечает ошибкой, если текст и клавиатура не изменились
fn ignore_not_modified(result: Result<Message, RequestError>) -> ResponseResult<()> {
    match result {
        Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
        Err(e) => Err(e),
    }
}

async fn edit_screen(bot: &Bot, chat_id: ChatId, message_id: MessageId, screen: &Screen) -> ResponseResult<()> {
    let result = bot
        .edit_message_text(chat_id, message_id, &screen.text)
        .parse_mode(ParseMode::Html)
        .reply_markup(to_markup(screen))
        .await;
    ignore_not_modified(result)
}

async fn edit_text(bot: &Bot, chat_id: ChatId, message_id: MessageId, text: &str) -> ResponseResult<()> {
    let result = bot
        .edit_message_text(chat_id, message_id, text)
        .parse_mode(ParseMode::Html)
        .await;
    ignore_not_modified(result)
}

pub async fn handle_start(bot: Bot, msg: Message, state: &AppState) -> Result<()> {
    let Some(from) = msg.from() else {
        return Ok(());
    };
    let user_id = from.id.0 as i64;
    let interface_language = from
        .language_code
        .as_deref()
        .and_then(i18n::supported)
        .and_then(|code| code.parse::<Language>().ok());

    let profile = state
        .store
        .ensure_user(&NewUser {
            id: user_id,
            username: from.username.clone(),
            first_name: from.first_name.clone(),
            interface_language,
        })
        .await?;
    let lang = user_lang(state, user_id, from.language_code.as_deref()).await?;
    let name = escape_html(&profile.first_name);
    info!("User {} started the bot ({:?})", user_id, profile.state);

    match profile.state {
        UserState::Onboarding => {
            send_text(&bot, msg.chat.id, &t_args(&lang, "start.welcome", &[("name", &name)])).await?;
            let screen = open(state, EditTarget::Languages, user_id, &lang).await?;
            send_screen(&bot, msg.chat.id, &screen).await?;
        }
        UserState::Active => {
            send_text(&bot, msg.chat.id, &t_args(&lang, "start.welcome_back", &[("name", &name)])).await?;
            let screen = profile_screen(state, user_id, &lang).await?;
            send_screen(&bot, msg.chat.id, &screen).await?;
        }
    }
    Ok(())
}

pub async fn handle_help(bot: Bot, msg: Message, state: &AppState) -> Result<()> {
    let from = msg.from();
    let lang = match from {
        Some(user) => user_lang(state, user.id.0 as i64, user.language_code.as_deref()).await?,
        None => state.config.default_language.clone(),
    };
    bot.send_message(msg.chat.id, t(&lang, "help.text"))
        .parse_mode(ParseMode::Html)
        .reply_to_message_id(msg.id)
        .await?;
    Ok(())
}

pub async fn handle_profile(bot: Bot, msg: Message, state: &AppState) -> Result<()> {
    let Some(from) = msg.from() else {
        return Ok(());
    };
    let user_id = from.id.0 as i64;
    let lang = user_lang(state, user_id, from.language_code.as_deref()).await?;

    if state.store.get_user(user_id).await?.is_none() {
        send_text(&bot, msg.chat.id, &t(&lang, "profile.not_registered")).await?;
        return Ok(());
    }
    let screen = profile_screen(state, user_id, &lang).await?;
    send_screen(&bot, msg.chat.id, &screen).await?;
    Ok(())
}

pub async fn handle_feedback_command(bot: Bot, msg: Message, state: &AppState) -> Result<()> {
    let Some(from) = msg.from() else {
        return Ok(());
    };
    let user_id = from.id.0 as i64;
    let lang = user_lang(state, user_id, from.language_code.as_deref()).await?;

    feedback::arm(state.sessions.as_ref(), user_id, state.config.session_ttl).await?;
    send_text(&bot, msg.chat.id, &t(&lang, "feedback.prompt")).await?;
    Ok(())
}

pub async fn handle_admin_command(bot: Bot, msg: Message, state: &AppState) -> Result<()> {
    let Some(from) = msg.from() else {
        return Ok(());
    };
    let user_id = from.id.0 as i64;
    let lang = user_lang(state, user_id, from.language_code.as_deref()).await?;

    if !state.config.is_admin(user_id) {
        warn!("User {} requested the admin panel without access", user_id);
        send_text(&bot, msg.chat.id, &t(&lang, "admin.denied")).await?;
        return Ok(());
    }
    send_screen(&bot, msg.chat.id, &admin::menu(&lang)).await?;
    Ok(())
}

/// Обычное текстовое сообщение: отзыв, если его ждём, иначе подсказка
pub async fn handle_message(bot: Bot, msg: Message, state: &AppState) -> Result<()> {
    let (Some(from), Some(text)) = (msg.from(), msg.text()) else {
        return Ok(());
    };
    let user_id = from.id.0 as i64;
    let lang = user_lang(state, user_id, from.language_code.as_deref()).await?;

    let outcome = feedback::submit(
        state.sessions.as_ref(),
        state.store.as_ref(),
        user_id,
        from.username.as_deref(),
        text,
    )
    .await?;

    let reply = match outcome {
        FeedbackOutcome::NotPending => {
            debug!("Ignoring free text from user {}", user_id);
            t(&lang, "help.text")
        }
        FeedbackOutcome::Empty => t(&lang, "feedback.empty"),
        FeedbackOutcome::TooLong => t_args(&lang, "feedback.too_long", &[("max", &MAX_FEEDBACK_CHARS.to_string())]),
        FeedbackOutcome::Saved(_) => t(&lang, "feedback.thanks"),
    };
    send_text(&bot, msg.chat.id, &reply).await?;
    Ok(())
}

pub async fn handle_callback(bot: Bot, q: CallbackQuery, state: &AppState) -> Result<()> {
    let user_id = q.from.id.0 as i64;
    let lang = user_lang(state, user_id, q.from.language_code.as_deref()).await?;

    let Some(data) = q.data.as_deref().and_then(CallbackData::parse) else {
        warn!("Ignoring unknown callback payload {:?} from user {}", q.data, user_id);
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };
    let Some(message) = q.message.as_ref() else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };
    let (chat_id, message_id) = (message.chat.id, message.id);

    match data {
        CallbackData::Editor { tag, action } => {
            let Some(reply) = editor_callback(state, user_id, &lang, &tag, action).await? else {
                warn!("Ignoring callback for unknown editor {:?}", tag);
                bot.answer_callback_query(q.id.clone()).await?;
                return Ok(());
            };
            match reply {
                EditorReply::Alert(text) => {
                    bot.answer_callback_query(q.id.clone()).text(text).show_alert(true).await?;
                }
                EditorReply::Screen(screen) => {
                    bot.answer_callback_query(q.id.clone()).await?;
                    edit_screen(&bot, chat_id, message_id, &screen).await?;
                }
                EditorReply::Finished { text, next } => {
                    bot.answer_callback_query(q.id.clone()).await?;
                    edit_text(&bot, chat_id, message_id, &text).await?;
                    if let Some(screen) = next {
                        send_screen(&bot, chat_id, &screen).await?;
                    }
                }
            }
        }
        CallbackData::Profile(action) => {
            bot.answer_callback_query(q.id.clone()).await?;
            let screen = match action {
                ProfileAction::Show => profile_screen(state, user_id, &lang).await?,
                ProfileAction::Languages => open(state, EditTarget::Languages, user_id, &lang).await?,
                ProfileAction::Interests => open(state, EditTarget::Interests, user_id, &lang).await?,
                ProfileAction::Availability => open(state, EditTarget::Availability, user_id, &lang).await?,
            };
            edit_screen(&bot, chat_id, message_id, &screen).await?;
        }
        CallbackData::Admin(action) => {
            if !state.config.is_admin(user_id) {
                warn!("User {} pressed an admin button without access", user_id);
                bot.answer_callback_query(q.id.clone())
                    .text(t(&lang, "admin.denied"))
                    .show_alert(true)
                    .await?;
                return Ok(());
            }
            bot.answer_callback_query(q.id.clone()).await?;
            let screen = admin::handle(state.store.as_ref(), action, &lang).await?;
            edit_screen(&bot, chat_id, message_id, &screen).await?;
        }
    }
    Ok(())
}
