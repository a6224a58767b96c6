//! Панель администратора: просмотр и разбор отзывов, статистика.

use anyhow::Result;
use tracing::info;

use crate::callback::{AdminAction, CallbackData};
use crate::editor::render::{Button, Screen};
use crate::i18n::{t, t_args};
use crate::models::{FeedbackFilter, FeedbackItem};
use crate::storage::ProfileStore;
use crate::utils::{escape_html, format_date, truncate_chars};

pub const PAGE_SIZE: i64 = 5;
const PREVIEW_CHARS: usize = 32;

fn button(label: String, action: AdminAction) -> Button {
    Button::new(label, &CallbackData::Admin(action))
}

fn menu_row(lang: &str) -> Vec<Button> {
    vec![button(t(lang, "admin.menu"), AdminAction::Menu)]
}

pub fn menu(lang: &str) -> Screen {
    Screen {
        text: t(lang, "admin.title"),
        keyboard: vec![
            vec![button(
                t(lang, "admin.new"),
                AdminAction::List {
                    filter: FeedbackFilter::Unprocessed,
                    page: 0,
                },
            )],
            vec![button(
                t(lang, "admin.all"),
                AdminAction::List {
                    filter: FeedbackFilter::All,
                    page: 0,
                },
            )],
            vec![button(t(lang, "admin.stats"), AdminAction::Stats)],
        ],
    }
}

fn page_count(total: i64) -> u32 {
    ((total + PAGE_SIZE - 1) / PAGE_SIZE).max(1) as u32
}

fn status(lang: &str, item: &FeedbackItem) -> String {
    if item.processed {
        t(lang, "admin.status_processed")
    } else {
        t(lang, "admin.status_new")
    }
}

pub async fn list(store: &dyn ProfileStore, filter: FeedbackFilter, page: u32, lang: &str) -> Result<Screen> {
    let total = store.count_feedback(filter).await?;
    let pages = page_count(total);
    // после отметки последнего элемента страница может исчезнуть
    let page = page.min(pages - 1);
    let items = store
        .list_feedback(filter, PAGE_SIZE, i64::from(page) * PAGE_SIZE)
        .await?;

    let title = match filter {
        FeedbackFilter::Unprocessed => t(lang, "admin.list_new"),
        FeedbackFilter::All => t(lang, "admin.list_all"),
    };
    let mut lines = vec![title];
    if items.is_empty() {
        lines.push(t(lang, "admin.empty"));
    } else {
        lines.push(t_args(
            lang,
            "admin.page",
            &[("page", &(page + 1).to_string()), ("pages", &pages.to_string())],
        ));
    }

    let mut keyboard: Vec<Vec<Button>> = items
        .iter()
        .map(|item| {
            let mark = if item.processed { "✅" } else { "🆕" };
            let label = format!("{} #{} {}", mark, item.id, truncate_chars(&item.text, PREVIEW_CHARS));
            vec![button(
                label,
                AdminAction::View {
                    id: item.id,
                    filter,
                    page,
                },
            )]
        })
        .collect();

    let mut paging = Vec::new();
    if page > 0 {
        paging.push(button(t(lang, "admin.prev"), AdminAction::List { filter, page: page - 1 }));
    }
    if page + 1 < pages {
        paging.push(button(t(lang, "admin.next"), AdminAction::List { filter, page: page + 1 }));
    }
    if !paging.is_empty() {
        keyboard.push(paging);
    }
    keyboard.push(menu_row(lang));

    Ok(Screen {
        text: lines.join("\n"),
        keyboard,
    })
}

pub async fn view(store: &dyn ProfileStore, id: i64, filter: FeedbackFilter, page: u32, lang: &str) -> Result<Screen> {
    let back = vec![button(t(lang, "admin.back"), AdminAction::List { filter, page })];

    let Some(item) = store.get_feedback(id).await? else {
        return Ok(Screen {
            text: t(lang, "admin.not_found"),
            keyboard: vec![back],
        });
    };

    let user = match &item.username {
        Some(username) => format!("@{} ({})", escape_html(username), item.user_id),
        None => item.user_id.to_string(),
    };
    let text = t_args(
        lang,
        "admin.item",
        &[
            ("id", &item.id.to_string()),
            ("user", &user),
            ("date", &format_date(&item.created_at)),
            ("status", &status(lang, &item)),
            ("text", &escape_html(&item.text)),
        ],
    );

    let (label, processed) = if item.processed {
        (t(lang, "admin.mark_unprocessed"), false)
    } else {
        (t(lang, "admin.mark_processed"), true)
    };
    let mark = button(
        label,
        AdminAction::Mark {
            id,
            processed,
            filter,
            page,
        },
    );

    Ok(Screen {
        text,
        keyboard: vec![vec![mark], back],
    })
}

pub async fn stats(store: &dyn ProfileStore, lang: &str) -> Result<Screen> {
    let stats = store.stats().await?;
    let text = t_args(
        lang,
        "admin.stats_text",
        &[
            ("users_total", &stats.users_total.to_string()),
            ("users_active", &stats.users_active.to_string()),
            ("feedback_total", &stats.feedback_total.to_string()),
            ("feedback_unprocessed", &stats.feedback_unprocessed.to_string()),
        ],
    );
    Ok(Screen {
        text,
        keyboard: vec![menu_row(lang)],
    })
}

/// Экран для нажатой кнопки панели
pub async fn handle(store: &dyn ProfileStore, action: AdminAction, lang: &str) -> Result<Screen> {
    match action {
        AdminAction::Menu => Ok(menu(lang)),
        AdminAction::Stats => stats(store, lang).await,
        AdminAction::List { filter, page } => list(store, filter, page, lang).await,
        AdminAction::View { id, filter, page } => view(store, id, filter, page, lang).await,
        AdminAction::Mark {
            id,
            processed,
            filter,
            page,
        } => {
            store.set_feedback_processed(id, processed).await?;
            info!("Feedback #{} marked processed={}", id, processed);
            view(store, id, filter, page, lang).await
        }
    }
}
