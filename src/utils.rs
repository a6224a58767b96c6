use chrono::{DateTime, Utc};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::editor::render::Screen;

/// Экранирует пользовательский текст для ParseMode::Html
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Обрезает строку по символам (не байтам), добавляя многоточие
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{}…", truncated)
}

pub fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// Переводит экран в inline-клавиатуру Telegram
pub fn to_markup(screen: &Screen) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = screen
        .keyboard
        .iter()
        .map(|row| {
            row.iter()
                .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.data.clone()))
                .collect()
        })
        .collect();
    InlineKeyboardMarkup::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::render::Button;
    use teloxide::types::InlineKeyboardButtonKind;

    #[test]
    fn escapes_html_markup() {
        assert_eq!(escape_html("<b>A & B</b>"), "&lt;b&gt;A &amp; B&lt;/b&gt;");
    }

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate_chars("привет", 10), "привет");
        assert_eq!(truncate_chars("привет мир", 5), "прив…");
    }

    #[test]
    fn markup_keeps_rows_and_payloads() {
        let screen = Screen {
            text: String::new(),
            keyboard: vec![
                vec![
                    Button {
                        label: "a".into(),
                        data: "ed:av:save".into(),
                    },
                    Button {
                        label: "b".into(),
                        data: "ed:av:cancel".into(),
                    },
                ],
                vec![Button {
                    label: "c".into(),
                    data: "pf:show".into(),
                }],
            ],
        };

        let markup = to_markup(&screen);
        assert_eq!(markup.inline_keyboard.len(), 2);
        assert_eq!(markup.inline_keyboard[0].len(), 2);
        assert!(matches!(
            &markup.inline_keyboard[1][0].kind,
            InlineKeyboardButtonKind::CallbackData(data) if data == "pf:show"
        ));
    }
}
