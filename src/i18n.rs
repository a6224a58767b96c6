use std::collections::HashMap;

use fluent_templates::{fluent_bundle::FluentValue, static_loader, Loader};
use once_cell::sync::Lazy;
use tracing::warn;
use unic_langid::LanguageIdentifier;

/// Язык интерфейса по умолчанию
pub const DEFAULT_LANG: &str = "ru";

/// Языки, для которых есть каталоги в `locales/`
pub const SUPPORTED_LANGS: &[&str] = &["ru", "en"];

static_loader! {
    static LOCALES = {
        locales: "./locales",
        fallback_language: "ru",
        // без Unicode-изоляции вокруг аргументов: текст уходит в Telegram как есть
        customise: |bundle| bundle.set_use_isolating(false),
    };
}

static DEFAULT_LANG_ID: Lazy<LanguageIdentifier> = Lazy::new(|| DEFAULT_LANG.parse().unwrap_or_default());

fn lang_id(lang: &str) -> LanguageIdentifier {
    lang.parse().unwrap_or_else(|_| DEFAULT_LANG_ID.clone())
}

/// `common.save` -> `common.save`, `editor.availability.title` -> `editor.availability_title`:
/// первый сегмент ключа это сообщение Fluent, остальное его атрибут
fn text_id(key: &str) -> String {
    match key.split_once('.') {
        Some((message, attribute)) => format!("{}.{}", message, attribute.replace('.', "_")),
        None => key.to_string(),
    }
}

/// Приводит код языка из Telegram (`en-US`, `ru`) к поддерживаемому, если он есть
pub fn supported(code: &str) -> Option<&'static str> {
    let base = code.split(['-', '_']).next().unwrap_or_default().to_lowercase();
    SUPPORTED_LANGS.iter().copied().find(|c| *c == base)
}

/// Явный поиск: `None`, если ключа нет ни в языке, ни в запасном каталоге
pub fn lookup(lang: &str, key: &str) -> Option<String> {
    LOCALES
        .lookup(&lang_id(lang), &text_id(key))
        .map(|text| text.replace("\\n", "\n"))
}

fn lookup_with_args(lang: &str, key: &str, args: &HashMap<String, FluentValue>) -> Option<String> {
    LOCALES
        .lookup_with_args(&lang_id(lang), &text_id(key), args)
        .map(|text| text.replace("\\n", "\n"))
}

/// Строка для пользователя: сначала его язык, затем язык по умолчанию.
/// Если ключ не найден нигде, возвращает сам ключ и пишет предупреждение.
pub fn t(lang: &str, key: &str) -> String {
    if let Some(text) = lookup(lang, key).or_else(|| lookup(DEFAULT_LANG, key)) {
        return text;
    }
    warn!("Missing translation for key {} ({})", key, lang);
    key.to_string()
}

/// То же, что `t`, с аргументами Fluent (`{ $name }`)
pub fn t_args(lang: &str, key: &str, args: &[(&str, &str)]) -> String {
    let args: HashMap<String, FluentValue> = args
        .iter()
        .map(|(name, value)| (name.to_string(), FluentValue::from(value.to_string())))
        .collect();

    if let Some(text) = lookup_with_args(lang, key, &args).or_else(|| lookup_with_args(DEFAULT_LANG, key, &args)) {
        return text;
    }
    warn!("Missing translation for key {} ({})", key, lang);
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    // Ключи каталога в виде `message.attribute`
    fn catalog_keys(source: &str) -> BTreeSet<String> {
        let mut keys = BTreeSet::new();
        let mut message = String::new();
        for line in source.lines() {
            if let Some(rest) = line.strip_prefix("    .") {
                if let Some((attribute, _)) = rest.split_once(" =") {
                    keys.insert(format!("{}.{}", message, attribute));
                }
            } else if let Some((name, _)) = line.split_once(" =") {
                message = name.to_string();
            }
        }
        keys
    }

    #[test]
    fn catalogs_share_the_same_keys() {
        let ru = catalog_keys(include_str!("../locales/ru/main.ftl"));
        let en = catalog_keys(include_str!("../locales/en/main.ftl"));
        assert!(ru.len() > 100);
        let missing: Vec<_> = ru.symmetric_difference(&en).collect();
        assert!(missing.is_empty(), "keys missing in one catalog: {:?}", missing);
    }

    #[test]
    fn lookup_reports_misses_explicitly() {
        assert_eq!(lookup("en", "common.save").as_deref(), Some("💾 Save"));
        assert_eq!(lookup("en", "no.such.key"), None);
        assert_eq!(lookup("en", "common.no_such_attribute"), None);
    }

    #[test]
    fn nested_keys_map_to_attributes() {
        assert_eq!(text_id("editor.availability.title"), "editor.availability_title");
        assert_eq!(text_id("common.save"), "common.save");
        assert!(lookup("en", "editor.availability.title").is_some());
        assert!(lookup("ru", "prompt.availability.specific_days").is_some());
    }

    #[test]
    fn t_falls_back_to_default_language_then_key() {
        assert_eq!(t("xx", "common.save"), t(DEFAULT_LANG, "common.save"));
        assert_eq!(t("not a language", "common.save"), t(DEFAULT_LANG, "common.save"));
        assert_eq!(t("en", "no.such.key"), "no.such.key");
    }

    #[test]
    fn t_args_substitutes_placeholders() {
        let text = t_args("en", "admin.page", &[("page", "2"), ("pages", "5")]);
        assert!(text.contains('2'));
        assert!(text.contains('5'));
        assert!(!text.contains("$page"));
        assert!(!text.contains('\u{2068}'));
    }

    #[test]
    fn escaped_newlines_become_line_breaks() {
        let help = t("en", "help.text");
        assert!(help.contains('\n'));
        assert!(!help.contains("\\n"));
    }

    #[test]
    fn supported_normalizes_telegram_codes() {
        assert_eq!(supported("en-US"), Some("en"));
        assert_eq!(supported("RU"), Some("ru"));
        assert_eq!(supported("de"), None);
    }
}
