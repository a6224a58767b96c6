//! Отрисовка шагов редактора: текст и раскладка кнопок без привязки к Telegram.

use tracing::warn;

use super::{CommitReport, FieldKind, FieldSpec, FieldValue, Workflow, WorkflowSession};
use crate::callback::{CallbackData, EditorAction, MAX_CALLBACK_LEN};
use crate::i18n::{t, t_args};

const CHECKED: &str = "✅";
const UNCHECKED: &str = "⬜";
const SELECTED: &str = "🔘";
const UNSELECTED: &str = "⚪";

const OPTIONS_PER_ROW: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub data: String,
}

impl Button {
    pub fn new(label: impl Into<String>, data: &CallbackData) -> Self {
        let data = data.encode();
        if data.len() > MAX_CALLBACK_LEN {
            warn!("Callback payload {} exceeds {} bytes", data, MAX_CALLBACK_LEN);
        }
        Self {
            label: label.into(),
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    pub text: String,
    pub keyboard: Vec<Vec<Button>>,
}

pub fn option_label(lang: &str, prefix: &str, value: &str) -> String {
    t(lang, &format!("{}.{}", prefix, value))
}

fn field_label(lang: &str, field: &str) -> String {
    t(lang, &format!("field.{}", field))
}

fn join_labels(lang: &str, prefix: &str, items: &[String]) -> String {
    if items.is_empty() {
        return t(lang, "common.none_selected");
    }
    items
        .iter()
        .map(|i| option_label(lang, prefix, i))
        .collect::<Vec<_>>()
        .join(", ")
}

fn field_items<W: Workflow>(workflow: &W, values: &W::Values, field: &str) -> Vec<String> {
    match workflow.read(values, field) {
        Ok(FieldValue::Single(value)) => value.into_iter().collect(),
        Ok(FieldValue::Multi(items)) => items,
        Err(_) => Vec::new(),
    }
}

/// Строки вида `Поле: значение, значение` для всех полей сценария
pub fn summary_lines<W: Workflow>(workflow: &W, values: &W::Values, lang: &str) -> Vec<String> {
    workflow
        .fields()
        .iter()
        .map(|spec| {
            let items = field_items(workflow, values, spec.name);
            format!(
                "{}: {}",
                field_label(lang, spec.name),
                join_labels(lang, spec.label_prefix, &items)
            )
        })
        .collect()
}

fn editor_button<W: Workflow>(workflow: &W, label: String, action: EditorAction) -> Button {
    Button::new(label, &CallbackData::editor(workflow.short_tag(), action))
}

fn nav_row<W: Workflow>(workflow: &W, lang: &str) -> Vec<Button> {
    vec![
        editor_button(
            workflow,
            t(lang, "common.back"),
            EditorAction::Goto(workflow.menu_step().as_ref().to_string()),
        ),
        editor_button(workflow, t(lang, "common.save"), EditorAction::Save),
        editor_button(workflow, t(lang, "common.cancel"), EditorAction::Cancel),
    ]
}

fn option_buttons<W: Workflow>(
    workflow: &W,
    spec: &FieldSpec<W::Step>,
    values: &W::Values,
    lang: &str,
) -> Vec<Button> {
    let current = field_items(workflow, values, spec.name);
    workflow
        .options(spec, values)
        .into_iter()
        .map(|value| {
            let chosen = current.contains(&value);
            let (mark, action) = match spec.kind {
                FieldKind::Multi => (
                    if chosen { CHECKED } else { UNCHECKED },
                    EditorAction::Toggle {
                        field: spec.name.to_string(),
                        value: value.clone(),
                    },
                ),
                FieldKind::Single => (
                    if chosen { SELECTED } else { UNSELECTED },
                    EditorAction::Select {
                        field: spec.name.to_string(),
                        value: value.clone(),
                    },
                ),
            };
            let label = format!("{} {}", mark, option_label(lang, spec.label_prefix, &value));
            editor_button(workflow, label, action)
        })
        .collect()
}

/// Экран текущего шага сессии. Ничего не меняет, повторный вызов даёт тот же результат.
pub fn render<W: Workflow>(workflow: &W, session: &WorkflowSession<W>, lang: &str) -> Screen {
    let tag = workflow.tag();
    let step = session.current_step;
    let mut keyboard = Vec::new();

    let text = if step == workflow.menu_step() {
        let mut lines = vec![t(lang, &format!("editor.{}.title", tag)), String::new()];
        lines.extend(summary_lines(workflow, &session.current, lang));

        for entry in workflow.menu_entries() {
            let label = t(lang, &format!("editor.{}.{}", tag, entry.as_ref()));
            keyboard.push(vec![editor_button(
                workflow,
                label,
                EditorAction::Goto(entry.as_ref().to_string()),
            )]);
        }
        lines.join("\n")
    } else {
        let mut buttons = Vec::new();
        for spec in workflow.fields().iter().filter(|f| f.step == step) {
            buttons.extend(option_buttons(workflow, spec, &session.current, lang));
        }
        keyboard.extend(buttons.chunks(OPTIONS_PER_ROW).map(<[Button]>::to_vec));

        t(lang, &format!("prompt.{}.{}", tag, step.as_ref()))
    };

    keyboard.push(nav_row(workflow, lang));
    Screen { text, keyboard }
}

/// Изменения набора: добавленные и убранные значения с подписями
fn multi_diff(lang: &str, prefix: &str, before: &[String], after: &[String]) -> Option<String> {
    let added = after.iter().filter(|v| !before.contains(v));
    let removed = before.iter().filter(|v| !after.contains(v));
    let parts: Vec<String> = added
        .map(|v| format!("+{}", option_label(lang, prefix, v)))
        .chain(removed.map(|v| format!("-{}", option_label(lang, prefix, v))))
        .collect();
    (!parts.is_empty()).then(|| parts.join(", "))
}

/// Текст подтверждения после коммита: итоговые значения и список изменений
pub fn render_report<W: Workflow>(workflow: &W, report: &CommitReport<W::Values>, lang: &str) -> String {
    let mut lines = vec![t(lang, "common.saved"), String::new()];
    lines.extend(summary_lines(workflow, &report.committed, lang));

    let mut changes = Vec::new();
    for entry in &report.changes {
        let Ok(spec) = workflow.field(&entry.field) else {
            continue;
        };
        let old = entry
            .old_value
            .as_deref()
            .map(|v| option_label(lang, spec.label_prefix, v))
            .unwrap_or_else(|| t(lang, "common.none_selected"));
        changes.push(t_args(
            lang,
            "common.change_line",
            &[
                ("field", &field_label(lang, spec.name)),
                ("old", &old),
                ("new", &option_label(lang, spec.label_prefix, &entry.new_value)),
            ],
        ));
    }
    for spec in workflow.fields().iter().filter(|f| f.kind == FieldKind::Multi) {
        let before = field_items(workflow, &report.original, spec.name);
        let after = field_items(workflow, &report.committed, spec.name);
        if let Some(diff) = multi_diff(lang, spec.label_prefix, &before, &after) {
            changes.push(format!("{}: {}", field_label(lang, spec.name), diff));
        }
    }

    lines.push(String::new());
    if changes.is_empty() {
        lines.push(t(lang, "common.no_changes"));
    } else {
        lines.push(t(lang, "common.changes_header"));
        lines.extend(changes);
    }
    lines.join("\n")
}
