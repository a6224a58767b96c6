use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use super::{FieldKind, FieldSpec, FieldValue, Workflow};
use crate::error::{EditorError, EditorResult, ValidationError};
use crate::models::{interest_by_id, interest_by_key, InterestCategory, InterestSelection, INTEREST_CATALOG};
use crate::storage::ProfileStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InterestStep {
    Menu,
    Entertainment,
    Lifestyle,
    Knowledge,
    Social,
    Primary,
}

/// Выбранные интересы в порядке выбора
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestDraft {
    #[serde(default)]
    pub selected: Vec<InterestSelection>,
}

impl InterestDraft {
    pub fn primary(&self) -> Option<i64> {
        self.selected.iter().find(|s| s.is_primary).map(|s| s.interest_id)
    }

    fn keys_in(&self, category: InterestCategory) -> Vec<String> {
        self.selected
            .iter()
            .filter_map(|s| interest_by_id(s.interest_id))
            .filter(|i| i.category == category)
            .map(|i| i.key.to_string())
            .collect()
    }
}

pub const PRIMARY: &str = "primary";

static FIELDS: &[FieldSpec<InterestStep>] = &[
    FieldSpec {
        name: "entertainment",
        kind: FieldKind::Multi,
        step: InterestStep::Entertainment,
        options: &[],
        label_prefix: "interest",
    },
    FieldSpec {
        name: "lifestyle",
        kind: FieldKind::Multi,
        step: InterestStep::Lifestyle,
        options: &[],
        label_prefix: "interest",
    },
    FieldSpec {
        name: "knowledge",
        kind: FieldKind::Multi,
        step: InterestStep::Knowledge,
        options: &[],
        label_prefix: "interest",
    },
    FieldSpec {
        name: "social",
        kind: FieldKind::Multi,
        step: InterestStep::Social,
        options: &[],
        label_prefix: "interest",
    },
    FieldSpec {
        name: PRIMARY,
        kind: FieldKind::Single,
        step: InterestStep::Primary,
        options: &[],
        label_prefix: "interest",
    },
];

static MENU: &[InterestStep] = &[
    InterestStep::Entertainment,
    InterestStep::Lifestyle,
    InterestStep::Knowledge,
    InterestStep::Social,
    InterestStep::Primary,
];

fn category(field: &str) -> EditorResult<InterestCategory> {
    field
        .parse()
        .map_err(|_| EditorError::UnknownField(field.to_string()))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InterestsWorkflow;

#[async_trait]
impl Workflow for InterestsWorkflow {
    type Values = InterestDraft;
    type Step = InterestStep;

    fn tag(&self) -> &'static str {
        "interests"
    }

    fn short_tag(&self) -> &'static str {
        "in"
    }

    fn fields(&self) -> &'static [FieldSpec<InterestStep>] {
        FIELDS
    }

    fn menu_step(&self) -> InterestStep {
        InterestStep::Menu
    }

    fn menu_entries(&self) -> &'static [InterestStep] {
        MENU
    }

    /// Варианты берутся из каталога; основной интерес выбирается среди уже выбранных
    fn options(&self, spec: &FieldSpec<InterestStep>, values: &InterestDraft) -> Vec<String> {
        if spec.name == PRIMARY {
            return values
                .selected
                .iter()
                .filter_map(|s| interest_by_id(s.interest_id))
                .map(|i| i.key.to_string())
                .collect();
        }
        match category(spec.name) {
            Ok(cat) => INTEREST_CATALOG
                .iter()
                .filter(|i| i.category == cat)
                .map(|i| i.key.to_string())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    fn read(&self, values: &InterestDraft, field: &str) -> EditorResult<FieldValue> {
        if field == PRIMARY {
            let key = values.primary().and_then(interest_by_id).map(|i| i.key.to_string());
            return Ok(FieldValue::Single(key));
        }
        Ok(FieldValue::Multi(values.keys_in(category(field)?)))
    }

    fn write(&self, values: &mut InterestDraft, field: &str, value: FieldValue) -> EditorResult<()> {
        match value {
            FieldValue::Single(key) if field == PRIMARY => {
                let id = match key {
                    Some(key) => Some(
                        interest_by_key(&key)
                            .filter(|i| values.selected.iter().any(|s| s.interest_id == i.id))
                            .ok_or_else(|| EditorError::unknown_option(field, &key))?
                            .id,
                    ),
                    None => None,
                };
                for selection in &mut values.selected {
                    selection.is_primary = Some(selection.interest_id) == id;
                }
            }
            FieldValue::Multi(keys) if field != PRIMARY => {
                let cat = category(field)?;
                let mut ids = Vec::with_capacity(keys.len());
                for key in &keys {
                    let interest = interest_by_key(key)
                        .filter(|i| i.category == cat)
                        .ok_or_else(|| EditorError::unknown_option(field, key))?;
                    ids.push(interest.id);
                }
                // Остальные категории не трогаем; снятый основной интерес пропадает вместе с выбором
                values.selected.retain(|s| {
                    interest_by_id(s.interest_id).map(|i| i.category) != Some(cat) || ids.contains(&s.interest_id)
                });
                for id in ids {
                    if !values.selected.iter().any(|s| s.interest_id == id) {
                        values.selected.push(InterestSelection {
                            interest_id: id,
                            is_primary: false,
                        });
                    }
                }
            }
            _ => return Err(EditorError::WrongKind(field.to_string())),
        }
        Ok(())
    }

    fn validate(&self, values: &InterestDraft) -> Result<(), ValidationError> {
        if values.selected.is_empty() {
            return Err(ValidationError::NoInterests);
        }
        Ok(())
    }

    async fn load(&self, store: &dyn ProfileStore, user_id: i64) -> anyhow::Result<InterestDraft> {
        Ok(InterestDraft {
            selected: store.get_interests(user_id).await?,
        })
    }

    async fn persist(&self, store: &dyn ProfileStore, user_id: i64, values: &InterestDraft) -> anyhow::Result<()> {
        store.save_interests(user_id, &values.selected).await
    }
}
