use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString, VariantNames};

use super::{code, parse_single, FieldKind, FieldSpec, FieldValue, Workflow};
use crate::error::{EditorError, EditorResult, ValidationError};
use crate::models::{Language, LanguageSettings, Level};
use crate::storage::ProfileStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LanguageStep {
    Menu,
    Native,
    Target,
    Level,
    Interface,
}

pub const NATIVE: &str = "native_language";
pub const TARGET: &str = "target_language";
pub const LEVEL: &str = "level";
pub const INTERFACE: &str = "interface_language";

static FIELDS: &[FieldSpec<LanguageStep>] = &[
    FieldSpec {
        name: NATIVE,
        kind: FieldKind::Single,
        step: LanguageStep::Native,
        options: Language::VARIANTS,
        label_prefix: "lang",
    },
    FieldSpec {
        name: TARGET,
        kind: FieldKind::Single,
        step: LanguageStep::Target,
        options: Language::VARIANTS,
        label_prefix: "lang",
    },
    FieldSpec {
        name: LEVEL,
        kind: FieldKind::Single,
        step: LanguageStep::Level,
        options: Level::VARIANTS,
        label_prefix: "level",
    },
    FieldSpec {
        name: INTERFACE,
        kind: FieldKind::Single,
        step: LanguageStep::Interface,
        options: Language::INTERFACE,
        label_prefix: "lang",
    },
];

static MENU: &[LanguageStep] = &[
    LanguageStep::Native,
    LanguageStep::Target,
    LanguageStep::Level,
    LanguageStep::Interface,
];

#[derive(Debug, Clone, Copy, Default)]
pub struct LanguagesWorkflow;

#[async_trait]
impl Workflow for LanguagesWorkflow {
    type Values = LanguageSettings;
    type Step = LanguageStep;

    fn tag(&self) -> &'static str {
        "languages"
    }

    fn short_tag(&self) -> &'static str {
        "lg"
    }

    fn fields(&self) -> &'static [FieldSpec<LanguageStep>] {
        FIELDS
    }

    fn menu_step(&self) -> LanguageStep {
        LanguageStep::Menu
    }

    fn menu_entries(&self) -> &'static [LanguageStep] {
        MENU
    }

    fn read(&self, values: &LanguageSettings, field: &str) -> EditorResult<FieldValue> {
        let value = match field {
            NATIVE => code(&values.native_language),
            TARGET => code(&values.target_language),
            LEVEL => code(&values.level),
            INTERFACE => code(&values.interface_language),
            other => return Err(EditorError::UnknownField(other.to_string())),
        };
        Ok(FieldValue::Single(value))
    }

    fn write(&self, values: &mut LanguageSettings, field: &str, value: FieldValue) -> EditorResult<()> {
        let FieldValue::Single(value) = value else {
            return Err(EditorError::WrongKind(field.to_string()));
        };
        match field {
            NATIVE => values.native_language = parse_single(field, value)?,
            TARGET => values.target_language = parse_single(field, value)?,
            LEVEL => values.level = parse_single(field, value)?,
            INTERFACE => values.interface_language = parse_single(field, value)?,
            other => return Err(EditorError::UnknownField(other.to_string())),
        }
        Ok(())
    }

    fn validate(&self, values: &LanguageSettings) -> Result<(), ValidationError> {
        let native = values.native_language.ok_or(ValidationError::NoNativeLanguage)?;
        let target = values.target_language.ok_or(ValidationError::NoTargetLanguage)?;
        if values.level.is_none() {
            return Err(ValidationError::NoLevel);
        }
        if values.interface_language.is_none() {
            return Err(ValidationError::NoInterfaceLanguage);
        }
        if native == target {
            return Err(ValidationError::SameLanguages);
        }
        Ok(())
    }

    async fn load(&self, store: &dyn ProfileStore, user_id: i64) -> anyhow::Result<LanguageSettings> {
        Ok(store
            .get_user(user_id)
            .await?
            .map(|u| u.languages)
            .unwrap_or_default())
    }

    async fn persist(&self, store: &dyn ProfileStore, user_id: i64, values: &LanguageSettings) -> anyhow::Result<()> {
        store.save_languages(user_id, values).await
    }
}
