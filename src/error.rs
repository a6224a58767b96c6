use thiserror::Error;

/// Нарушения правил, которые проверяются только при сохранении
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("day type is not selected")]
    NoDayType,
    #[error("specific day type requires at least one day")]
    NoDays,
    #[error("no time slot selected")]
    NoTimeSlots,
    #[error("no communication style selected")]
    NoCommunicationStyles,
    #[error("activity type is not selected")]
    NoActivityType,
    #[error("frequency is not selected")]
    NoFrequency,
    #[error("no interests selected")]
    NoInterests,
    #[error("native language is not selected")]
    NoNativeLanguage,
    #[error("target language is not selected")]
    NoTargetLanguage,
    #[error("level is not selected")]
    NoLevel,
    #[error("interface language is not selected")]
    NoInterfaceLanguage,
    #[error("native and target languages must differ")]
    SameLanguages,
}

impl ValidationError {
    pub fn message_key(&self) -> &'static str {
        match self {
            Self::NoDayType => "validation.no_day_type",
            Self::NoDays => "validation.no_days",
            Self::NoTimeSlots => "validation.no_time_slots",
            Self::NoCommunicationStyles => "validation.no_communication",
            Self::NoActivityType => "validation.no_activity",
            Self::NoFrequency => "validation.no_frequency",
            Self::NoInterests => "validation.no_interests",
            Self::NoNativeLanguage => "validation.no_native",
            Self::NoTargetLanguage => "validation.no_target",
            Self::NoLevel => "validation.no_level",
            Self::NoInterfaceLanguage => "validation.no_interface",
            Self::SameLanguages => "validation.same_languages",
        }
    }
}

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("edit session not found")]
    SessionNotFound,
    #[error("corrupt session payload: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("session schema mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: String, found: String },
    #[error("unknown field `{0}`")]
    UnknownField(String),
    #[error("field `{field}` has no option `{value}`")]
    UnknownOption { field: String, value: String },
    #[error("field `{0}` does not support this operation")]
    WrongKind(String),
    #[error("unknown step `{0}`")]
    UnknownStep(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("session store failure: {0}")]
    SessionStore(#[source] anyhow::Error),
    #[error("storage failure: {0}")]
    Storage(#[source] anyhow::Error),
}

impl EditorError {
    /// Ключ перевода для сообщения пользователю
    pub fn message_key(&self) -> &'static str {
        match self {
            Self::SessionNotFound => "error.session_not_found",
            Self::Validation(v) => v.message_key(),
            _ => "error.generic",
        }
    }

    pub fn unknown_option(field: &str, value: &str) -> Self {
        Self::UnknownOption {
            field: field.to_string(),
            value: value.to_string(),
        }
    }
}

pub type EditorResult<T> = Result<T, EditorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_map_to_their_own_keys() {
        let err = EditorError::from(ValidationError::NoTimeSlots);
        assert_eq!(err.message_key(), "validation.no_time_slots");
        assert_eq!(EditorError::SessionNotFound.message_key(), "error.session_not_found");
        assert_eq!(
            EditorError::Storage(anyhow::anyhow!("disk full")).message_key(),
            "error.generic"
        );
    }
}
