use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{EditorError, EditorResult};

/// Версия сериализованного формата сессии
pub const SESSION_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    pub field: String,
    pub old_value: Option<String>,
    pub new_value: String,
    pub timestamp: DateTime<Utc>,
}

/// Одна транзакция редактирования: исходные значения, рабочая копия и журнал изменений
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditSession<V, S> {
    pub user_id: i64,
    /// Копия постоянных данных на момент входа, не меняется
    pub original: V,
    pub current: V,
    #[serde(default)]
    pub changes: Vec<ChangeEntry>,
    pub current_step: S,
    pub session_start: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl<V: Clone, S> EditSession<V, S> {
    pub fn new(user_id: i64, original: V, step: S) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            current: original.clone(),
            original,
            changes: Vec::new(),
            current_step: step,
            session_start: now,
            last_activity: now,
        }
    }
}

impl<V, S> EditSession<V, S> {
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    workflow: &'a str,
    session: &'a T,
}

#[derive(Deserialize)]
struct Header {
    version: u32,
    workflow: String,
}

#[derive(Deserialize)]
struct Envelope<T> {
    session: T,
}

/// Кодирует сессию в JSON-конверт с версией и именем сценария
pub fn encode<V: Serialize, S: Serialize>(workflow: &str, session: &EditSession<V, S>) -> EditorResult<String> {
    Ok(serde_json::to_string(&EnvelopeRef {
        version: SESSION_VERSION,
        workflow,
        session,
    })?)
}

/// Проверяет заголовок конверта до разбора самой сессии
pub fn decode<V: DeserializeOwned, S: DeserializeOwned>(workflow: &str, raw: &str) -> EditorResult<EditSession<V, S>> {
    let header: Header = serde_json::from_str(raw)?;
    if header.version != SESSION_VERSION {
        return Err(EditorError::SchemaMismatch {
            expected: format!("v{}", SESSION_VERSION),
            found: format!("v{}", header.version),
        });
    }
    if header.workflow != workflow {
        return Err(EditorError::SchemaMismatch {
            expected: workflow.to_string(),
            found: header.workflow,
        });
    }
    let envelope: Envelope<EditSession<V, S>> = serde_json::from_str(raw)?;
    Ok(envelope.session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Values {
        items: Vec<String>,
        choice: Option<String>,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    enum Step {
        Menu,
        Items,
    }

    fn sample() -> EditSession<Values, Step> {
        let mut session = EditSession::new(
            42,
            Values {
                items: vec![],
                choice: None,
            },
            Step::Menu,
        );
        session.current.items.push("a".to_string());
        session.current_step = Step::Items;
        session.changes.push(ChangeEntry {
            field: "choice".to_string(),
            old_value: None,
            new_value: "x".to_string(),
            timestamp: Utc::now(),
        });
        session
    }

    #[test]
    fn round_trip_reproduces_the_record() {
        let session = sample();
        let raw = encode("demo", &session).unwrap();
        let decoded: EditSession<Values, Step> = decode("demo", &raw).unwrap();
        assert_eq!(decoded, session);
    }

    #[test]
    fn empty_collections_survive_round_trip() {
        let session = EditSession::new(
            1,
            Values {
                items: vec![],
                choice: None,
            },
            Step::Menu,
        );
        let raw = encode("demo", &session).unwrap();
        let decoded: EditSession<Values, Step> = decode("demo", &raw).unwrap();
        assert_eq!(decoded.original.items, Vec::<String>::new());
        assert!(decoded.changes.is_empty());
        assert_eq!(decoded, session);
    }

    #[test]
    fn decode_rejects_other_versions_and_workflows() {
        let raw = encode("demo", &sample()).unwrap();

        let other = decode::<Values, Step>("other", &raw).unwrap_err();
        assert!(matches!(other, EditorError::SchemaMismatch { .. }));

        let bumped = raw.replace("\"version\":1", "\"version\":2");
        let err = decode::<Values, Step>("demo", &bumped).unwrap_err();
        assert!(matches!(err, EditorError::SchemaMismatch { .. }));
    }

    #[test]
    fn decode_reports_corrupt_payloads() {
        let err = decode::<Values, Step>("demo", "{not json").unwrap_err();
        assert!(matches!(err, EditorError::Corrupt(_)));

        let wrong_shape = r#"{"version":1,"workflow":"demo","session":{"user_id":"nope"}}"#;
        let err = decode::<Values, Step>("demo", wrong_shape).unwrap_err();
        assert!(matches!(err, EditorError::Corrupt(_)));
    }

    #[test]
    fn availability_drafts_survive_round_trip() {
        use crate::editor::availability::{AvailabilityDraft, AvailabilityStep};
        use crate::models::{
            ActivityType, CommunicationStyle, DayType, Frequency, FriendshipPreferences, TimeAvailability, TimeSlot,
            Weekday,
        };

        let empty = EditSession::new(7, AvailabilityDraft::default(), AvailabilityStep::Menu);
        let raw = encode("availability", &empty).unwrap();
        let decoded: EditSession<AvailabilityDraft, AvailabilityStep> = decode("availability", &raw).unwrap();
        assert_eq!(decoded, empty);

        let mut filled = empty.clone();
        filled.current = AvailabilityDraft {
            time: TimeAvailability {
                day_type: Some(DayType::Specific),
                specific_days: vec![Weekday::Tuesday, Weekday::Saturday],
                time_slots: vec![TimeSlot::Evening, TimeSlot::Late],
            },
            preferences: FriendshipPreferences {
                communication_styles: vec![CommunicationStyle::VideoCall, CommunicationStyle::Text],
                activity_type: Some(ActivityType::CulturalExchange),
                frequency: Some(Frequency::Weekly),
            },
        };
        filled.current_step = AvailabilityStep::SpecificDays;
        let raw = encode("availability", &filled).unwrap();
        let decoded: EditSession<AvailabilityDraft, AvailabilityStep> = decode("availability", &raw).unwrap();
        assert_eq!(decoded, filled);
    }

    #[test]
    fn interest_drafts_survive_round_trip() {
        use crate::editor::interests::{InterestDraft, InterestStep};
        use crate::models::InterestSelection;

        let empty = EditSession::new(7, InterestDraft::default(), InterestStep::Menu);
        let raw = encode("interests", &empty).unwrap();
        let decoded: EditSession<InterestDraft, InterestStep> = decode("interests", &raw).unwrap();
        assert_eq!(decoded, empty);

        let mut filled = empty.clone();
        filled.current.selected = vec![
            InterestSelection {
                interest_id: 3,
                is_primary: false,
            },
            InterestSelection {
                interest_id: 11,
                is_primary: true,
            },
        ];
        filled.current_step = InterestStep::Primary;
        let raw = encode("interests", &filled).unwrap();
        let decoded: EditSession<InterestDraft, InterestStep> = decode("interests", &raw).unwrap();
        assert_eq!(decoded, filled);
        assert_eq!(decoded.current.primary(), Some(11));
    }
}
