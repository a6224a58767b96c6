use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString, VariantNames};
use tracing::info;

use super::{code, codes, parse_items, parse_single, FieldKind, FieldSpec, FieldValue, Workflow};
use crate::error::{EditorError, EditorResult, ValidationError};
use crate::models::{
    ActivityType, CommunicationStyle, DayType, Frequency, FriendshipPreferences, TimeAvailability, TimeSlot,
    UserState, Weekday,
};
use crate::storage::ProfileStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AvailabilityStep {
    Menu,
    Days,
    SpecificDays,
    Time,
    Communication,
    Activity,
    Frequency,
}

/// Рабочая копия: доступность по времени и предпочтения общения
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityDraft {
    pub time: TimeAvailability,
    pub preferences: FriendshipPreferences,
}

pub const DAY_TYPE: &str = "day_type";
pub const SPECIFIC_DAYS: &str = "specific_days";
pub const TIME_SLOTS: &str = "time_slots";
pub const COMMUNICATION: &str = "communication_styles";
pub const ACTIVITY: &str = "activity_type";
pub const FREQUENCY: &str = "frequency";

static FIELDS: &[FieldSpec<AvailabilityStep>] = &[
    FieldSpec {
        name: DAY_TYPE,
        kind: FieldKind::Single,
        step: AvailabilityStep::Days,
        options: DayType::VARIANTS,
        label_prefix: "day_type",
    },
    FieldSpec {
        name: SPECIFIC_DAYS,
        kind: FieldKind::Multi,
        step: AvailabilityStep::SpecificDays,
        options: Weekday::VARIANTS,
        label_prefix: "weekday",
    },
    FieldSpec {
        name: TIME_SLOTS,
        kind: FieldKind::Multi,
        step: AvailabilityStep::Time,
        options: TimeSlot::VARIANTS,
        label_prefix: "time_slot",
    },
    FieldSpec {
        name: COMMUNICATION,
        kind: FieldKind::Multi,
        step: AvailabilityStep::Communication,
        options: CommunicationStyle::VARIANTS,
        label_prefix: "communication",
    },
    FieldSpec {
        name: ACTIVITY,
        kind: FieldKind::Single,
        step: AvailabilityStep::Activity,
        options: ActivityType::VARIANTS,
        label_prefix: "activity",
    },
    FieldSpec {
        name: FREQUENCY,
        kind: FieldKind::Single,
        step: AvailabilityStep::Frequency,
        options: Frequency::VARIANTS,
        label_prefix: "frequency",
    },
];

static MENU: &[AvailabilityStep] = &[
    AvailabilityStep::Days,
    AvailabilityStep::Time,
    AvailabilityStep::Communication,
    AvailabilityStep::Activity,
    AvailabilityStep::Frequency,
];

/// Проверка доступности по времени, выполняется первой
pub fn validate_time(time: &TimeAvailability) -> Result<(), ValidationError> {
    match time.day_type {
        None => return Err(ValidationError::NoDayType),
        Some(DayType::Specific) if time.specific_days.is_empty() => return Err(ValidationError::NoDays),
        _ => {}
    }
    if time.time_slots.is_empty() {
        return Err(ValidationError::NoTimeSlots);
    }
    Ok(())
}

pub fn validate_preferences(preferences: &FriendshipPreferences) -> Result<(), ValidationError> {
    if preferences.communication_styles.is_empty() {
        return Err(ValidationError::NoCommunicationStyles);
    }
    if preferences.activity_type.is_none() {
        return Err(ValidationError::NoActivityType);
    }
    if preferences.frequency.is_none() {
        return Err(ValidationError::NoFrequency);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AvailabilityWorkflow;

#[async_trait]
impl Workflow for AvailabilityWorkflow {
    type Values = AvailabilityDraft;
    type Step = AvailabilityStep;

    fn tag(&self) -> &'static str {
        "availability"
    }

    fn short_tag(&self) -> &'static str {
        "av"
    }

    fn fields(&self) -> &'static [FieldSpec<AvailabilityStep>] {
        FIELDS
    }

    fn menu_step(&self) -> AvailabilityStep {
        AvailabilityStep::Menu
    }

    fn menu_entries(&self) -> &'static [AvailabilityStep] {
        MENU
    }

    fn read(&self, values: &AvailabilityDraft, field: &str) -> EditorResult<FieldValue> {
        let time = &values.time;
        let prefs = &values.preferences;
        Ok(match field {
            DAY_TYPE => FieldValue::Single(code(&time.day_type)),
            SPECIFIC_DAYS => FieldValue::Multi(codes(&time.specific_days)),
            TIME_SLOTS => FieldValue::Multi(codes(&time.time_slots)),
            COMMUNICATION => FieldValue::Multi(codes(&prefs.communication_styles)),
            ACTIVITY => FieldValue::Single(code(&prefs.activity_type)),
            FREQUENCY => FieldValue::Single(code(&prefs.frequency)),
            other => return Err(EditorError::UnknownField(other.to_string())),
        })
    }

    fn write(&self, values: &mut AvailabilityDraft, field: &str, value: FieldValue) -> EditorResult<()> {
        match (field, value) {
            (DAY_TYPE, FieldValue::Single(v)) => values.time.day_type = parse_single(field, v)?,
            (SPECIFIC_DAYS, FieldValue::Multi(v)) => values.time.specific_days = parse_items(field, &v)?,
            (TIME_SLOTS, FieldValue::Multi(v)) => values.time.time_slots = parse_items(field, &v)?,
            (COMMUNICATION, FieldValue::Multi(v)) => {
                values.preferences.communication_styles = parse_items(field, &v)?
            }
            (ACTIVITY, FieldValue::Single(v)) => values.preferences.activity_type = parse_single(field, v)?,
            (FREQUENCY, FieldValue::Single(v)) => values.preferences.frequency = parse_single(field, v)?,
            (DAY_TYPE | SPECIFIC_DAYS | TIME_SLOTS | COMMUNICATION | ACTIVITY | FREQUENCY, _) => {
                return Err(EditorError::WrongKind(field.to_string()))
            }
            (other, _) => return Err(EditorError::UnknownField(other.to_string())),
        }
        Ok(())
    }

    fn after_select(&self, values: &mut AvailabilityDraft, field: &str, value: &str) -> Option<AvailabilityStep> {
        if field == DAY_TYPE && value == DayType::Specific.as_ref() {
            values.time.specific_days.clear();
            return Some(AvailabilityStep::SpecificDays);
        }
        None
    }

    fn normalize(&self, values: &mut AvailabilityDraft) {
        values.time = values.time.normalized();
    }

    fn validate(&self, values: &AvailabilityDraft) -> Result<(), ValidationError> {
        validate_time(&values.time)?;
        validate_preferences(&values.preferences)
    }

    async fn load(&self, store: &dyn ProfileStore, user_id: i64) -> anyhow::Result<AvailabilityDraft> {
        Ok(AvailabilityDraft {
            time: store.get_time_availability(user_id).await?.unwrap_or_default(),
            preferences: store.get_preferences(user_id).await?.unwrap_or_default(),
        })
    }

    /// Две независимые записи: если вторая упадёт, первая не откатывается
    async fn persist(&self, store: &dyn ProfileStore, user_id: i64, values: &AvailabilityDraft) -> anyhow::Result<()> {
        store
            .save_time_availability(user_id, &values.time)
            .await?;
        store.save_preferences(user_id, &values.preferences).await?;
        Ok(())
    }

    async fn after_commit(&self, store: &dyn ProfileStore, user_id: i64) -> anyhow::Result<()> {
        store.update_user_state(user_id, UserState::Active).await?;
        info!("User {} marked active", user_id);
        Ok(())
    }
}
