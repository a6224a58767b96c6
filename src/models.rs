use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr, VariantNames};

/// Какие дни пользователь готов общаться
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, Display, VariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DayType {
    Weekdays,
    Weekends,
    Any,
    Specific,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, Display, VariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, Display, VariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TimeSlot {
    Morning,
    Day,
    Evening,
    Late,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, Display, VariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CommunicationStyle {
    Text,
    Voice,
    AudioCall,
    VideoCall,
    InPerson,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, Display, VariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActivityType {
    CasualChat,
    LanguagePractice,
    CulturalExchange,
    StudyBuddy,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, Display, VariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Frequency {
    Daily,
    SeveralWeekly,
    Weekly,
    Monthly,
    Spontaneous,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumString,
    AsRefStr,
    IntoStaticStr,
    Display,
    VariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Language {
    En,
    Ru,
    Es,
    De,
    Fr,
    It,
    Zh,
    Ja,
}

impl Language {
    /// Языки, на которых есть переводы интерфейса
    pub const INTERFACE: &'static [&'static str] = &["ru", "en"];

    pub fn is_interface(self) -> bool {
        Self::INTERFACE.iter().any(|code| *code == self.as_ref())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, Display, VariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Level {
    Beginner,
    Elementary,
    Intermediate,
    UpperIntermediate,
    Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UserState {
    Onboarding,
    Active,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeAvailability {
    pub day_type: Option<DayType>,
    #[serde(default)]
    pub specific_days: Vec<Weekday>,
    #[serde(default)]
    pub time_slots: Vec<TimeSlot>,
}

impl TimeAvailability {
    /// Конкретные дни имеют смысл только для режима `specific`
    pub fn normalized(&self) -> Self {
        let mut out = self.clone();
        if out.day_type != Some(DayType::Specific) {
            out.specific_days.clear();
        }
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendshipPreferences {
    pub activity_type: Option<ActivityType>,
    #[serde(default)]
    pub communication_styles: Vec<CommunicationStyle>,
    pub frequency: Option<Frequency>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestSelection {
    pub interest_id: i64,
    pub is_primary: bool,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, Display, VariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InterestCategory {
    Entertainment,
    Lifestyle,
    Knowledge,
    Social,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interest {
    pub id: i64,
    pub key: &'static str,
    pub category: InterestCategory,
}

/// Каталог интересов. Идентификаторы хранятся в БД и не должны меняться.
pub const INTEREST_CATALOG: &[Interest] = &[
    Interest { id: 1, key: "movies", category: InterestCategory::Entertainment },
    Interest { id: 2, key: "music", category: InterestCategory::Entertainment },
    Interest { id: 3, key: "games", category: InterestCategory::Entertainment },
    Interest { id: 4, key: "books", category: InterestCategory::Entertainment },
    Interest { id: 5, key: "travel", category: InterestCategory::Lifestyle },
    Interest { id: 6, key: "cooking", category: InterestCategory::Lifestyle },
    Interest { id: 7, key: "sports", category: InterestCategory::Lifestyle },
    Interest { id: 8, key: "fitness", category: InterestCategory::Lifestyle },
    Interest { id: 9, key: "science", category: InterestCategory::Knowledge },
    Interest { id: 10, key: "technology", category: InterestCategory::Knowledge },
    Interest { id: 11, key: "history", category: InterestCategory::Knowledge },
    Interest { id: 12, key: "art", category: InterestCategory::Knowledge },
    Interest { id: 13, key: "volunteering", category: InterestCategory::Social },
    Interest { id: 14, key: "business", category: InterestCategory::Social },
    Interest { id: 15, key: "parenting", category: InterestCategory::Social },
    Interest { id: 16, key: "pets", category: InterestCategory::Social },
];

pub fn interest_by_key(key: &str) -> Option<&'static Interest> {
    INTEREST_CATALOG.iter().find(|i| i.key == key)
}

pub fn interest_by_id(id: i64) -> Option<&'static Interest> {
    INTEREST_CATALOG.iter().find(|i| i.id == id)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageSettings {
    pub native_language: Option<Language>,
    pub target_language: Option<Language>,
    pub level: Option<Level>,
    pub interface_language: Option<Language>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub languages: LanguageSettings,
    pub state: UserState,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    /// Код языка интерфейса или `None`, если пользователь его ещё не выбрал
    pub fn interface_code(&self) -> Option<&'static str> {
        self.languages
            .interface_language
            .filter(|l| l.is_interface())
            .map(|l| -> &'static str { l.into() })
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub interface_language: Option<Language>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackItem {
    pub id: i64,
    pub user_id: i64,
    pub username: Option<String>,
    pub text: String,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackFilter {
    Unprocessed,
    All,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub users_total: i64,
    pub users_active: i64,
    pub feedback_total: i64,
    pub feedback_unprocessed: i64,
}
