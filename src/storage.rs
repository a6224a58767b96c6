use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use crate::models::{
    FeedbackFilter, FeedbackItem, FriendshipPreferences, InterestSelection, LanguageSettings, NewUser, Stats,
    TimeAvailability, UserProfile, UserState,
};

/// Постоянное хранилище профилей и отзывов.
/// Каждый метод независим: между вызовами транзакции нет.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Создаёт пользователя, если его ещё нет, и возвращает профиль
    async fn ensure_user(&self, user: &NewUser) -> Result<UserProfile>;
    async fn get_user(&self, user_id: i64) -> Result<Option<UserProfile>>;
    async fn update_user_state(&self, user_id: i64, state: UserState) -> Result<()>;
    async fn save_languages(&self, user_id: i64, languages: &LanguageSettings) -> Result<()>;

    async fn get_time_availability(&self, user_id: i64) -> Result<Option<TimeAvailability>>;
    async fn save_time_availability(&self, user_id: i64, value: &TimeAvailability) -> Result<()>;
    async fn get_preferences(&self, user_id: i64) -> Result<Option<FriendshipPreferences>>;
    async fn save_preferences(&self, user_id: i64, value: &FriendshipPreferences) -> Result<()>;

    async fn get_interests(&self, user_id: i64) -> Result<Vec<InterestSelection>>;
    /// Заменяет весь набор интересов пользователя
    async fn save_interests(&self, user_id: i64, interests: &[InterestSelection]) -> Result<()>;

    async fn add_feedback(&self, user_id: i64, username: Option<&str>, text: &str) -> Result<i64>;
    async fn list_feedback(&self, filter: FeedbackFilter, limit: i64, offset: i64) -> Result<Vec<FeedbackItem>>;
    async fn count_feedback(&self, filter: FeedbackFilter) -> Result<i64>;
    async fn get_feedback(&self, id: i64) -> Result<Option<FeedbackItem>>;
    async fn set_feedback_processed(&self, id: i64, processed: bool) -> Result<()>;
    async fn stats(&self) -> Result<Stats>;
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY,
        username TEXT,
        first_name TEXT NOT NULL,
        native_language TEXT,
        target_language TEXT,
        level TEXT,
        interface_language TEXT,
        state TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS time_availability (
        user_id INTEGER PRIMARY KEY REFERENCES users(id),
        day_type TEXT,
        specific_days TEXT NOT NULL,
        time_slots TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS friendship_preferences (
        user_id INTEGER PRIMARY KEY REFERENCES users(id),
        activity_type TEXT,
        communication_styles TEXT NOT NULL,
        frequency TEXT,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS user_interests (
        user_id INTEGER NOT NULL REFERENCES users(id),
        interest_id INTEGER NOT NULL,
        is_primary INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (user_id, interest_id)
    )",
    "CREATE TABLE IF NOT EXISTS feedback (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        username TEXT,
        text TEXT NOT NULL,
        processed INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_feedback_processed ON feedback(processed, created_at)",
];

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Открывает (или создаёт) базу по URL вида `sqlite://tandem.db`
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .context("Invalid DATABASE_URL")?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to open database")?;
        Self::new(pool).await
    }

    pub async fn new(pool: SqlitePool) -> Result<Self> {
        let store = Self { pool };
        store.create_tables().await?;
        Ok(store)
    }

    async fn create_tables(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(*statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    fn row_to_user(row: &SqliteRow) -> Result<UserProfile> {
        let state: String = row.try_get("state")?;
        Ok(UserProfile {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            first_name: row.try_get("first_name")?,
            languages: LanguageSettings {
                native_language: parse_opt(row.try_get("native_language")?)?,
                target_language: parse_opt(row.try_get("target_language")?)?,
                level: parse_opt(row.try_get("level")?)?,
                interface_language: parse_opt(row.try_get("interface_language")?)?,
            },
            state: UserState::from_str(&state).with_context(|| format!("Unknown user state {}", state))?,
            created_at: parse_time(&row.try_get::<String, _>("created_at")?)?,
        })
    }

    fn row_to_feedback(row: &SqliteRow) -> Result<FeedbackItem> {
        Ok(FeedbackItem {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            username: row.try_get("username")?,
            text: row.try_get("text")?,
            processed: row.try_get("processed")?,
            created_at: parse_time(&row.try_get::<String, _>("created_at")?)?,
        })
    }
}

fn parse_opt<T: FromStr>(raw: Option<String>) -> Result<Option<T>> {
    raw.map(|s| T::from_str(&s).map_err(|_| anyhow::anyhow!("Unknown stored value {}", s)))
        .transpose()
}

fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T> {
    serde_json::from_str(raw).with_context(|| format!("Corrupt stored list {}", raw))
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

fn feedback_condition(filter: FeedbackFilter) -> &'static str {
    match filter {
        FeedbackFilter::Unprocessed => "WHERE processed = 0",
        FeedbackFilter::All => "",
    }
}

#[async_trait]
impl ProfileStore for SqliteStore {
    async fn ensure_user(&self, user: &NewUser) -> Result<UserProfile> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO users (id, username, first_name, interface_language, state, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                username = excluded.username,
                first_name = excluded.first_name",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(user.interface_language.map(|l| l.to_string()))
        .bind(UserState::Onboarding.as_ref())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.get_user(user.id)
            .await?
            .context("User disappeared right after insert")
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<UserProfile>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_user(&row)?)),
            None => Ok(None),
        }
    }

    async fn update_user_state(&self, user_id: i64, state: UserState) -> Result<()> {
        let result = sqlx::query("UPDATE users SET state = ?, updated_at = ? WHERE id = ?")
            .bind(state.as_ref())
            .bind(Utc::now().to_rfc3339())
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            anyhow::bail!("User {} not found", user_id);
        }
        Ok(())
    }

    async fn save_languages(&self, user_id: i64, languages: &LanguageSettings) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET native_language = ?, target_language = ?, level = ?, interface_language = ?,
                updated_at = ?
             WHERE id = ?",
        )
        .bind(languages.native_language.map(|l| l.to_string()))
        .bind(languages.target_language.map(|l| l.to_string()))
        .bind(languages.level.map(|l| l.to_string()))
        .bind(languages.interface_language.map(|l| l.to_string()))
        .bind(Utc::now().to_rfc3339())
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            anyhow::bail!("User {} not found", user_id);
        }
        Ok(())
    }

    async fn get_time_availability(&self, user_id: i64) -> Result<Option<TimeAvailability>> {
        let row = sqlx::query("SELECT * FROM time_availability WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(TimeAvailability {
            day_type: parse_opt(row.try_get("day_type")?)?,
            specific_days: parse_json(&row.try_get::<String, _>("specific_days")?)?,
            time_slots: parse_json(&row.try_get::<String, _>("time_slots")?)?,
        }))
    }

    async fn save_time_availability(&self, user_id: i64, value: &TimeAvailability) -> Result<()> {
        sqlx::query(
            "INSERT INTO time_availability (user_id, day_type, specific_days, time_slots, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                day_type = excluded.day_type,
                specific_days = excluded.specific_days,
                time_slots = excluded.time_slots,
                updated_at = excluded.updated_at",
        )
        .bind(user_id)
        .bind(value.day_type.map(|d| d.to_string()))
        .bind(serde_json::to_string(&value.specific_days)?)
        .bind(serde_json::to_string(&value.time_slots)?)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_preferences(&self, user_id: i64) -> Result<Option<FriendshipPreferences>> {
        let row = sqlx::query("SELECT * FROM friendship_preferences WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(FriendshipPreferences {
            activity_type: parse_opt(row.try_get("activity_type")?)?,
            communication_styles: parse_json(&row.try_get::<String, _>("communication_styles")?)?,
            frequency: parse_opt(row.try_get("frequency")?)?,
        }))
    }

    async fn save_preferences(&self, user_id: i64, value: &FriendshipPreferences) -> Result<()> {
        sqlx::query(
            "INSERT INTO friendship_preferences (user_id, activity_type, communication_styles, frequency, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                activity_type = excluded.activity_type,
                communication_styles = excluded.communication_styles,
                frequency = excluded.frequency,
                updated_at = excluded.updated_at",
        )
        .bind(user_id)
        .bind(value.activity_type.map(|a| a.to_string()))
        .bind(serde_json::to_string(&value.communication_styles)?)
        .bind(value.frequency.map(|f| f.to_string()))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_interests(&self, user_id: i64) -> Result<Vec<InterestSelection>> {
        let rows = sqlx::query(
            "SELECT interest_id, is_primary FROM user_interests WHERE user_id = ? ORDER BY interest_id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut interests = Vec::with_capacity(rows.len());
        for row in rows {
            interests.push(InterestSelection {
                interest_id: row.try_get("interest_id")?,
                is_primary: row.try_get("is_primary")?,
            });
        }
        Ok(interests)
    }

    async fn save_interests(&self, user_id: i64, interests: &[InterestSelection]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM user_interests WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        for interest in interests {
            sqlx::query("INSERT INTO user_interests (user_id, interest_id, is_primary) VALUES (?, ?, ?)")
                .bind(user_id)
                .bind(interest.interest_id)
                .bind(interest.is_primary)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn add_feedback(&self, user_id: i64, username: Option<&str>, text: &str) -> Result<i64> {
        let result = sqlx::query("INSERT INTO feedback (user_id, username, text, processed, created_at) VALUES (?, ?, ?, 0, ?)")
            .bind(user_id)
            .bind(username)
            .bind(text)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    async fn list_feedback(&self, filter: FeedbackFilter, limit: i64, offset: i64) -> Result<Vec<FeedbackItem>> {
        let sql = format!(
            "SELECT * FROM feedback {} ORDER BY id DESC LIMIT ? OFFSET ?",
            feedback_condition(filter)
        );
        let rows = sqlx::query(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(Self::row_to_feedback(&row)?);
        }
        Ok(items)
    }

    async fn count_feedback(&self, filter: FeedbackFilter) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM feedback {}", feedback_condition(filter));
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn get_feedback(&self, id: i64) -> Result<Option<FeedbackItem>> {
        let row = sqlx::query("SELECT * FROM feedback WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_feedback(&row)?)),
            None => Ok(None),
        }
    }

    async fn set_feedback_processed(&self, id: i64, processed: bool) -> Result<()> {
        let result = sqlx::query("UPDATE feedback SET processed = ? WHERE id = ?")
            .bind(processed)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            anyhow::bail!("Feedback {} not found", id);
        }
        Ok(())
    }

    async fn stats(&self) -> Result<Stats> {
        let users_total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        let users_active: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE state = ?")
            .bind(UserState::Active.as_ref())
            .fetch_one(&self.pool)
            .await?;
        Ok(Stats {
            users_total,
            users_active,
            feedback_total: self.count_feedback(FeedbackFilter::All).await?,
            feedback_unprocessed: self.count_feedback(FeedbackFilter::Unprocessed).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CommunicationStyle, DayType, Frequency, Language, Level, TimeSlot, Weekday};
    use pretty_assertions::assert_eq;

    async fn create_test_store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqliteStore::new(pool).await.unwrap()
    }

    fn new_user(id: i64) -> NewUser {
        NewUser {
            id,
            username: Some(format!("user{}", id)),
            first_name: "Test".to_string(),
            interface_language: Some(Language::En),
        }
    }

    #[tokio::test]
    async fn ensure_user_is_idempotent() {
        let store = create_test_store().await;
        let created = store.ensure_user(&new_user(7)).await.unwrap();
        assert_eq!(created.state, UserState::Onboarding);
        assert_eq!(created.languages.interface_language, Some(Language::En));

        store.update_user_state(7, UserState::Active).await.unwrap();
        let again = store.ensure_user(&new_user(7)).await.unwrap();
        assert_eq!(again.state, UserState::Active);
    }

    #[tokio::test]
    async fn update_state_of_unknown_user_fails() {
        let store = create_test_store().await;
        assert!(store.update_user_state(404, UserState::Active).await.is_err());
    }

    #[tokio::test]
    async fn languages_are_saved_on_user_row() {
        let store = create_test_store().await;
        store.ensure_user(&new_user(1)).await.unwrap();
        let languages = LanguageSettings {
            native_language: Some(Language::Ru),
            target_language: Some(Language::Es),
            level: Some(Level::UpperIntermediate),
            interface_language: Some(Language::Ru),
        };
        store.save_languages(1, &languages).await.unwrap();

        let user = store.get_user(1).await.unwrap().unwrap();
        assert_eq!(user.languages, languages);
        assert_eq!(user.interface_code(), Some("ru"));
    }

    #[tokio::test]
    async fn availability_and_preferences_upsert() {
        let store = create_test_store().await;
        store.ensure_user(&new_user(1)).await.unwrap();
        assert_eq!(store.get_time_availability(1).await.unwrap(), None);

        let availability = TimeAvailability {
            day_type: Some(DayType::Specific),
            specific_days: vec![Weekday::Tuesday, Weekday::Friday],
            time_slots: vec![TimeSlot::Evening],
        };
        store.save_time_availability(1, &availability).await.unwrap();
        let updated = TimeAvailability {
            time_slots: vec![TimeSlot::Evening, TimeSlot::Late],
            ..availability
        };
        store.save_time_availability(1, &updated).await.unwrap();
        assert_eq!(store.get_time_availability(1).await.unwrap(), Some(updated));

        let preferences = FriendshipPreferences {
            activity_type: None,
            communication_styles: vec![CommunicationStyle::VideoCall],
            frequency: Some(Frequency::Weekly),
        };
        store.save_preferences(1, &preferences).await.unwrap();
        assert_eq!(store.get_preferences(1).await.unwrap(), Some(preferences));
    }

    #[tokio::test]
    async fn save_interests_replaces_the_set() {
        let store = create_test_store().await;
        store.ensure_user(&new_user(1)).await.unwrap();
        store
            .save_interests(
                1,
                &[
                    InterestSelection { interest_id: 1, is_primary: true },
                    InterestSelection { interest_id: 5, is_primary: false },
                ],
            )
            .await
            .unwrap();
        store
            .save_interests(1, &[InterestSelection { interest_id: 9, is_primary: false }])
            .await
            .unwrap();

        assert_eq!(
            store.get_interests(1).await.unwrap(),
            vec![InterestSelection { interest_id: 9, is_primary: false }]
        );
    }

    #[tokio::test]
    async fn feedback_listing_and_processing() {
        let store = create_test_store().await;
        let first = store.add_feedback(1, Some("alice"), "first").await.unwrap();
        let second = store.add_feedback(2, None, "second").await.unwrap();

        store.set_feedback_processed(first, true).await.unwrap();

        let unprocessed = store
            .list_feedback(FeedbackFilter::Unprocessed, 10, 0)
            .await
            .unwrap();
        assert_eq!(unprocessed.len(), 1);
        assert_eq!(unprocessed[0].id, second);

        let all = store.list_feedback(FeedbackFilter::All, 10, 0).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second);

        let item = store.get_feedback(first).await.unwrap().unwrap();
        assert!(item.processed);
        assert_eq!(item.username.as_deref(), Some("alice"));

        assert!(store.set_feedback_processed(999, true).await.is_err());
    }

    #[tokio::test]
    async fn stats_count_users_and_feedback() {
        let store = create_test_store().await;
        store.ensure_user(&new_user(1)).await.unwrap();
        store.ensure_user(&new_user(2)).await.unwrap();
        store.update_user_state(2, UserState::Active).await.unwrap();
        store.add_feedback(1, None, "hello").await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(
            stats,
            Stats {
                users_total: 2,
                users_active: 1,
                feedback_total: 1,
                feedback_unprocessed: 1,
            }
        );
    }
}
