//! Хранилище в памяти для тестов, с управляемыми отказами записи.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;

use crate::models::{
    FeedbackFilter, FeedbackItem, FriendshipPreferences, InterestSelection, LanguageSettings, NewUser, Stats,
    TimeAvailability, UserProfile, UserState,
};
use crate::session_store::{MemorySessionStore, SessionStore};
use crate::storage::ProfileStore;

#[derive(Default)]
struct Inner {
    users: HashMap<i64, UserProfile>,
    states: HashMap<i64, UserState>,
    availability: HashMap<i64, TimeAvailability>,
    preferences: HashMap<i64, FriendshipPreferences>,
    interests: HashMap<i64, Vec<InterestSelection>>,
    feedback: Vec<FeedbackItem>,
    writes: usize,
    fail_preferences: bool,
    fail_states: bool,
}

#[derive(Default)]
pub struct FakeProfileStore {
    inner: Mutex<Inner>,
}

impl FakeProfileStore {
    fn with<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> T {
        let mut inner = self.inner.lock().unwrap();
        f(&mut inner)
    }

    pub fn seed_user(&self, profile: UserProfile) {
        self.with(|i| {
            i.states.insert(profile.id, profile.state);
            i.users.insert(profile.id, profile);
        });
    }

    pub fn seed_availability(&self, user_id: i64, value: TimeAvailability) {
        self.with(|i| i.availability.insert(user_id, value));
    }

    pub fn seed_interests(&self, user_id: i64, value: Vec<InterestSelection>) {
        self.with(|i| i.interests.insert(user_id, value));
    }

    pub fn fail_preferences_writes(&self) {
        self.with(|i| i.fail_preferences = true);
    }

    pub fn fail_state_updates(&self) {
        self.with(|i| i.fail_states = true);
    }

    pub fn time_availability(&self, user_id: i64) -> Option<TimeAvailability> {
        self.with(|i| i.availability.get(&user_id).cloned())
    }

    pub fn preferences(&self, user_id: i64) -> Option<FriendshipPreferences> {
        self.with(|i| i.preferences.get(&user_id).cloned())
    }

    pub fn interests(&self, user_id: i64) -> Vec<InterestSelection> {
        self.with(|i| i.interests.get(&user_id).cloned().unwrap_or_default())
    }

    pub fn user_state(&self, user_id: i64) -> Option<UserState> {
        self.with(|i| i.states.get(&user_id).copied())
    }

    pub fn user(&self, user_id: i64) -> Option<UserProfile> {
        self.with(|i| i.users.get(&user_id).cloned())
    }

    /// Количество успешных записей профиля (без отзывов)
    pub fn write_count(&self) -> usize {
        self.with(|i| i.writes)
    }
}

#[async_trait]
impl ProfileStore for FakeProfileStore {
    async fn ensure_user(&self, user: &NewUser) -> Result<UserProfile> {
        Ok(self.with(|i| {
            let profile = i.users.entry(user.id).or_insert_with(|| UserProfile {
                id: user.id,
                username: user.username.clone(),
                first_name: user.first_name.clone(),
                languages: LanguageSettings {
                    interface_language: user.interface_language,
                    ..Default::default()
                },
                state: UserState::Onboarding,
                created_at: Utc::now(),
            });
            let profile = profile.clone();
            i.states.entry(user.id).or_insert(profile.state);
            profile
        }))
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<UserProfile>> {
        Ok(self.with(|i| {
            let state = i.states.get(&user_id).copied();
            i.users.get(&user_id).cloned().map(|mut u| {
                if let Some(state) = state {
                    u.state = state;
                }
                u
            })
        }))
    }

    async fn update_user_state(&self, user_id: i64, state: UserState) -> Result<()> {
        self.with(|i| {
            if i.fail_states {
                bail!("state update refused");
            }
            i.states.insert(user_id, state);
            Ok(())
        })
    }

    async fn save_languages(&self, user_id: i64, languages: &LanguageSettings) -> Result<()> {
        self.with(|i| {
            let Some(user) = i.users.get_mut(&user_id) else {
                bail!("user {} not found", user_id);
            };
            user.languages = languages.clone();
            i.writes += 1;
            Ok(())
        })
    }

    async fn get_time_availability(&self, user_id: i64) -> Result<Option<TimeAvailability>> {
        Ok(self.time_availability(user_id))
    }

    async fn save_time_availability(&self, user_id: i64, value: &TimeAvailability) -> Result<()> {
        self.with(|i| {
            i.availability.insert(user_id, value.clone());
            i.writes += 1;
        });
        Ok(())
    }

    async fn get_preferences(&self, user_id: i64) -> Result<Option<FriendshipPreferences>> {
        Ok(self.preferences(user_id))
    }

    async fn save_preferences(&self, user_id: i64, value: &FriendshipPreferences) -> Result<()> {
        self.with(|i| {
            if i.fail_preferences {
                bail!("preferences write refused");
            }
            i.preferences.insert(user_id, value.clone());
            i.writes += 1;
            Ok(())
        })
    }

    async fn get_interests(&self, user_id: i64) -> Result<Vec<InterestSelection>> {
        Ok(self.interests(user_id))
    }

    async fn save_interests(&self, user_id: i64, interests: &[InterestSelection]) -> Result<()> {
        self.with(|i| {
            i.interests.insert(user_id, interests.to_vec());
            i.writes += 1;
        });
        Ok(())
    }

    async fn add_feedback(&self, user_id: i64, username: Option<&str>, text: &str) -> Result<i64> {
        Ok(self.with(|i| {
            let id = i.feedback.len() as i64 + 1;
            i.feedback.push(FeedbackItem {
                id,
                user_id,
                username: username.map(str::to_string),
                text: text.to_string(),
                processed: false,
                created_at: Utc::now(),
            });
            id
        }))
    }

    async fn list_feedback(&self, filter: FeedbackFilter, limit: i64, offset: i64) -> Result<Vec<FeedbackItem>> {
        Ok(self.with(|i| {
            i.feedback
                .iter()
                .rev()
                .filter(|f| filter == FeedbackFilter::All || !f.processed)
                .skip(offset as usize)
                .take(limit as usize)
                .cloned()
                .collect()
        }))
    }

    async fn count_feedback(&self, filter: FeedbackFilter) -> Result<i64> {
        Ok(self.with(|i| {
            i.feedback
                .iter()
                .filter(|f| filter == FeedbackFilter::All || !f.processed)
                .count() as i64
        }))
    }

    async fn get_feedback(&self, id: i64) -> Result<Option<FeedbackItem>> {
        Ok(self.with(|i| i.feedback.iter().find(|f| f.id == id).cloned()))
    }

    async fn set_feedback_processed(&self, id: i64, processed: bool) -> Result<()> {
        self.with(|i| match i.feedback.iter_mut().find(|f| f.id == id) {
            Some(item) => {
                item.processed = processed;
                Ok(())
            }
            None => bail!("feedback {} not found", id),
        })
    }

    async fn stats(&self) -> Result<Stats> {
        Ok(self.with(|i| Stats {
            users_total: i.users.len() as i64,
            users_active: i.states.values().filter(|s| **s == UserState::Active).count() as i64,
            feedback_total: i.feedback.len() as i64,
            feedback_unprocessed: i.feedback.iter().filter(|f| !f.processed).count() as i64,
        }))
    }
}

/// Хранилище сессий в памяти, у которого можно сломать удаление
#[derive(Default)]
pub struct FlakySessionStore {
    inner: MemorySessionStore,
    fail_deletes: AtomicBool,
}

impl FlakySessionStore {
    pub fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionStore for FlakySessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            bail!("session store unavailable");
        }
        self.inner.delete(key).await
    }
}
