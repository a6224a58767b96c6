//! Приём отзывов: `/feedback` ставит метку ожидания, следующее текстовое
//! сообщение пользователя сохраняется как отзыв.

use std::time::Duration;

use anyhow::Result;
use tracing::info;

use crate::session_store::SessionStore;
use crate::storage::ProfileStore;

pub const MAX_FEEDBACK_CHARS: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackOutcome {
    /// Метки нет, сообщение не отзыв
    NotPending,
    Empty,
    TooLong,
    Saved(i64),
}

fn pending_key(user_id: i64) -> String {
    format!("feedback_pending:{}", user_id)
}

pub async fn arm(sessions: &dyn SessionStore, user_id: i64, ttl: Duration) -> Result<()> {
    sessions.set(&pending_key(user_id), "1".to_string(), ttl).await
}

/// Сохраняет текст, если пользователь ждёт ввода отзыва.
/// При пустом или слишком длинном тексте метка остаётся.
pub async fn submit(
    sessions: &dyn SessionStore,
    store: &dyn ProfileStore,
    user_id: i64,
    username: Option<&str>,
    text: &str,
) -> Result<FeedbackOutcome> {
    let key = pending_key(user_id);
    if sessions.get(&key).await?.is_none() {
        return Ok(FeedbackOutcome::NotPending);
    }

    let text = text.trim();
    if text.is_empty() {
        return Ok(FeedbackOutcome::Empty);
    }
    if text.chars().count() > MAX_FEEDBACK_CHARS {
        return Ok(FeedbackOutcome::TooLong);
    }

    let id = store.add_feedback(user_id, username, text).await?;
    sessions.delete(&key).await?;
    info!("Stored feedback #{} from user {}", id, user_id);
    Ok(FeedbackOutcome::Saved(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeedbackFilter;
    use crate::session_store::MemorySessionStore;
    use crate::testing::FakeProfileStore;
    use pretty_assertions::assert_eq;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn text_without_marker_is_not_feedback() {
        let sessions = MemorySessionStore::default();
        let store = FakeProfileStore::default();
        let outcome = submit(&sessions, &store, 1, None, "hello").await.unwrap();
        assert_eq!(outcome, FeedbackOutcome::NotPending);
        assert_eq!(store.count_feedback(FeedbackFilter::All).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn stores_trimmed_text_once() {
        let sessions = MemorySessionStore::default();
        let store = FakeProfileStore::default();
        arm(&sessions, 1, TTL).await.unwrap();

        let outcome = submit(&sessions, &store, 1, Some("anna"), "  great bot \n").await.unwrap();
        assert_eq!(outcome, FeedbackOutcome::Saved(1));
        let item = store.get_feedback(1).await.unwrap().unwrap();
        assert_eq!(item.text, "great bot");
        assert_eq!(item.username.as_deref(), Some("anna"));

        let again = submit(&sessions, &store, 1, None, "second").await.unwrap();
        assert_eq!(again, FeedbackOutcome::NotPending);
    }

    #[tokio::test]
    async fn invalid_text_keeps_marker() {
        let sessions = MemorySessionStore::default();
        let store = FakeProfileStore::default();
        arm(&sessions, 2, TTL).await.unwrap();

        assert_eq!(submit(&sessions, &store, 2, None, "   ").await.unwrap(), FeedbackOutcome::Empty);
        let long = "я".repeat(MAX_FEEDBACK_CHARS + 1);
        assert_eq!(submit(&sessions, &store, 2, None, &long).await.unwrap(), FeedbackOutcome::TooLong);

        let exact = "я".repeat(MAX_FEEDBACK_CHARS);
        assert_eq!(
            submit(&sessions, &store, 2, None, &exact).await.unwrap(),
            FeedbackOutcome::Saved(1)
        );
    }
}
