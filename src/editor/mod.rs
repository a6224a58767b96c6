//! Пошаговое редактирование профиля через сессию.
//!
//! Каждый сценарий (доступность, интересы, языки) описывает только схему
//! полей, шаги и правила проверки. Загрузка, изменение, сохранение сессии,
//! коммит и отмена реализованы здесь один раз.

pub mod availability;
pub mod interests;
pub mod languages;
pub mod render;
pub mod session;

use std::fmt::Debug;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{EditorError, EditorResult, ValidationError};
use crate::session_store::SessionStore;
use crate::storage::ProfileStore;
pub use session::{ChangeEntry, EditSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Одно значение из списка, заменяется целиком
    Single,
    /// Набор значений, переключается по одному
    Multi,
}

/// Описание редактируемого поля
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec<S: 'static> {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Шаг, на котором показываются варианты поля
    pub step: S,
    pub options: &'static [&'static str],
    /// Префикс ключей перевода для вариантов (`time_slot` → `time_slot.morning`)
    pub label_prefix: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Single(Option<String>),
    Multi(Vec<String>),
}

/// Шаг сценария: сериализуется в сессию и в данные кнопок
pub trait StepId:
    Copy + Eq + Debug + Serialize + DeserializeOwned + AsRef<str> + FromStr + Send + Sync + 'static
{
}

impl<T> StepId for T where
    T: Copy + Eq + Debug + Serialize + DeserializeOwned + AsRef<str> + FromStr + Send + Sync + 'static
{
}

pub type WorkflowSession<W> = EditSession<<W as Workflow>::Values, <W as Workflow>::Step>;

/// Конфигурация одного сценария редактирования
#[async_trait]
pub trait Workflow: Send + Sync + 'static {
    type Values: Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync;
    type Step: StepId;

    /// Полное имя, используется в ключе сессии
    fn tag(&self) -> &'static str;
    /// Короткое имя для данных кнопок (лимит 64 байта)
    fn short_tag(&self) -> &'static str;
    fn fields(&self) -> &'static [FieldSpec<Self::Step>];
    fn menu_step(&self) -> Self::Step;
    /// Пункты главного меню сценария по порядку
    fn menu_entries(&self) -> &'static [Self::Step];

    fn options(&self, spec: &FieldSpec<Self::Step>, _values: &Self::Values) -> Vec<String> {
        spec.options.iter().map(|o| o.to_string()).collect()
    }

    fn read(&self, values: &Self::Values, field: &str) -> EditorResult<FieldValue>;
    fn write(&self, values: &mut Self::Values, field: &str, value: FieldValue) -> EditorResult<()>;

    /// Побочные эффекты выбора; возвращённый шаг заменяет переход в меню
    fn after_select(&self, _values: &mut Self::Values, _field: &str, _value: &str) -> Option<Self::Step> {
        None
    }

    /// Приводит рабочую копию к сохраняемому виду перед проверкой и записью
    fn normalize(&self, _values: &mut Self::Values) {}

    fn validate(&self, values: &Self::Values) -> Result<(), ValidationError>;

    async fn load(&self, store: &dyn ProfileStore, user_id: i64) -> anyhow::Result<Self::Values>;
    async fn persist(&self, store: &dyn ProfileStore, user_id: i64, values: &Self::Values) -> anyhow::Result<()>;

    /// Вызывается после успешной записи; ошибка только логируется
    async fn after_commit(&self, _store: &dyn ProfileStore, _user_id: i64) -> anyhow::Result<()> {
        Ok(())
    }

    fn field(&self, name: &str) -> EditorResult<&'static FieldSpec<Self::Step>> {
        self.fields()
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| EditorError::UnknownField(name.to_string()))
    }

    fn parse_step(&self, raw: &str) -> EditorResult<Self::Step> {
        Self::Step::from_str(raw).map_err(|_| EditorError::UnknownStep(raw.to_string()))
    }
}

/// Итог коммита для экрана подтверждения
#[derive(Debug, Clone, PartialEq)]
pub struct CommitReport<V> {
    pub original: V,
    pub committed: V,
    pub changes: Vec<ChangeEntry>,
}

/// Переключает значение в наборе: удаляет, если есть, иначе добавляет в конец
pub fn apply_toggle<W: Workflow>(
    workflow: &W,
    session: &mut WorkflowSession<W>,
    field: &str,
    value: &str,
) -> EditorResult<()> {
    let spec = workflow.field(field)?;
    if spec.kind != FieldKind::Multi {
        return Err(EditorError::WrongKind(field.to_string()));
    }

    let FieldValue::Multi(mut items) = workflow.read(&session.current, field)? else {
        return Err(EditorError::WrongKind(field.to_string()));
    };
    if let Some(pos) = items.iter().position(|i| i == value) {
        items.remove(pos);
    } else {
        if !workflow.options(spec, &session.current).iter().any(|o| o == value) {
            return Err(EditorError::unknown_option(field, value));
        }
        items.push(value.to_string());
    }

    workflow.write(&mut session.current, field, FieldValue::Multi(items))?;
    session.touch();
    Ok(())
}

/// Заменяет значение поля, пишет запись в журнал и выбирает следующий шаг
pub fn apply_select<W: Workflow>(
    workflow: &W,
    session: &mut WorkflowSession<W>,
    field: &str,
    value: &str,
) -> EditorResult<()> {
    let spec = workflow.field(field)?;
    if spec.kind != FieldKind::Single {
        return Err(EditorError::WrongKind(field.to_string()));
    }
    if !workflow.options(spec, &session.current).iter().any(|o| o == value) {
        return Err(EditorError::unknown_option(field, value));
    }

    let FieldValue::Single(old_value) = workflow.read(&session.current, field)? else {
        return Err(EditorError::WrongKind(field.to_string()));
    };
    workflow.write(&mut session.current, field, FieldValue::Single(Some(value.to_string())))?;

    session.changes.push(ChangeEntry {
        field: field.to_string(),
        old_value,
        new_value: value.to_string(),
        timestamp: Utc::now(),
    });
    session.current_step = workflow
        .after_select(&mut session.current, field, value)
        .unwrap_or_else(|| workflow.menu_step());
    session.touch();
    Ok(())
}

pub fn apply_goto<W: Workflow>(session: &mut WorkflowSession<W>, step: W::Step) {
    session.current_step = step;
    session.touch();
}

/// Движок сессий для одного сценария
pub struct Editor<W: Workflow> {
    workflow: W,
    sessions: Arc<dyn SessionStore>,
    ttl: Duration,
}

impl<W: Workflow> Editor<W> {
    pub fn new(workflow: W, sessions: Arc<dyn SessionStore>, ttl: Duration) -> Self {
        Self { workflow, sessions, ttl }
    }

    pub fn workflow(&self) -> &W {
        &self.workflow
    }

    pub fn session_key(&self, user_id: i64) -> String {
        format!("{}_edit_session:{}", self.workflow.tag(), user_id)
    }

    /// Открывает сессию с данными из постоянного хранилища.
    /// Существующая сессия этого пользователя перезаписывается.
    pub async fn begin(&self, store: &dyn ProfileStore, user_id: i64) -> EditorResult<WorkflowSession<W>> {
        let original = self
            .workflow
            .load(store, user_id)
            .await
            .map_err(EditorError::Storage)?;
        self.begin_with(user_id, original).await
    }

    pub async fn begin_with(&self, user_id: i64, original: W::Values) -> EditorResult<WorkflowSession<W>> {
        let session = EditSession::new(user_id, original, self.workflow.menu_step());
        self.save(&session).await?;
        info!("Started {} edit session for user {}", self.workflow.tag(), user_id);
        Ok(session)
    }

    pub async fn load(&self, user_id: i64) -> EditorResult<WorkflowSession<W>> {
        let raw = self
            .sessions
            .get(&self.session_key(user_id))
            .await
            .map_err(EditorError::SessionStore)?
            .ok_or(EditorError::SessionNotFound)?;
        session::decode(self.workflow.tag(), &raw)
    }

    pub async fn save(&self, session: &WorkflowSession<W>) -> EditorResult<()> {
        let raw = session::encode(self.workflow.tag(), session)?;
        self.sessions
            .set(&self.session_key(session.user_id), raw, self.ttl)
            .await
            .map_err(EditorError::SessionStore)
    }

    async fn discard(&self, user_id: i64) -> EditorResult<()> {
        self.sessions
            .delete(&self.session_key(user_id))
            .await
            .map_err(EditorError::SessionStore)
    }

    pub async fn toggle(&self, user_id: i64, field: &str, value: &str) -> EditorResult<WorkflowSession<W>> {
        let mut session = self.load(user_id).await?;
        apply_toggle(&self.workflow, &mut session, field, value)?;
        self.save(&session).await?;
        debug!("User {} toggled {}={} in {}", user_id, field, value, self.workflow.tag());
        Ok(session)
    }

    pub async fn select(&self, user_id: i64, field: &str, value: &str) -> EditorResult<WorkflowSession<W>> {
        let mut session = self.load(user_id).await?;
        apply_select(&self.workflow, &mut session, field, value)?;
        self.save(&session).await?;
        debug!("User {} selected {}={} in {}", user_id, field, value, self.workflow.tag());
        Ok(session)
    }

    pub async fn goto(&self, user_id: i64, step: &str) -> EditorResult<WorkflowSession<W>> {
        let step = self.workflow.parse_step(step)?;
        let mut session = self.load(user_id).await?;
        apply_goto::<W>(&mut session, step);
        self.save(&session).await?;
        Ok(session)
    }

    /// Проверяет рабочую копию и записывает её. При ошибке проверки или записи
    /// сессия остаётся, чтобы пользователь мог исправить и повторить.
    pub async fn commit(&self, store: &dyn ProfileStore, user_id: i64) -> EditorResult<CommitReport<W::Values>> {
        let mut session = self.load(user_id).await?;
        self.workflow.normalize(&mut session.current);
        self.workflow.validate(&session.current)?;

        self.workflow
            .persist(store, user_id, &session.current)
            .await
            .map_err(EditorError::Storage)?;

        if let Err(e) = self.workflow.after_commit(store, user_id).await {
            warn!(
                "Post-commit update failed for {} session of user {}: {}",
                self.workflow.tag(),
                user_id,
                e
            );
        }

        // данные уже записаны: оставшаяся сессия просто истечёт по TTL
        if let Err(e) = self.discard(user_id).await {
            warn!(
                "Failed to delete {} session of user {} after commit: {}",
                self.workflow.tag(),
                user_id,
                e
            );
        }
        info!(
            "Committed {} edit session for user {} ({} changes)",
            self.workflow.tag(),
            user_id,
            session.changes.len()
        );

        Ok(CommitReport {
            original: session.original,
            committed: session.current,
            changes: session.changes,
        })
    }

    /// Удаляет сессию без записи в постоянное хранилище
    pub async fn abort(&self, user_id: i64) -> EditorResult<()> {
        self.discard(user_id).await?;
        info!("Discarded {} edit session for user {}", self.workflow.tag(), user_id);
        Ok(())
    }
}

/// Разбор набора строк в типизированный список
pub(crate) fn parse_items<T: FromStr>(field: &str, items: &[String]) -> EditorResult<Vec<T>> {
    items
        .iter()
        .map(|i| T::from_str(i).map_err(|_| EditorError::unknown_option(field, i)))
        .collect()
}

pub(crate) fn parse_single<T: FromStr>(field: &str, value: Option<String>) -> EditorResult<Option<T>> {
    value
        .map(|v| T::from_str(&v).map_err(|_| EditorError::unknown_option(field, &v)))
        .transpose()
}

pub(crate) fn codes<T: AsRef<str>>(items: &[T]) -> Vec<String> {
    items.iter().map(|i| i.as_ref().to_string()).collect()
}

pub(crate) fn code<T: AsRef<str>>(item: &Option<T>) -> Option<String> {
    item.as_ref().map(|i| i.as_ref().to_string())
}
