use crate::config::Config;
use crate::error::AppResult;
use crate::notify::Notifier;
use crate::progress::{self, CourseProgress};
use crate::storage::FileStorage;
use crate::store::Store;
use std::sync::Arc;
use uuid::Uuid;

/// Progress, completion and credential operations over a store, file
/// storage and a notifier. Cheap to clone; shared as axum state.
pub struct Engine<S, N> {
    pub store: S,
    pub files: FileStorage,
    pub notifier: Arc<N>,
    pub config: Arc<Config>,
}

impl<S: Clone, N> Clone for Engine<S, N> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            files: self.files.clone(),
            notifier: self.notifier.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S, N> Engine<S, N>
where
    S: Store,
    N: Notifier + Sync + 'static,
{
    pub fn new(store: S, notifier: N, config: Config) -> Self {
        Self {
            store,
            files: FileStorage::new(config.data_dir.clone()),
            notifier: Arc::new(notifier),
            config: Arc::new(config),
        }
    }

    pub async fn calculate_progress(&self, student_id: Uuid, course_id: Uuid) -> AppResult<i32> {
        progress::completion_percentage(&self.store, student_id, course_id).await
    }

    pub async fn is_complete(&self, student_id: Uuid, course_id: Uuid) -> AppResult<bool> {
        progress::is_course_complete(&self.store, student_id, course_id).await
    }

    pub async fn next_activity(&self, student_id: Uuid, course_id: Uuid) -> AppResult<Option<String>> {
        progress::next_pending_activity(&self.store, student_id, course_id).await
    }

    pub async fn course_progress(&self, student_id: Uuid, course_id: Uuid) -> AppResult<CourseProgress> {
        CourseProgress::load(&self.store, student_id, course_id).await
    }
}
