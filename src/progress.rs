//! Completion percentage, next pending activity and the enrollment
//! state machine.
//!
//! Percentages are a plain `completed / total` ratio at module granularity.
//! Modules are not weighted by difficulty or duration.

use crate::error::AppResult;
use crate::models::{Enrollment, EnrollmentState, Module};
use crate::store::{CatalogStore, LedgerStore};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use uuid::Uuid;

/// `floor(100 * completed / total)`, clamped to 100. An empty course is 0%.
pub fn percentage(completed: usize, total: usize) -> i32 {
    if total == 0 {
        return 0;
    }
    (100 * completed / total).min(100) as i32
}

/// Modules of one course together with the student's completion records,
/// read fresh from the store.
#[derive(Debug, Clone)]
pub struct CourseProgress {
    modules: Vec<Module>,
    done: HashSet<Uuid>,
}

impl CourseProgress {
    pub async fn load<S>(store: &S, student_id: Uuid, course_id: Uuid) -> AppResult<Self>
    where
        S: CatalogStore + LedgerStore,
    {
        let modules = store.modules_for_course(course_id).await?;
        let done = store.completed_modules(student_id, course_id).await?;
        Ok(Self { modules, done })
    }

    pub fn total(&self) -> usize {
        self.modules.len()
    }

    pub fn completed(&self) -> usize {
        self.modules.iter().filter(|m| self.done.contains(&m.id)).count()
    }

    pub fn percentage(&self) -> i32 {
        percentage(self.completed(), self.total())
    }

    pub fn is_complete(&self) -> bool {
        self.total() > 0 && self.completed() >= self.total()
    }

    /// Modules lacking a completion record, in ascending position.
    pub fn pending(&self) -> Pending<'_> {
        Pending { modules: self.modules.iter(), done: &self.done }
    }

    pub fn next_activity(&self) -> Option<String> {
        self.pending().next().map(describe)
    }
}

pub struct Pending<'a> {
    modules: std::slice::Iter<'a, Module>,
    done: &'a HashSet<Uuid>,
}

impl<'a> Iterator for Pending<'a> {
    type Item = &'a Module;

    fn next(&mut self) -> Option<Self::Item> {
        let done = self.done;
        self.modules.find(|m| !done.contains(&m.id))
    }
}

fn describe(module: &Module) -> String {
    format!("{}: {}", module.kind.label(), module.title)
}

pub async fn completion_percentage<S>(store: &S, student_id: Uuid, course_id: Uuid) -> AppResult<i32>
where
    S: CatalogStore + LedgerStore,
{
    Ok(CourseProgress::load(store, student_id, course_id).await?.percentage())
}

pub async fn is_course_complete<S>(store: &S, student_id: Uuid, course_id: Uuid) -> AppResult<bool>
where
    S: CatalogStore + LedgerStore,
{
    Ok(CourseProgress::load(store, student_id, course_id).await?.is_complete())
}

pub async fn next_pending_activity<S>(
    store: &S,
    student_id: Uuid,
    course_id: Uuid,
) -> AppResult<Option<String>>
where
    S: CatalogStore + LedgerStore,
{
    Ok(CourseProgress::load(store, student_id, course_id).await?.next_activity())
}

impl EnrollmentState {
    /// NOT_STARTED -> IN_PROGRESS on the first completion record, then
    /// IN_PROGRESS -> COMPLETED once every module is done.
    pub fn advance(self, complete: bool) -> Self {
        match self {
            EnrollmentState::NotStarted | EnrollmentState::InProgress if complete => {
                EnrollmentState::Completed
            }
            EnrollmentState::NotStarted => EnrollmentState::InProgress,
            other => other,
        }
    }

    /// COMPLETED -> APPROVED; any other state is left as is.
    pub fn approve(self) -> Self {
        match self {
            EnrollmentState::Completed => EnrollmentState::Approved,
            other => other,
        }
    }
}

impl Enrollment {
    /// Folds a fresh progress computation into the cached enrollment.
    /// Progress never goes down.
    pub fn apply(&mut self, progress: &CourseProgress, now: DateTime<Utc>) {
        self.progress = self.progress.max(progress.percentage());
        let next = self.state.advance(progress.is_complete());
        if self.state == EnrollmentState::NotStarted && next != EnrollmentState::NotStarted {
            self.started_at.get_or_insert(now);
        }
        if next == EnrollmentState::Completed {
            self.finished_at.get_or_insert(now);
        }
        self.state = next;
    }
}
