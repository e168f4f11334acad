//! Persistence seams.
//!
//! The core only talks to these traits; `postgres` is the production
//! implementation and `memory` backs the test-suite with the same
//! uniqueness guarantees the SQL schema enforces.

use crate::error::AppResult;
use crate::models::*;
use std::collections::HashSet;
use uuid::Uuid;

#[cfg(test)]
pub mod memory;
pub mod postgres;

/// Read-only view of courses and their modules.
#[trait_variant::make(CatalogStore: Send)]
pub trait LocalCatalogStore {
    async fn course(&self, course_id: Uuid) -> AppResult<Option<Course>>;

    async fn module(&self, module_id: Uuid) -> AppResult<Option<Module>>;

    /// Modules of a course in ascending `position` (ties broken by id).
    async fn modules_for_course(&self, course_id: Uuid) -> AppResult<Vec<Module>>;

    async fn questions(&self, module_id: Uuid) -> AppResult<Vec<Question>>;

    async fn tasks(&self, module_id: Uuid) -> AppResult<Vec<PracticalTask>>;

    async fn task(&self, task_id: Uuid) -> AppResult<Option<PracticalTask>>;
}

/// Per-(student, module) completion records.
#[trait_variant::make(LedgerStore: Send)]
pub trait LocalLedgerStore {
    /// Upsert-or-noop. Returns true when a new record was written.
    async fn mark_complete(&self, student_id: Uuid, module_id: Uuid, course_id: Uuid)
        -> AppResult<bool>;

    async fn completed_modules(&self, student_id: Uuid, course_id: Uuid)
        -> AppResult<HashSet<Uuid>>;
}

#[trait_variant::make(EnrollmentStore: Send)]
pub trait LocalEnrollmentStore {
    async fn enrollment(&self, student_id: Uuid, course_id: Uuid) -> AppResult<Option<Enrollment>>;

    /// Persists state and timestamps. Neither progress nor state is ever lowered.
    async fn save_enrollment(&self, enrollment: &Enrollment) -> AppResult<()>;
}

/// Students, companies, evidences and quiz attempts.
#[trait_variant::make(DirectoryStore: Send)]
pub trait LocalDirectoryStore {
    async fn student(&self, student_id: Uuid) -> AppResult<Option<Student>>;

    async fn company(&self, company_id: Uuid) -> AppResult<Option<Company>>;

    /// Path of the student's approved credential photo, if any.
    async fn approved_photo(&self, student_id: Uuid) -> AppResult<Option<String>>;

    async fn evidence(&self, evidence_id: Uuid) -> AppResult<Option<Evidence>>;

    async fn review_evidence(
        &self,
        evidence_id: Uuid,
        state: EvidenceState,
        feedback: Option<String>,
        reviewer_id: Option<Uuid>,
    ) -> AppResult<Evidence>;

    /// Tasks of `module_id` for which the student has an approved evidence.
    async fn approved_tasks(&self, student_id: Uuid, module_id: Uuid) -> AppResult<HashSet<Uuid>>;

    async fn record_quiz_attempt(&self, attempt: &QuizAttempt) -> AppResult<()>;
}

/// Unique, monotonically increasing numbers under concurrency.
#[trait_variant::make(SequenceAllocator: Send)]
pub trait LocalSequenceAllocator {
    /// Next value of the per-year credential counter, starting at 1.
    async fn next_sequence(&self, year: i32) -> AppResult<i64>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Inserted,
    /// A regular credential for the same (student, course) already exists.
    Conflict,
}

#[trait_variant::make(CredentialStore: Send)]
pub trait LocalCredentialStore {
    /// The credential for (student, course), preferring the regular one.
    async fn credential_for(&self, student_id: Uuid, course_id: Uuid)
        -> AppResult<Option<Credential>>;

    async fn credential_by_numero(&self, numero: &str) -> AppResult<Option<Credential>>;

    /// Insert guarded by the (student, course) uniqueness constraint for
    /// non-forced credentials.
    async fn insert_credential(&self, credential: &Credential) -> AppResult<InsertOutcome>;
}

/// Everything the engine needs from persistence.
pub trait Store:
    CatalogStore
    + LedgerStore
    + EnrollmentStore
    + DirectoryStore
    + SequenceAllocator
    + CredentialStore
    + Clone
    + Send
    + Sync
    + 'static
{
}

impl<T> Store for T where
    T: CatalogStore
        + LedgerStore
        + EnrollmentStore
        + DirectoryStore
        + SequenceAllocator
        + CredentialStore
        + Clone
        + Send
        + Sync
        + 'static
{
}
