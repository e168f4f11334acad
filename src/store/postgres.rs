use crate::db::Db;
use crate::error::AppResult;
use crate::models::*;
use crate::store::{
    CatalogStore, CredentialStore, DirectoryStore, EnrollmentStore, InsertOutcome, LedgerStore,
    SequenceAllocator,
};
use sqlx::{query, query_as, query_scalar};
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Clone)]
pub struct PgStore {
    pool: Db,
}

impl PgStore {
    pub fn new(pool: Db) -> Self {
        Self { pool }
    }
}

impl CatalogStore for PgStore {
    async fn course(&self, course_id: Uuid) -> AppResult<Option<Course>> {
        let course = query_as::<_, Course>(
            r#"SELECT id, name, code, description, duration_hours, validity_months, active
               FROM courses WHERE id = $1"#,
        )
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(course)
    }

    async fn module(&self, module_id: Uuid) -> AppResult<Option<Module>> {
        let module = query_as::<_, Module>(
            "SELECT id, course_id, title, position, kind FROM modules WHERE id = $1",
        )
        .bind(module_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(module)
    }

    async fn modules_for_course(&self, course_id: Uuid) -> AppResult<Vec<Module>> {
        let modules = query_as::<_, Module>(
            r#"SELECT id, course_id, title, position, kind FROM modules
               WHERE course_id = $1 ORDER BY position ASC, id ASC"#,
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(modules)
    }

    async fn questions(&self, module_id: Uuid) -> AppResult<Vec<Question>> {
        let questions = query_as::<_, Question>(
            r#"SELECT id, module_id, prompt, options, correct_option, explanation
               FROM questions WHERE module_id = $1 ORDER BY id"#,
        )
        .bind(module_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(questions)
    }

    async fn tasks(&self, module_id: Uuid) -> AppResult<Vec<PracticalTask>> {
        let tasks = query_as::<_, PracticalTask>(
            "SELECT id, module_id, title, requires_photo FROM practical_tasks WHERE module_id = $1",
        )
        .bind(module_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tasks)
    }

    async fn task(&self, task_id: Uuid) -> AppResult<Option<PracticalTask>> {
        let task = query_as::<_, PracticalTask>(
            "SELECT id, module_id, title, requires_photo FROM practical_tasks WHERE id = $1",
        )
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(task)
    }
}

impl LedgerStore for PgStore {
    async fn mark_complete(
        &self,
        student_id: Uuid,
        module_id: Uuid,
        course_id: Uuid,
    ) -> AppResult<bool> {
        let res = query(
            r#"
            INSERT INTO completion_records (student_id, module_id, course_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (student_id, module_id) DO NOTHING
            "#,
        )
        .bind(student_id)
        .bind(module_id)
        .bind(course_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn completed_modules(
        &self,
        student_id: Uuid,
        course_id: Uuid,
    ) -> AppResult<HashSet<Uuid>> {
        // join on modules so records of modules moved out of the course don't count
        let ids: Vec<Uuid> = query_scalar(
            r#"
            SELECT cr.module_id FROM completion_records cr
            JOIN modules m ON m.id = cr.module_id
            WHERE cr.student_id = $1 AND m.course_id = $2
            "#,
        )
        .bind(student_id)
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().collect())
    }
}

impl EnrollmentStore for PgStore {
    async fn enrollment(&self, student_id: Uuid, course_id: Uuid) -> AppResult<Option<Enrollment>> {
        let enrollment = query_as::<_, Enrollment>(
            r#"SELECT student_id, course_id, progress, state, started_at, finished_at
               FROM enrollments WHERE student_id = $1 AND course_id = $2"#,
        )
        .bind(student_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(enrollment)
    }

    async fn save_enrollment(&self, e: &Enrollment) -> AppResult<()> {
        query(
            r#"
            UPDATE enrollments
            SET progress = GREATEST(progress, $3),
                state = GREATEST(state, $4),
                started_at = COALESCE(started_at, $5),
                finished_at = COALESCE(finished_at, $6)
            WHERE student_id = $1 AND course_id = $2
            "#,
        )
        .bind(e.student_id)
        .bind(e.course_id)
        .bind(e.progress)
        .bind(e.state)
        .bind(e.started_at)
        .bind(e.finished_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

impl DirectoryStore for PgStore {
    async fn student(&self, student_id: Uuid) -> AppResult<Option<Student>> {
        let student = query_as::<_, Student>(
            "SELECT id, first_name, last_name, dni, email, company_id FROM students WHERE id = $1",
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(student)
    }

    async fn company(&self, company_id: Uuid) -> AppResult<Option<Company>> {
        let company = query_as::<_, Company>("SELECT id, name, tax_id FROM companies WHERE id = $1")
            .bind(company_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(company)
    }

    async fn approved_photo(&self, student_id: Uuid) -> AppResult<Option<String>> {
        let path: Option<String> = query_scalar(
            "SELECT photo_path FROM credential_photos WHERE student_id = $1 AND approved",
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(path)
    }

    async fn evidence(&self, evidence_id: Uuid) -> AppResult<Option<Evidence>> {
        let evidence = query_as::<_, Evidence>(
            r#"SELECT id, task_id, student_id, photo_url, state, feedback, reviewer_id, uploaded_at
               FROM evidences WHERE id = $1"#,
        )
        .bind(evidence_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(evidence)
    }

    async fn review_evidence(
        &self,
        evidence_id: Uuid,
        state: EvidenceState,
        feedback: Option<String>,
        reviewer_id: Option<Uuid>,
    ) -> AppResult<Evidence> {
        let evidence = query_as::<_, Evidence>(
            r#"
            UPDATE evidences SET state = $2, feedback = $3, reviewer_id = $4
            WHERE id = $1
            RETURNING id, task_id, student_id, photo_url, state, feedback, reviewer_id, uploaded_at
            "#,
        )
        .bind(evidence_id)
        .bind(state)
        .bind(feedback)
        .bind(reviewer_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(evidence)
    }

    async fn approved_tasks(&self, student_id: Uuid, module_id: Uuid) -> AppResult<HashSet<Uuid>> {
        let ids: Vec<Uuid> = query_scalar(
            r#"
            SELECT DISTINCT e.task_id FROM evidences e
            JOIN practical_tasks t ON t.id = e.task_id
            WHERE e.student_id = $1 AND t.module_id = $2 AND e.state = 'APPROVED'
            "#,
        )
        .bind(student_id)
        .bind(module_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().collect())
    }

    async fn record_quiz_attempt(&self, attempt: &QuizAttempt) -> AppResult<()> {
        query(
            r#"
            INSERT INTO quiz_attempts (id, student_id, module_id, score, passed, answers)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(attempt.id)
        .bind(attempt.student_id)
        .bind(attempt.module_id)
        .bind(attempt.score)
        .bind(attempt.passed)
        .bind(sqlx::types::Json(&attempt.answers))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

impl SequenceAllocator for PgStore {
    async fn next_sequence(&self, year: i32) -> AppResult<i64> {
        let value: i64 = query_scalar(
            r#"
            INSERT INTO credential_counters (year, value) VALUES ($1, 1)
            ON CONFLICT (year) DO UPDATE SET value = credential_counters.value + 1
            RETURNING value
            "#,
        )
        .bind(year)
        .fetch_one(&self.pool)
        .await?;
        Ok(value)
    }
}

impl CredentialStore for PgStore {
    async fn credential_for(
        &self,
        student_id: Uuid,
        course_id: Uuid,
    ) -> AppResult<Option<Credential>> {
        let credential = query_as::<_, Credential>(
            r#"
            SELECT id, numero, student_id, course_id, pdf_url, qr_url, issued_at, expires_at,
                   issued_by, forced
            FROM credentials WHERE student_id = $1 AND course_id = $2
            ORDER BY forced ASC, issued_at DESC
            LIMIT 1
            "#,
        )
        .bind(student_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(credential)
    }

    async fn credential_by_numero(&self, numero: &str) -> AppResult<Option<Credential>> {
        let credential = query_as::<_, Credential>(
            r#"
            SELECT id, numero, student_id, course_id, pdf_url, qr_url, issued_at, expires_at,
                   issued_by, forced
            FROM credentials WHERE numero = $1
            "#,
        )
        .bind(numero)
        .fetch_optional(&self.pool)
        .await?;
        Ok(credential)
    }

    async fn insert_credential(&self, c: &Credential) -> AppResult<InsertOutcome> {
        // The partial unique index only covers regular credentials; forced
        // re-issues never conflict on (student, course).
        let res = query(
            r#"
            INSERT INTO credentials
                (id, numero, student_id, course_id, pdf_url, qr_url, issued_at, expires_at,
                 issued_by, forced)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (student_id, course_id) WHERE NOT forced DO NOTHING
            "#,
        )
        .bind(c.id)
        .bind(&c.numero)
        .bind(c.student_id)
        .bind(c.course_id)
        .bind(&c.pdf_url)
        .bind(&c.qr_url)
        .bind(c.issued_at)
        .bind(c.expires_at)
        .bind(c.issued_by)
        .bind(c.forced)
        .execute(&self.pool)
        .await?;

        if res.rows_affected() == 1 {
            Ok(InsertOutcome::Inserted)
        } else {
            Ok(InsertOutcome::Conflict)
        }
    }
}
