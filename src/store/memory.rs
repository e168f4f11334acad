use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::store::{
    CatalogStore, CredentialStore, DirectoryStore, EnrollmentStore, InsertOutcome, LedgerStore,
    SequenceAllocator,
};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    companies: HashMap<Uuid, Company>,
    students: HashMap<Uuid, Student>,
    photos: HashMap<Uuid, String>,
    courses: HashMap<Uuid, Course>,
    modules: HashMap<Uuid, Module>,
    questions: Vec<Question>,
    tasks: Vec<PracticalTask>,
    evidences: HashMap<Uuid, Evidence>,
    enrollments: HashMap<(Uuid, Uuid), Enrollment>,
    completions: HashMap<(Uuid, Uuid), CompletionRecord>,
    quiz_attempts: Vec<QuizAttempt>,
    counters: HashMap<i32, i64>,
    credentials: Vec<Credential>,
}

/// Mirrors the SQL schema's keys: completion records are unique on
/// (student, module), regular credentials on (student, course), numeros
/// globally.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_company(&self, name: &str) -> Company {
        let company = Company { id: Uuid::new_v4(), name: name.into(), tax_id: Some("30-71234567-8".into()) };
        self.inner.lock().await.companies.insert(company.id, company.clone());
        company
    }

    pub async fn add_student(&self, first: &str, last: &str, dni: &str, company_id: Option<Uuid>) -> Student {
        let student = Student {
            id: Uuid::new_v4(),
            first_name: first.into(),
            last_name: last.into(),
            dni: dni.into(),
            email: format!("{}@example.com", first.to_lowercase()),
            company_id,
        };
        self.inner.lock().await.students.insert(student.id, student.clone());
        student
    }

    pub async fn set_photo(&self, student_id: Uuid, path: &str) {
        self.inner.lock().await.photos.insert(student_id, path.into());
    }

    pub async fn add_course(&self, name: &str, code: &str, validity_months: Option<i32>) -> Course {
        let course = Course {
            id: Uuid::new_v4(),
            name: name.into(),
            code: code.into(),
            description: None,
            duration_hours: 8,
            validity_months,
            active: true,
        };
        self.inner.lock().await.courses.insert(course.id, course.clone());
        course
    }

    pub async fn add_module(&self, course_id: Uuid, title: &str, position: i32, kind: ModuleKind) -> Module {
        let module = Module { id: Uuid::new_v4(), course_id, title: title.into(), position, kind };
        self.inner.lock().await.modules.insert(module.id, module.clone());
        module
    }

    pub async fn add_question(&self, module_id: Uuid, correct_option: i32) -> Question {
        let question = Question {
            id: Uuid::new_v4(),
            module_id,
            prompt: "¿Distancia mínima de frenado?".into(),
            options: vec!["10 m".into(), "20 m".into(), "30 m".into()],
            correct_option,
            explanation: Some("Depende de la velocidad".into()),
        };
        self.inner.lock().await.questions.push(question.clone());
        question
    }

    pub async fn add_task(&self, module_id: Uuid, title: &str, requires_photo: bool) -> PracticalTask {
        let task = PracticalTask { id: Uuid::new_v4(), module_id, title: title.into(), requires_photo };
        self.inner.lock().await.tasks.push(task.clone());
        task
    }

    pub async fn add_evidence(&self, task_id: Uuid, student_id: Uuid) -> Evidence {
        let evidence = Evidence {
            id: Uuid::new_v4(),
            task_id,
            student_id,
            photo_url: "/storage/evidencias/foto.jpg".into(),
            state: EvidenceState::Pending,
            feedback: None,
            reviewer_id: None,
            uploaded_at: Utc::now(),
        };
        self.inner.lock().await.evidences.insert(evidence.id, evidence.clone());
        evidence
    }

    pub async fn enroll(&self, student_id: Uuid, course_id: Uuid) -> Enrollment {
        let enrollment = Enrollment {
            student_id,
            course_id,
            progress: 0,
            state: EnrollmentState::NotStarted,
            started_at: None,
            finished_at: None,
        };
        self.inner
            .lock()
            .await
            .enrollments
            .insert((student_id, course_id), enrollment.clone());
        enrollment
    }

    pub async fn remove_module(&self, module_id: Uuid) {
        self.inner.lock().await.modules.remove(&module_id);
    }

    pub async fn completion_count(&self) -> usize {
        self.inner.lock().await.completions.len()
    }

    pub async fn credential_count(&self) -> usize {
        self.inner.lock().await.credentials.len()
    }

    pub async fn quiz_attempt_count(&self) -> usize {
        self.inner.lock().await.quiz_attempts.len()
    }
}

impl CatalogStore for MemoryStore {
    async fn course(&self, course_id: Uuid) -> AppResult<Option<Course>> {
        Ok(self.inner.lock().await.courses.get(&course_id).cloned())
    }

    async fn module(&self, module_id: Uuid) -> AppResult<Option<Module>> {
        Ok(self.inner.lock().await.modules.get(&module_id).cloned())
    }

    async fn modules_for_course(&self, course_id: Uuid) -> AppResult<Vec<Module>> {
        let t = self.inner.lock().await;
        let mut modules: Vec<Module> =
            t.modules.values().filter(|m| m.course_id == course_id).cloned().collect();
        modules.sort_by_key(|m| (m.position, m.id));
        Ok(modules)
    }

    async fn questions(&self, module_id: Uuid) -> AppResult<Vec<Question>> {
        let t = self.inner.lock().await;
        Ok(t.questions.iter().filter(|q| q.module_id == module_id).cloned().collect())
    }

    async fn tasks(&self, module_id: Uuid) -> AppResult<Vec<PracticalTask>> {
        let t = self.inner.lock().await;
        Ok(t.tasks.iter().filter(|q| q.module_id == module_id).cloned().collect())
    }

    async fn task(&self, task_id: Uuid) -> AppResult<Option<PracticalTask>> {
        let t = self.inner.lock().await;
        Ok(t.tasks.iter().find(|x| x.id == task_id).cloned())
    }
}

impl LedgerStore for MemoryStore {
    async fn mark_complete(&self, student_id: Uuid, module_id: Uuid, course_id: Uuid) -> AppResult<bool> {
        let mut t = self.inner.lock().await;
        if t.completions.contains_key(&(student_id, module_id)) {
            return Ok(false);
        }
        t.completions.insert(
            (student_id, module_id),
            CompletionRecord { student_id, module_id, course_id, completed_at: Utc::now() },
        );
        Ok(true)
    }

    async fn completed_modules(&self, student_id: Uuid, course_id: Uuid) -> AppResult<HashSet<Uuid>> {
        let t = self.inner.lock().await;
        Ok(t.completions
            .values()
            .filter(|r| r.student_id == student_id)
            .filter(|r| t.modules.get(&r.module_id).is_some_and(|m| m.course_id == course_id))
            .map(|r| r.module_id)
            .collect())
    }
}

impl EnrollmentStore for MemoryStore {
    async fn enrollment(&self, student_id: Uuid, course_id: Uuid) -> AppResult<Option<Enrollment>> {
        Ok(self.inner.lock().await.enrollments.get(&(student_id, course_id)).cloned())
    }

    async fn save_enrollment(&self, e: &Enrollment) -> AppResult<()> {
        let mut t = self.inner.lock().await;
        if let Some(row) = t.enrollments.get_mut(&(e.student_id, e.course_id)) {
            row.progress = row.progress.max(e.progress);
            row.state = row.state.max(e.state);
            row.started_at = row.started_at.or(e.started_at);
            row.finished_at = row.finished_at.or(e.finished_at);
        }
        Ok(())
    }
}

impl DirectoryStore for MemoryStore {
    async fn student(&self, student_id: Uuid) -> AppResult<Option<Student>> {
        Ok(self.inner.lock().await.students.get(&student_id).cloned())
    }

    async fn company(&self, company_id: Uuid) -> AppResult<Option<Company>> {
        Ok(self.inner.lock().await.companies.get(&company_id).cloned())
    }

    async fn approved_photo(&self, student_id: Uuid) -> AppResult<Option<String>> {
        Ok(self.inner.lock().await.photos.get(&student_id).cloned())
    }

    async fn evidence(&self, evidence_id: Uuid) -> AppResult<Option<Evidence>> {
        Ok(self.inner.lock().await.evidences.get(&evidence_id).cloned())
    }

    async fn review_evidence(
        &self,
        evidence_id: Uuid,
        state: EvidenceState,
        feedback: Option<String>,
        reviewer_id: Option<Uuid>,
    ) -> AppResult<Evidence> {
        let mut t = self.inner.lock().await;
        let row = t.evidences.get_mut(&evidence_id).ok_or(AppError::NotFound("evidence"))?;
        row.state = state;
        row.feedback = feedback;
        row.reviewer_id = reviewer_id;
        Ok(row.clone())
    }

    async fn approved_tasks(&self, student_id: Uuid, module_id: Uuid) -> AppResult<HashSet<Uuid>> {
        let t = self.inner.lock().await;
        let module_tasks: HashSet<Uuid> =
            t.tasks.iter().filter(|x| x.module_id == module_id).map(|x| x.id).collect();
        Ok(t.evidences
            .values()
            .filter(|e| e.student_id == student_id && e.state == EvidenceState::Approved)
            .filter(|e| module_tasks.contains(&e.task_id))
            .map(|e| e.task_id)
            .collect())
    }

    async fn record_quiz_attempt(&self, attempt: &QuizAttempt) -> AppResult<()> {
        self.inner.lock().await.quiz_attempts.push(attempt.clone());
        Ok(())
    }
}

impl SequenceAllocator for MemoryStore {
    async fn next_sequence(&self, year: i32) -> AppResult<i64> {
        let mut t = self.inner.lock().await;
        let value = t.counters.entry(year).or_insert(0);
        *value += 1;
        Ok(*value)
    }
}

impl CredentialStore for MemoryStore {
    async fn credential_for(&self, student_id: Uuid, course_id: Uuid) -> AppResult<Option<Credential>> {
        let t = self.inner.lock().await;
        let mut found: Vec<&Credential> = t
            .credentials
            .iter()
            .filter(|c| c.student_id == student_id && c.course_id == course_id)
            .collect();
        found.sort_by_key(|c| (c.forced, std::cmp::Reverse(c.issued_at)));
        Ok(found.first().map(|c| (*c).clone()))
    }

    async fn credential_by_numero(&self, numero: &str) -> AppResult<Option<Credential>> {
        let t = self.inner.lock().await;
        Ok(t.credentials.iter().find(|c| c.numero == numero).cloned())
    }

    async fn insert_credential(&self, c: &Credential) -> AppResult<InsertOutcome> {
        let mut t = self.inner.lock().await;
        if t.credentials.iter().any(|x| x.numero == c.numero) {
            return Err(AppError::BadRequest(format!("duplicate numero {}", c.numero)));
        }
        let taken = !c.forced
            && t.credentials
                .iter()
                .any(|x| !x.forced && x.student_id == c.student_id && x.course_id == c.course_id);
        if taken {
            return Ok(InsertOutcome::Conflict);
        }
        t.credentials.push(c.clone());
        Ok(InsertOutcome::Inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn credential(student_id: Uuid, course_id: Uuid, numero: &str, forced: bool) -> Credential {
        Credential {
            id: Uuid::new_v4(),
            numero: numero.into(),
            student_id,
            course_id,
            pdf_url: format!("/storage/credenciales/{numero}.pdf"),
            qr_url: format!("https://vmp.test/validar/{numero}"),
            issued_at: Utc::now(),
            expires_at: Some(Utc::now() + Duration::days(365)),
            issued_by: None,
            forced,
        }
    }

    #[tokio::test]
    async fn regular_credentials_are_unique_per_student_and_course() {
        let store = MemoryStore::new();
        let (s, c) = (Uuid::new_v4(), Uuid::new_v4());

        let first = store.insert_credential(&credential(s, c, "VMP-2026-00001", false)).await.unwrap();
        let second = store.insert_credential(&credential(s, c, "VMP-2026-00002", false)).await.unwrap();
        let forced = store.insert_credential(&credential(s, c, "VMP-2026-00003", true)).await.unwrap();

        assert_eq!(first, InsertOutcome::Inserted);
        assert_eq!(second, InsertOutcome::Conflict);
        assert_eq!(forced, InsertOutcome::Inserted);
        assert_eq!(store.credential_count().await, 2);

        let found = store.credential_for(s, c).await.unwrap().unwrap();
        assert_eq!(found.numero, "VMP-2026-00001");
    }

    #[tokio::test]
    async fn counters_are_per_year() {
        let store = MemoryStore::new();
        assert_eq!(store.next_sequence(2026).await.unwrap(), 1);
        assert_eq!(store.next_sequence(2026).await.unwrap(), 2);
        assert_eq!(store.next_sequence(2027).await.unwrap(), 1);
    }
}
