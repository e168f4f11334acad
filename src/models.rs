use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub tax_id: Option<String>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Student {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub dni: String,
    pub email: String,
    pub company_id: Option<Uuid>,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Course {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub duration_hours: i32,
    pub validity_months: Option<i32>, // None -> default validity applies
    pub active: bool,
}

#[derive(sqlx::Type, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "module_kind", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModuleKind {
    Theory,
    Quiz,
    Practical,
}

impl ModuleKind {
    /// Prefix shown to the student for a pending module of this kind.
    pub fn label(self) -> &'static str {
        match self {
            ModuleKind::Theory => "Módulo Teórico",
            ModuleKind::Quiz => "Quiz",
            ModuleKind::Practical => "Práctica",
        }
    }
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Module {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub position: i32,
    pub kind: ModuleKind,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Question {
    pub id: Uuid,
    pub module_id: Uuid,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_option: i32,
    pub explanation: Option<String>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct PracticalTask {
    pub id: Uuid,
    pub module_id: Uuid,
    pub title: String,
    pub requires_photo: bool,
}

#[derive(sqlx::Type, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "evidence_state", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvidenceState {
    Pending,
    Approved,
    Rejected,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Evidence {
    pub id: Uuid,
    pub task_id: Uuid,
    pub student_id: Uuid,
    pub photo_url: String,
    pub state: EvidenceState,
    pub feedback: Option<String>,
    pub reviewer_id: Option<Uuid>,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct CompletionRecord {
    pub student_id: Uuid,
    pub module_id: Uuid,
    pub course_id: Uuid,
    pub completed_at: DateTime<Utc>,
}

/// Ordered by declaration; persisted state only ever moves up.
#[derive(sqlx::Type, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[sqlx(type_name = "enrollment_state", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentState {
    NotStarted,
    InProgress,
    Completed,
    Approved,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Enrollment {
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub progress: i32, // cached, always recomputable from completion_records
    pub state: EnrollmentState,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Credential {
    pub id: Uuid,
    pub numero: String,
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub pdf_url: String,
    pub qr_url: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub issued_by: Option<Uuid>,
    pub forced: bool,
}

#[derive(Serialize, Debug, Clone)]
pub struct QuizAttempt {
    pub id: Uuid,
    pub student_id: Uuid,
    pub module_id: Uuid,
    pub score: f64,
    pub passed: bool,
    pub answers: HashMap<Uuid, i32>,
}

// --- request / response bodies ---

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct IssueCredentialReq {
    pub student_id: Uuid,
    pub course_id: Uuid,
    #[serde(default)]
    pub force: bool,
    pub issued_by: Option<Uuid>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SubmitQuizReq {
    pub answers: HashMap<Uuid, i32>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ReviewEvidenceReq {
    pub approved: bool,
    pub feedback: Option<String>,
    pub reviewer_id: Option<Uuid>,
}

#[derive(Serialize, Debug, Clone)]
pub struct ProgressView {
    pub progress: i32,
    pub completed: bool,
    pub next_activity: Option<String>,
}
