//! Public, read-only credential verification.

use crate::engine::Engine;
use crate::error::AppResult;
use crate::models::Credential;
use crate::notify::Notifier;
use crate::store::Store;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_with::skip_serializing_none;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Valid,
    Expired,
    NotFound,
}

/// Expired strictly after the expiry instant; no expiry means valid forever.
pub fn status_at(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> ValidationStatus {
    match expires_at {
        Some(expiry) if now > expiry => ValidationStatus::Expired,
        _ => ValidationStatus::Valid,
    }
}

#[skip_serializing_none]
#[derive(Serialize, Debug, Clone)]
pub struct ValidationResult {
    pub valid: bool,
    pub status: ValidationStatus,
    pub message: &'static str,
    pub credential: Option<PublicCredential>,
}

#[skip_serializing_none]
#[derive(Serialize, Debug, Clone)]
pub struct PublicCredential {
    pub numero: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub student: PublicStudent,
    pub course: PublicCourse,
    pub company: Option<PublicCompany>,
}

#[derive(Serialize, Debug, Clone)]
pub struct PublicStudent {
    pub first_name: String,
    pub last_name: String,
    pub dni: String,
}

#[skip_serializing_none]
#[derive(Serialize, Debug, Clone)]
pub struct PublicCourse {
    pub name: String,
    pub code: String,
    pub description: Option<String>,
}

#[skip_serializing_none]
#[derive(Serialize, Debug, Clone)]
pub struct PublicCompany {
    pub name: String,
    pub tax_id: Option<String>,
}

impl ValidationResult {
    fn not_found() -> Self {
        Self {
            valid: false,
            status: ValidationStatus::NotFound,
            message: "Credencial no encontrada",
            credential: None,
        }
    }
}

impl<S, N> Engine<S, N>
where
    S: Store,
    N: Notifier + Sync + 'static,
{
    pub async fn validate_credential(&self, numero: &str) -> AppResult<ValidationResult> {
        let Some(credential) = self.store.credential_by_numero(numero).await? else {
            return Ok(ValidationResult::not_found());
        };
        let Some(view) = self.public_view(&credential).await? else {
            tracing::warn!(numero, "credential references a missing student or course");
            return Ok(ValidationResult::not_found());
        };

        let status = status_at(credential.expires_at, Utc::now());
        let message = match status {
            ValidationStatus::Expired => "Credencial vencida",
            _ => "Credencial válida",
        };
        Ok(ValidationResult {
            valid: status == ValidationStatus::Valid,
            status,
            message,
            credential: Some(view),
        })
    }

    async fn public_view(&self, credential: &Credential) -> AppResult<Option<PublicCredential>> {
        let Some(student) = self.store.student(credential.student_id).await? else {
            return Ok(None);
        };
        let Some(course) = self.store.course(credential.course_id).await? else {
            return Ok(None);
        };
        let company = match student.company_id {
            Some(id) => self.store.company(id).await?,
            None => None,
        };

        Ok(Some(PublicCredential {
            numero: credential.numero.clone(),
            issued_at: credential.issued_at,
            expires_at: credential.expires_at,
            student: PublicStudent {
                first_name: student.first_name,
                last_name: student.last_name,
                dni: student.dni,
            },
            course: PublicCourse { name: course.name, code: course.code, description: course.description },
            company: company.map(|c| PublicCompany { name: c.name, tax_id: c.tax_id }),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn expiry_boundaries() {
        let now = Utc::now();
        assert_eq!(status_at(None, now), ValidationStatus::Valid);
        assert_eq!(status_at(Some(now - Duration::days(1)), now), ValidationStatus::Expired);
        assert_eq!(status_at(Some(now), now), ValidationStatus::Valid);
        assert_eq!(status_at(Some(now + Duration::days(1)), now), ValidationStatus::Valid);
    }

    #[test]
    fn not_found_serializes_without_credential() {
        let json = serde_json::to_value(ValidationResult::not_found()).unwrap();
        assert_eq!(json["valid"], false);
        assert_eq!(json["status"], "not_found");
        assert!(json.get("credential").is_none());
    }
}
