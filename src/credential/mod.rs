//! Credential issuance: numbering, expiry, rendering and the
//! issue-or-fetch insert.

pub mod render;
pub mod validate;

use crate::engine::Engine;
use crate::error::{AppError, AppResult};
use crate::models::{Course, Credential, Student};
use crate::notify::Notifier;
use crate::store::{InsertOutcome, Store};
use chrono::{DateTime, Datelike, Months, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::Serialize;
use uuid::Uuid;

/// Characters escaped when a numero is placed in a URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Serialize, Debug, Clone)]
pub struct IssueResult {
    pub credential: Credential,
    pub artifact_url: String,
    pub already_existed: bool,
}

impl IssueResult {
    fn existing(credential: Credential) -> Self {
        Self { artifact_url: credential.pdf_url.clone(), credential, already_existed: true }
    }
}

/// `PREFIX-YYYY-NNNNN`, e.g. `VMP-2026-00123`.
pub fn credential_number(prefix: &str, year: i32, sequence: i64) -> String {
    format!("{prefix}-{year:04}-{sequence:05}")
}

/// `issued_at + validity_months`, falling back to `default_months` when the
/// course declares no positive validity. A validity past chrono's date range
/// is rejected rather than treated as "never expires".
pub fn expiry(
    issued_at: DateTime<Utc>,
    validity_months: Option<i32>,
    default_months: u32,
) -> AppResult<DateTime<Utc>> {
    let months = validity_months
        .and_then(|m| u32::try_from(m).ok())
        .filter(|m| *m > 0)
        .unwrap_or(default_months);
    issued_at
        .checked_add_months(Months::new(months))
        .ok_or_else(|| AppError::BadRequest(format!("validity of {months} months is out of range")))
}

pub fn verification_url(public_url: &str, numero: &str) -> String {
    format!(
        "{}/validar/{}",
        public_url.trim_end_matches('/'),
        utf8_percent_encode(numero, PATH_SEGMENT)
    )
}

impl<S, N> Engine<S, N>
where
    S: Store,
    N: Notifier + Sync + 'static,
{
    /// Issues the credential for (student, course), or returns the one
    /// already issued. With `force` a new credential is always created.
    ///
    /// Concurrent callers converge on one regular credential: the insert is
    /// guarded by a storage-level unique key and the loser re-reads the
    /// winner's row.
    pub async fn issue_credential(
        &self,
        student_id: Uuid,
        course_id: Uuid,
        force: bool,
        issued_by: Option<Uuid>,
    ) -> AppResult<IssueResult> {
        let student = self.store.student(student_id).await?.ok_or(AppError::NotFound("student"))?;
        let course = self.store.course(course_id).await?.ok_or(AppError::NotFound("course"))?;

        if !force {
            if let Some(existing) = self.store.credential_for(student_id, course_id).await? {
                return Ok(IssueResult::existing(existing));
            }
        }

        let now = Utc::now();
        let expires_at = Some(expiry(now, course.validity_months, self.config.default_validity_months)?);
        let photo = self.load_photo(student_id).await;

        let sequence = self.store.next_sequence(now.year()).await?;
        let numero = credential_number(&self.config.credential_prefix, now.year(), sequence);
        let qr_url = verification_url(&self.config.public_url, &numero);

        let pdf = render::render_card(&render::CardData {
            numero: &numero,
            student_name: &student.full_name(),
            dni: &student.dni,
            course_name: &course.name,
            course_code: &course.code,
            issued_at: now,
            expires_at,
            verification_url: &qr_url,
            photo: photo.as_deref(),
        })
        .inspect_err(|e| tracing::error!(error = %e, numero = %numero, "credential render failed"))?;

        let filename = format!("{numero}.pdf");
        let pdf_url = self.files.save_artifact(&pdf, &filename).await?;

        let credential = Credential {
            id: Uuid::new_v4(),
            numero,
            student_id,
            course_id,
            pdf_url: pdf_url.clone(),
            qr_url,
            issued_at: now,
            expires_at,
            issued_by,
            forced: force,
        };

        let outcome = match self.store.insert_credential(&credential).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.files.discard_artifact(&filename).await;
                return Err(e);
            }
        };
        match outcome {
            InsertOutcome::Inserted => {
                tracing::info!(
                    numero = %credential.numero,
                    student_id = %student_id,
                    course_id = %course_id,
                    forced = force,
                    "credential issued"
                );
                self.notify_issued(&student, &course, &credential).await;
                Ok(IssueResult { credential, artifact_url: pdf_url, already_existed: false })
            }
            InsertOutcome::Conflict => {
                tracing::info!(
                    numero = %credential.numero,
                    student_id = %student_id,
                    course_id = %course_id,
                    "concurrent issuance won elsewhere; returning existing credential"
                );
                self.files.discard_artifact(&filename).await;
                let existing = self
                    .store
                    .credential_for(student_id, course_id)
                    .await?
                    .ok_or(AppError::NotFound("credential"))?;
                Ok(IssueResult::existing(existing))
            }
        }
    }

    /// The approved photo's bytes. Any failure means "no photo".
    async fn load_photo(&self, student_id: Uuid) -> Option<Vec<u8>> {
        let stored = match self.store.approved_photo(student_id).await {
            Ok(stored) => stored?,
            Err(e) => {
                tracing::warn!(error = %e, student_id = %student_id, "photo lookup failed");
                return None;
            }
        };
        let path = self.files.resolve_photo(&stored).await?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "photo unreadable");
                None
            }
        }
    }

    async fn notify_issued(&self, student: &Student, course: &Course, credential: &Credential) {
        if let Err(e) = self.notifier.credential_issued(student, course, credential).await {
            tracing::warn!(error = %e, numero = %credential.numero, "credential notification failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn number_format_is_bit_exact() {
        assert_eq!(credential_number("VMP", 2026, 123), "VMP-2026-00123");
        assert_eq!(credential_number("VMP", 2026, 1), "VMP-2026-00001");
        assert_eq!(credential_number("VMP", 2027, 123456), "VMP-2027-123456");
    }

    #[test]
    fn expiry_uses_course_validity_in_calendar_months() {
        let issued = Utc.with_ymd_and_hms(2026, 1, 31, 12, 0, 0).unwrap();
        let expires = expiry(issued, Some(1), 24).unwrap();
        assert_eq!(expires, Utc.with_ymd_and_hms(2026, 2, 28, 12, 0, 0).unwrap());
    }

    #[test]
    fn out_of_range_validity_is_rejected() {
        let issued = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let err = expiry(issued, Some(i32::MAX), 24).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn expiry_defaults_to_two_years() {
        let issued = Utc.with_ymd_and_hms(2026, 3, 10, 9, 30, 0).unwrap();
        let expected = Utc.with_ymd_and_hms(2028, 3, 10, 9, 30, 0).unwrap();
        assert_eq!(expiry(issued, None, 24).unwrap(), expected);
        assert_eq!(expiry(issued, Some(0), 24).unwrap(), expected);
        assert_eq!(expiry(issued, Some(-6), 24).unwrap(), expected);
    }

    #[test]
    fn verification_url_embeds_numero() {
        assert_eq!(
            verification_url("https://vmp.test/", "VMP-2026-00001"),
            "https://vmp.test/validar/VMP-2026-00001"
        );
        assert_eq!(verification_url("https://vmp.test", "A B/1"), "https://vmp.test/validar/A%20B%2F1");
    }
}
