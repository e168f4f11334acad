use crate::models::{Course, Credential, Student};
use anyhow::Result;
use serde_json::json;

/// Outbound "credential issued" message. Delivery is best effort: callers
/// log failures and carry on.
#[trait_variant::make(Notifier: Send)]
pub trait LocalNotifier {
    async fn credential_issued(
        &self,
        student: &Student,
        course: &Course,
        credential: &Credential,
    ) -> Result<()>;
}

/// Posts notifications to a mail relay webhook; without one configured the
/// message is only logged.
#[derive(Clone)]
pub struct MailRelay {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

impl MailRelay {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self { client: reqwest::Client::new(), webhook_url }
    }
}

impl Notifier for MailRelay {
    async fn credential_issued(
        &self,
        student: &Student,
        course: &Course,
        credential: &Credential,
    ) -> Result<()> {
        let Some(url) = &self.webhook_url else {
            tracing::info!(to = %student.email, numero = %credential.numero, "credential email skipped (no relay)");
            return Ok(());
        };
        self.client
            .post(url)
            .json(&json!({
                "template": "credencial",
                "to": student.email,
                "name": student.full_name(),
                "course": course.name,
                "numero": credential.numero,
                "pdf_url": credential.pdf_url,
            }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
