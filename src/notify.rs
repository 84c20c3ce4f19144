//! Escalation notifications — SMTP via lettre, best-effort.
//!
//! Delivery failures are logged and never fail the triage response that was
//! already produced for the customer.

use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::error::NotifyError;
use crate::triage::types::ClassificationReport;

/// SMTP configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct MailerConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

impl MailerConfig {
    /// Build config from environment variables.
    /// Returns `None` if `EMAIL_SMTP_HOST` is not set (notifications disabled).
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("EMAIL_SMTP_HOST").ok()?;

        let smtp_port: u16 = std::env::var("EMAIL_SMTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(587);

        let username = std::env::var("EMAIL_USERNAME").unwrap_or_default();
        let password = std::env::var("EMAIL_PASSWORD").unwrap_or_default();
        let from_address = std::env::var("EMAIL_FROM_ADDRESS").unwrap_or_else(|_| username.clone());

        Some(Self {
            smtp_host,
            smtp_port,
            username,
            password,
            from_address,
        })
    }
}

/// Sends escalation emails to assignees.
pub struct Notifier {
    config: MailerConfig,
}

impl Notifier {
    pub fn new(config: MailerConfig) -> Self {
        Self { config }
    }

    /// Send an escalation notification. Blocking SMTP — callers run this on
    /// the blocking pool and treat failures as log-only.
    pub fn send_escalation(
        &self,
        to: &str,
        report: &ClassificationReport,
    ) -> Result<(), NotifyError> {
        let subject = format!(
            "New issue: {} - priority {}",
            report.department,
            report.priority.as_str().to_uppercase()
        );
        let body = render_report(report);

        let creds = Credentials::new(self.config.username.clone(), self.config.password.clone());
        let transport = SmtpTransport::relay(&self.config.smtp_host)
            .map_err(|e| NotifyError::Send(format!("SMTP relay error: {e}")))?
            .port(self.config.smtp_port)
            .credentials(creds)
            .build();

        let email = Message::builder()
            .from(
                self.config
                    .from_address
                    .parse()
                    .map_err(|e| NotifyError::Build(format!("invalid from address: {e}")))?,
            )
            .to(to
                .parse()
                .map_err(|e| NotifyError::Build(format!("invalid to address: {e}")))?)
            .subject(subject.as_str())
            .body(body)
            .map_err(|e| NotifyError::Build(format!("failed to build email: {e}")))?;

        transport
            .send(&email)
            .map_err(|e| NotifyError::Send(format!("SMTP send failed: {e}")))?;

        tracing::info!(to = to, subject = %subject, "Escalation notification sent");
        Ok(())
    }
}

/// Render the plain-text notification body for an escalation report.
pub fn render_report(report: &ClassificationReport) -> String {
    let mut body = String::with_capacity(512);
    body.push_str("A new issue has been escalated by the triage system.\n\n");
    body.push_str(&format!("Summary: {}\n", report.summary));
    body.push_str(&format!(
        "Department: {}\n",
        report.department.as_str().to_uppercase()
    ));
    body.push_str(&format!(
        "Priority: {}\n",
        report.priority.as_str().to_uppercase()
    ));
    body.push_str(&format!("Intent: {}\n", report.intent));
    body.push_str("\nDetails:\n");
    for detail in &report.technical_details {
        body.push_str(&format!("  - {detail}\n"));
    }
    body.push_str("\nPlease pick this up from the issues dashboard.\n");
    body
}
