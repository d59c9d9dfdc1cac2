//! Transactional email to applicants.
//!
//! Messages are rendered from Tera templates and delivered through the Resend
//! HTTP API. Without an API key the message is logged and dropped.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use evisa_core::config::EmailConfig;
use evisa_core::domain::application::{Application, ApplicationStatus};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tera::{Context, Tera};
use tracing::{info, warn};

const DRAFT_CREATED_TEMPLATE: &str = "email/draft_created.html.tera";
const SUBMITTED_TEMPLATE: &str = "email/submitted.html.tera";
const STATUS_CHANGED_TEMPLATE: &str = "email/status_changed.html.tera";

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("email template error: {0}")]
    Template(String),
    #[error("email transport error: {0}")]
    Transport(String),
    #[error("email provider rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError>;
}

/// Delivers through `POST {api_base_url}/emails`.
pub struct ResendNotifier {
    client: reqwest::Client,
    api_base_url: String,
    api_key: SecretString,
}

impl ResendNotifier {
    pub fn new(
        api_base_url: &str,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| NotifyError::Transport(error.to_string()))?;
        Ok(Self { client, api_base_url: api_base_url.trim_end_matches('/').to_string(), api_key })
    }
}

#[async_trait]
impl Notifier for ResendNotifier {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(format!("{}/emails", self.api_base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(message)
            .send()
            .await
            .map_err(|error| NotifyError::Transport(error.to_string()))?;

        let status = response.status();
        if status.is_success() {
            info!(
                event_name = "notify.email.sent",
                subject = %message.subject,
                recipients = message.to.len(),
                "email accepted by provider"
            );
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(NotifyError::Rejected { status: status.as_u16(), body })
    }
}

/// Used when no API key is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogOnlyNotifier;

#[async_trait]
impl Notifier for LogOnlyNotifier {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        warn!(
            event_name = "notify.email.skipped",
            subject = %message.subject,
            to = %message.to.join(","),
            "email API key not configured, skipping email"
        );
        Ok(())
    }
}

pub fn notifier_from_config(config: &EmailConfig) -> Result<Arc<dyn Notifier>, NotifyError> {
    Ok(match &config.api_key {
        Some(api_key) => Arc::new(ResendNotifier::new(
            &config.api_base_url,
            api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )?),
        None => Arc::new(LogOnlyNotifier),
    })
}

/// Builds the applicant emails.
#[derive(Clone, Debug)]
pub struct EmailComposer {
    tera: Tera,
    from: String,
    public_base_url: String,
    redirect_to: Option<String>,
}

impl EmailComposer {
    pub fn new(config: &EmailConfig) -> Self {
        let mut tera = Tera::default();
        for (name, source) in [
            (DRAFT_CREATED_TEMPLATE, include_str!("../../../templates/email/draft_created.html.tera")),
            (SUBMITTED_TEMPLATE, include_str!("../../../templates/email/submitted.html.tera")),
            (STATUS_CHANGED_TEMPLATE, include_str!("../../../templates/email/status_changed.html.tera")),
        ] {
            if let Err(error) = tera.add_raw_template(name, source) {
                warn!(template = name, error = %error, "email template failed to parse");
            }
        }
        crate::pdf::configure_escaping(&mut tera);

        Self {
            tera,
            from: config.from.clone(),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
            redirect_to: config.redirect_to.clone(),
        }
    }

    pub fn resume_link(&self, application: &Application) -> String {
        format!("{}/apply?resume={}", self.public_base_url, application.id)
    }

    fn track_link(&self) -> String {
        format!("{}/track", self.public_base_url)
    }

    pub fn draft_created(&self, application: &Application) -> Result<EmailMessage, NotifyError> {
        let mut context = self.base_context(application);
        context.insert("resume_link", &self.resume_link(application));
        let subject = format!("Demande initiée - {}", application.application_number);
        self.compose(application, DRAFT_CREATED_TEMPLATE, subject, &context)
    }

    pub fn submitted(&self, application: &Application) -> Result<EmailMessage, NotifyError> {
        let context = self.base_context(application);
        let subject = format!("Demande soumise - {}", application.application_number);
        self.compose(application, SUBMITTED_TEMPLATE, subject, &context)
    }

    /// `status` is the status the officer asked for, so an approval reads as one.
    pub fn status_changed(
        &self,
        application: &Application,
        status: ApplicationStatus,
        notes: Option<&str>,
    ) -> Result<EmailMessage, NotifyError> {
        let mut context = self.base_context(application);
        context.insert("status_message", status_message(status));
        context.insert("notes", &notes.filter(|_| status != ApplicationStatus::UnderReview));
        context.insert("issued", &(application.status == ApplicationStatus::Issued));
        let subject = format!("Mise à jour de votre demande - {}", application.application_number);
        self.compose(application, STATUS_CHANGED_TEMPLATE, subject, &context)
    }

    fn base_context(&self, application: &Application) -> Context {
        let mut context = Context::new();
        context.insert("full_name", &application.full_name());
        context.insert("application_number", &application.application_number);
        context.insert("track_link", &self.track_link());
        context
    }

    fn compose(
        &self,
        application: &Application,
        template: &str,
        subject: String,
        context: &Context,
    ) -> Result<EmailMessage, NotifyError> {
        let html = self
            .tera
            .render(template, context)
            .map_err(|error| NotifyError::Template(error.to_string()))?;
        let to = self.redirect_to.clone().unwrap_or_else(|| application.email.clone());
        Ok(EmailMessage { from: self.from.clone(), to: vec![to], subject, html })
    }
}

fn status_message(status: ApplicationStatus) -> &'static str {
    match status {
        ApplicationStatus::UnderReview => "est en cours d'examen",
        ApplicationStatus::NeedInfo => "nécessite des informations complémentaires",
        ApplicationStatus::Approved => "a été approuvée",
        ApplicationStatus::Rejected => "a été rejetée",
        ApplicationStatus::Issued => "a été approuvée et votre e-Visa est disponible",
        _ => "a été mise à jour",
    }
}


#[cfg(test)]
mod tests {
    use chrono::Utc;
    use evisa_core::config::AppConfig;
    use evisa_core::domain::application::{Application, ApplicationStatus, DraftRequest};
    use evisa_core::domain::product::VisaType;

    use super::*;

    fn application() -> Application {
        Application::new_draft(
            &DraftRequest {
                first_name: "Jean".to_string(),
                last_name: "Dupont".to_string(),
                email: "jean@example.com".to_string(),
                nationality: "France".to_string(),
                visa_type: None,
            },
            VisaType::default(),
            "eVisa-FRA-26-00001".to_string(),
            1,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn unresponsive_provider_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("addr");
        // Accepts the connection and never answers.
        let stalled = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.expect("accept");
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });

        let notifier = ResendNotifier::new(
            &format!("http://{address}"),
            SecretString::from("re_test_key".to_string()),
            Duration::from_millis(200),
        )
        .expect("client");
        let message = EmailComposer::new(&AppConfig::default().email)
            .draft_created(&application())
            .expect("compose");

        let outcome =
            tokio::time::timeout(Duration::from_secs(5), notifier.send(&message)).await.expect("bounded");

        assert!(matches!(outcome, Err(NotifyError::Transport(_))), "{outcome:?}");
        stalled.abort();
    }

    #[test]
    fn draft_email_carries_resume_link() {
        let composer = EmailComposer::new(&AppConfig::default().email);
        let application = application();

        let message = composer.draft_created(&application).expect("compose");

        assert_eq!(message.subject, "Demande initiée - eVisa-FRA-26-00001");
        assert_eq!(message.to, vec!["jean@example.com".to_string()]);
        assert_eq!(message.from, "e-Visa RDC <onboarding@resend.dev>");
        assert!(message
            .html
            .contains(&format!("http://localhost:5000/apply?resume={}", application.id)));
    }

    #[test]
    fn redirect_overrides_recipient() {
        let mut config = AppConfig::default().email;
        config.redirect_to = Some("qa@example.org".to_string());
        let composer = EmailComposer::new(&config);

        let message = composer.submitted(&application()).expect("compose");

        assert_eq!(message.to, vec!["qa@example.org".to_string()]);
        assert!(message.html.contains("eVisa-FRA-26-00001"));
    }

    #[test]
    fn status_email_mentions_download_once_issued() {
        let composer = EmailComposer::new(&AppConfig::default().email);
        let mut application = application();
        application.status = ApplicationStatus::Issued;

        let message = composer
            .status_changed(&application, ApplicationStatus::Approved, Some("Dossier complet"))
            .expect("compose");

        assert!(message.html.contains("a été approuvée"));
        assert!(message.html.contains("Votre e-Visa est prêt"));
        assert!(message.html.contains("Dossier complet"));
    }

    #[test]
    fn rejection_email_has_no_download_hint() {
        let composer = EmailComposer::new(&AppConfig::default().email);
        let mut application = application();
        application.status = ApplicationStatus::Rejected;

        let message = composer
            .status_changed(&application, ApplicationStatus::Rejected, Some("Passeport illisible"))
            .expect("compose");

        assert!(message.html.contains("a été rejetée"));
        assert!(!message.html.contains("Votre e-Visa est prêt"));
    }

    #[tokio::test]
    async fn log_only_notifier_accepts_everything() {
        let composer = EmailComposer::new(&AppConfig::default().email);
        let message = composer.submitted(&application()).expect("compose");

        LogOnlyNotifier.send(&message).await.expect("log-only send never fails");
    }
}
