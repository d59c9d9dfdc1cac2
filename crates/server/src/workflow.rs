//! Applicant and officer operations over the application lifecycle.
//!
//! Handlers stay thin: everything that loads, plans, persists and notifies
//! lives here and reports `ApplicationError`.

use std::sync::Arc;

use chrono::Utc;
use evisa_core::audit::{self, AuditEntry};
use evisa_core::config::{AppConfig, PaymentConfig};
use evisa_core::domain::application::{
    Application, ApplicationId, ApplicationPatch, ApplicationStatus, DraftRequest,
};
use evisa_core::domain::payment::{amount_due, simulated_transaction_id, Payment, PaymentId, PaymentStatus};
use evisa_core::domain::product::{VisaProduct, VisaType};
use evisa_core::domain::user::AdminUser;
use evisa_core::domain::visa::Visa;
use evisa_core::errors::{ApplicationError, DomainError, FieldError};
use evisa_core::lifecycle::{plan_admin_transition, plan_applicant_transition, LifecycleAction};
use evisa_core::validation::{
    check_stay_dates, check_submission_ready, validate_draft, validate_patch,
};
use evisa_db::repositories::{
    ApplicationRepository, AuditLogRepository, PaymentRepository, ProductRepository,
    SqlApplicationRepository, SqlAuditLogRepository, SqlPaymentRepository, SqlProductRepository,
    SqlUserRepository, SqlVisaRepository, UserRepository, VisaRepository,
};
use evisa_db::{DbPool, PaymentConfirmation, ReviewDecision, SqlLifecycleStore, VisaIssue};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::notify::{EmailComposer, EmailMessage, Notifier, NotifyError};
use crate::payment::PaymentSimulator;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total: i64,
    pub submitted: i64,
    pub under_review: i64,
    /// Favourable decisions. Approval collapses into issuance, so this includes ISSUED files.
    pub approved: i64,
    pub rejected: i64,
    pub issued: i64,
}

impl DashboardStats {
    pub fn from_counts(counts: &[(ApplicationStatus, i64)]) -> Self {
        let mut stats = Self::default();
        for (status, count) in counts {
            stats.total += count;
            match status {
                ApplicationStatus::Submitted => stats.submitted += count,
                ApplicationStatus::UnderReview => stats.under_review += count,
                ApplicationStatus::Approved => stats.approved += count,
                ApplicationStatus::Rejected => stats.rejected += count,
                ApplicationStatus::Issued => {
                    stats.issued += count;
                    stats.approved += count;
                }
                _ => {}
            }
        }
        stats
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDetail {
    #[serde(flatten)]
    pub application: Application,
    pub visa: Option<Visa>,
    pub payment: Option<Payment>,
    pub audit_logs: Vec<AuditEntry>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub status: ApplicationStatus,
    pub notes: Option<String>,
    pub actor_id: Option<String>,
    pub actor_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeOutcome {
    #[serde(flatten)]
    pub application: Application,
    pub visa: Option<Visa>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    pub visa: Visa,
    pub application: Application,
    pub is_valid: bool,
}

#[derive(Clone, Debug)]
pub struct VisaDocument {
    pub application: Application,
    pub visa: Visa,
    pub product: Option<VisaProduct>,
}

pub struct VisaWorkflow {
    applications: SqlApplicationRepository,
    visas: SqlVisaRepository,
    payments: SqlPaymentRepository,
    products: SqlProductRepository,
    audit_logs: SqlAuditLogRepository,
    users: SqlUserRepository,
    store: SqlLifecycleStore,
    simulator: PaymentSimulator,
    notifier: Arc<dyn Notifier>,
    composer: EmailComposer,
    payment: PaymentConfig,
}

impl VisaWorkflow {
    pub fn new(pool: DbPool, config: &AppConfig, notifier: Arc<dyn Notifier>) -> Self {
        let store = SqlLifecycleStore::new(pool.clone());
        let simulator = PaymentSimulator::new(
            store.clone(),
            config.payment.simulate,
            std::time::Duration::from_millis(config.payment.confirmation_delay_ms),
        );
        Self {
            applications: SqlApplicationRepository::new(pool.clone()),
            visas: SqlVisaRepository::new(pool.clone()),
            payments: SqlPaymentRepository::new(pool.clone()),
            products: SqlProductRepository::new(pool.clone()),
            audit_logs: SqlAuditLogRepository::new(pool.clone()),
            users: SqlUserRepository::new(pool),
            store,
            simulator,
            notifier,
            composer: EmailComposer::new(&config.email),
            payment: config.payment.clone(),
        }
    }

    pub async fn list_products(&self) -> Result<Vec<VisaProduct>, ApplicationError> {
        Ok(self.products.list_active().await?)
    }

    pub async fn create_draft(&self, draft: DraftRequest) -> Result<Application, ApplicationError> {
        validate_draft(&draft)?;

        let visa_type = match draft.visa_type.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            Some(raw) => {
                let visa_type = VisaType(raw.to_string());
                self.require_active_product(&visa_type).await?;
                visa_type
            }
            None => VisaType::default(),
        };

        let application = self.store.create_draft(&draft, visa_type, Utc::now()).await?;
        info!(
            event_name = "application.draft.created",
            correlation_id = %application.application_number,
            application_id = %application.id,
            "draft application created"
        );

        self.deliver(&application, self.composer.draft_created(&application)).await;
        Ok(application)
    }

    pub async fn get_application(&self, id: &ApplicationId) -> Result<Application, ApplicationError> {
        self.applications
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound(format!("application `{id}` not found")))
    }

    /// Applies an applicant's partial update; a `status` of SUBMITTED also submits the file.
    pub async fn update_application(
        &self,
        id: &ApplicationId,
        patch: ApplicationPatch,
    ) -> Result<Application, ApplicationError> {
        let mut application = self.get_application(id).await?;
        let previous_status = application.status;
        if !previous_status.is_applicant_editable() {
            return Err(ApplicationError::Conflict(format!(
                "application is {previous_status} and can no longer be edited"
            )));
        }

        validate_patch(&patch)?;
        if let Some(visa_type) = &patch.visa_type {
            self.require_active_product(visa_type).await?;
        }

        let now = Utc::now();
        application.apply_patch(&patch);
        check_stay_dates(&application)?;
        application.updated_at = now;

        let Some(requested) = patch.status else {
            self.applications.save_profile(&application).await?;
            return Ok(application);
        };

        let plan = plan_applicant_transition(previous_status, requested)?;
        if plan.requires(LifecycleAction::CheckSubmissionReadiness) {
            check_submission_ready(&application)?;
        }
        application.status = plan.to;
        if plan.requires(LifecycleAction::RecordSubmission) {
            application.submitted_at = Some(now);
        }

        let payment = if plan.requires(LifecycleAction::CreatePayment) {
            application.payment_status = PaymentStatus::Pending;
            Some(self.pending_payment(&application).await?)
        } else {
            None
        };

        let action = if previous_status == ApplicationStatus::Draft {
            audit::ACTION_SUBMITTED.to_string()
        } else {
            audit::status_action(plan.to)
        };
        let mut entry = AuditEntry::new(
            audit::APPLICANT_ACTOR,
            action,
            audit::ENTITY_APPLICATION,
            &application.id.0,
        )
        .with_metadata("previousStatus", previous_status.as_str())
        .with_metadata("newStatus", plan.to.as_str());
        if let Some(payment) = &payment {
            entry = entry.with_metadata("amount", payment.amount.to_string());
        }

        self.store.record_submission(&application, previous_status, payment.as_ref(), &entry).await?;
        info!(
            event_name = "application.submitted",
            correlation_id = %application.application_number,
            application_id = %application.id,
            from = %previous_status,
            to = %plan.to,
            "application submitted"
        );

        if payment.is_some() {
            self.simulator.schedule(application.id.clone());
        }
        if plan.requires(LifecycleAction::NotifyApplicant) {
            self.deliver(&application, self.composer.submitted(&application)).await;
        }
        Ok(application)
    }

    /// Looks up a file by its number for the applicant holding the matching email.
    pub async fn track(
        &self,
        application_number: &str,
        email: Option<&str>,
    ) -> Result<Application, ApplicationError> {
        let email = email.map(str::trim).filter(|email| !email.is_empty()).ok_or_else(|| {
            invalid("email", "email address is required to track an application")
        })?;

        let not_found =
            || ApplicationError::NotFound("no application matches this reference and email".to_string());
        let application =
            self.applications.find_by_number(application_number.trim()).await?.ok_or_else(not_found)?;
        if !application.email_matches(email) {
            return Err(not_found());
        }
        Ok(application)
    }

    pub async fn confirm_payment(
        &self,
        id: &ApplicationId,
        transaction_id: Option<String>,
    ) -> Result<Payment, ApplicationError> {
        let now = Utc::now();
        let transaction_id = transaction_id
            .map(|txn| txn.trim().to_string())
            .filter(|txn| !txn.is_empty())
            .unwrap_or_else(|| simulated_transaction_id(now));

        match self.store.confirm_payment(id, &transaction_id, now).await? {
            PaymentConfirmation::Confirmed(payment) => {
                info!(
                    event_name = "payment.confirmed",
                    correlation_id = %transaction_id,
                    application_id = %id,
                    "payment confirmed"
                );
                Ok(payment)
            }
            PaymentConfirmation::AlreadyPaid(payment) => Ok(payment),
            PaymentConfirmation::NotFound => {
                Err(ApplicationError::NotFound(format!("no payment recorded for application `{id}`")))
            }
        }
    }

    /// Returns the user when the credentials match, `None` otherwise.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<AdminUser>, ApplicationError> {
        let user = self.users.find_by_username(username.trim()).await?;
        match user {
            Some(user) if user.verify_password(password) => {
                info!(event_name = "admin.login.succeeded", username = %user.username, "officer logged in");
                Ok(Some(user))
            }
            _ => {
                warn!(event_name = "admin.login.failed", username = %username.trim(), "invalid credentials");
                Ok(None)
            }
        }
    }

    pub async fn stats(&self) -> Result<DashboardStats, ApplicationError> {
        let counts = self.applications.count_by_status().await?;
        Ok(DashboardStats::from_counts(&counts))
    }

    pub async fn list_applications(&self) -> Result<Vec<Application>, ApplicationError> {
        Ok(self.applications.list_all().await?)
    }

    pub async fn application_detail(
        &self,
        id: &ApplicationId,
    ) -> Result<ApplicationDetail, ApplicationError> {
        let application = self.get_application(id).await?;
        let visa = self.visas.find_by_application_id(id).await?;
        let payment = self.payments.find_by_application_id(id).await?;

        let mut audit_logs =
            self.audit_logs.list_for_entity(audit::ENTITY_APPLICATION, &id.0).await?;
        if let Some(payment) = &payment {
            audit_logs.extend(self.audit_logs.list_for_entity(audit::ENTITY_PAYMENT, &payment.id.0).await?);
            audit_logs.sort_by_key(|entry| entry.timestamp);
        }

        Ok(ApplicationDetail { application, visa, payment, audit_logs })
    }

    /// Applies an officer decision. Approval issues the visa in the same transaction.
    pub async fn change_status(
        &self,
        id: &ApplicationId,
        change: StatusChange,
    ) -> Result<StatusChangeOutcome, ApplicationError> {
        let mut application = self.get_application(id).await?;
        let previous_status = application.status;
        let plan = plan_admin_transition(previous_status, change.status)?;
        let notes = change.notes.map(|notes| notes.trim().to_string()).filter(|n| !n.is_empty());

        if plan.requires(LifecycleAction::StoreRejectionReason) {
            application.rejection_reason = notes.clone();
        }
        if plan.requires(LifecycleAction::StoreAdminNotes) && notes.is_some() {
            application.admin_notes = notes.clone();
        }
        let now = Utc::now();
        application.status = plan.to;
        application.updated_at = now;

        let product = if plan.requires(LifecycleAction::IssueVisa) {
            self.products.find_active(&application.visa_type).await?
        } else {
            None
        };

        let mut entry = AuditEntry::new(
            change.actor_name.as_deref().unwrap_or(audit::DEFAULT_ADMIN_ACTOR),
            audit::status_action(plan.requested),
            audit::ENTITY_APPLICATION,
            &application.id.0,
        )
        .with_metadata("previousStatus", previous_status.as_str())
        .with_metadata("newStatus", plan.to.as_str())
        .with_metadata("requestedStatus", plan.requested.as_str())
        .with_metadata("notes", notes.clone());
        if let Some(actor_id) = change.actor_id {
            entry = entry.with_actor_id(actor_id);
        }

        let visa = self
            .store
            .record_review_decision(ReviewDecision {
                application: &application,
                previous_status,
                visa: plan
                    .requires(LifecycleAction::IssueVisa)
                    .then_some(VisaIssue { product: product.as_ref(), issued_at: now }),
                audit: entry,
            })
            .await?;

        info!(
            event_name = "application.status.changed",
            correlation_id = %application.application_number,
            application_id = %application.id,
            from = %previous_status,
            requested = %plan.requested,
            to = %plan.to,
            visa_issued = visa.is_some(),
            "application status updated"
        );

        if plan.requires(LifecycleAction::NotifyApplicant) {
            let message = self.composer.status_changed(&application, plan.requested, notes.as_deref());
            self.deliver(&application, message).await;
        }
        Ok(StatusChangeOutcome { application, visa })
    }

    /// The issued visa with what is needed to print it. Not found unless the file is ISSUED.
    pub async fn visa_document(&self, id: &ApplicationId) -> Result<VisaDocument, ApplicationError> {
        let application = self.get_application(id).await?;
        if application.status != ApplicationStatus::Issued {
            return Err(ApplicationError::NotFound(format!("no issued visa for application `{id}`")));
        }
        let visa = self
            .visas
            .find_by_application_id(id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound(format!("visa record for `{id}` not found")))?;
        let product = self.products.find_active(&application.visa_type).await?;
        Ok(VisaDocument { application, visa, product })
    }

    pub async fn verify(&self, code: &str) -> Result<Verification, ApplicationError> {
        let visa = self
            .visas
            .find_by_verification_code(code)
            .await?
            .ok_or_else(|| ApplicationError::NotFound("unknown verification code".to_string()))?;
        let application = self.get_application(&visa.application_id).await?;
        let is_valid = visa.is_valid_on(Utc::now().date_naive(), application.status);
        Ok(Verification { visa, application, is_valid })
    }

    async fn require_active_product(&self, visa_type: &VisaType) -> Result<VisaProduct, ApplicationError> {
        self.products
            .find_active(visa_type)
            .await?
            .ok_or_else(|| invalid("visaType", format!("`{visa_type}` is not an available visa type")))
    }

    async fn pending_payment(&self, application: &Application) -> Result<Payment, ApplicationError> {
        let product = self.products.find_active(&application.visa_type).await?;
        Ok(Payment {
            id: PaymentId(uuid::Uuid::new_v4().to_string()),
            application_id: application.id.clone(),
            provider: self.payment.provider.clone(),
            phone_number: application.phone.clone().unwrap_or_default(),
            transaction_id: None,
            amount: amount_due(product.map(|p| p.price), self.payment.service_fee),
            currency: self.payment.currency.clone(),
            status: PaymentStatus::Pending,
            paid_at: None,
            created_at: application.updated_at,
        })
    }

    /// Sends after the write has committed. Delivery problems are logged, never returned.
    async fn deliver(&self, application: &Application, message: Result<EmailMessage, NotifyError>) {
        let result = match message {
            Ok(message) => self.notifier.send(&message).await,
            Err(error) => Err(error),
        };
        if let Err(error) = result {
            warn!(
                event_name = "notify.email.failed",
                correlation_id = %application.application_number,
                application_id = %application.id,
                error = %error,
                "applicant email could not be sent"
            );
        }
    }
}

fn invalid(field: &str, message: impl Into<String>) -> ApplicationError {
    ApplicationError::Domain(DomainError::Validation(vec![FieldError::new(field, message)]))
}
