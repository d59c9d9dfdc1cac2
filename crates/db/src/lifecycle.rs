//! Multi-step writes of the application workflow. Each operation is one
//! transaction: either every row lands or none does.

use chrono::{DateTime, Utc};

use evisa_core::audit::{self, AuditEntry};
use evisa_core::domain::application::{
    Application, ApplicationId, ApplicationStatus, DraftRequest,
};
use evisa_core::domain::payment::{Payment, PaymentStatus};
use evisa_core::domain::product::{VisaProduct, VisaType};
use evisa_core::domain::visa::Visa;
use evisa_core::lifecycle::issue_visa;
use evisa_core::numbering;

use crate::repositories::application::{
    find_application, insert_application, sync_payment_status, update_application,
};
use crate::repositories::audit_log::insert_entry;
use crate::repositories::payment::{find_payment, insert_payment_if_absent, mark_paid};
use crate::repositories::sequence::{next_value, APPLICATION_COUNTER, VISA_COUNTER};
use crate::repositories::visa::insert_visa;
use crate::repositories::RepositoryError;
use crate::DbPool;

/// Visa to mint as part of a review decision.
#[derive(Clone, Copy, Debug)]
pub struct VisaIssue<'a> {
    pub product: Option<&'a VisaProduct>,
    pub issued_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct ReviewDecision<'a> {
    /// Application with the decided status and notes already applied.
    pub application: &'a Application,
    pub previous_status: ApplicationStatus,
    pub visa: Option<VisaIssue<'a>>,
    pub audit: AuditEntry,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PaymentConfirmation {
    Confirmed(Payment),
    AlreadyPaid(Payment),
    NotFound,
}

#[derive(Clone)]
pub struct SqlLifecycleStore {
    pool: DbPool,
}

impl SqlLifecycleStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Allocates the next application sequence, numbers and inserts the draft, and audits it.
    pub async fn create_draft(
        &self,
        draft: &DraftRequest,
        visa_type: VisaType,
        now: DateTime<Utc>,
    ) -> Result<Application, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sequence = next_value(&mut tx, APPLICATION_COUNTER).await?;
        let number = numbering::application_number(&draft.nationality, now, sequence);
        let application = Application::new_draft(draft, visa_type, number, sequence, now);
        insert_application(&mut tx, &application).await?;

        let entry = AuditEntry::new(
            audit::APPLICANT_ACTOR,
            audit::ACTION_DRAFT_CREATED,
            audit::ENTITY_APPLICATION,
            &application.id.0,
        )
        .with_metadata("applicationNumber", application.application_number.clone())
        .with_metadata("sequence", sequence);
        insert_entry(&mut tx, &entry).await?;

        tx.commit().await?;
        Ok(application)
    }

    /// Persists an applicant's submission (or resubmission) together with its payment and audit row.
    pub async fn record_submission(
        &self,
        application: &Application,
        previous_status: ApplicationStatus,
        payment: Option<&Payment>,
        entry: &AuditEntry,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        guarded_update(&mut tx, application, previous_status).await?;
        if let Some(payment) = payment {
            insert_payment_if_absent(&mut tx, payment).await?;
            sync_payment_status(&mut tx, &application.id).await?;
        }
        insert_entry(&mut tx, entry).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Applies an officer's decision, minting the visa when approved. Returns the visa if one was issued.
    pub async fn record_review_decision(
        &self,
        decision: ReviewDecision<'_>,
    ) -> Result<Option<Visa>, RepositoryError> {
        let ReviewDecision { application, previous_status, visa, audit: mut entry } = decision;
        let mut tx = self.pool.begin().await?;

        guarded_update(&mut tx, application, previous_status).await?;

        let issued = match visa {
            Some(issue) => {
                let sequence = next_value(&mut tx, VISA_COUNTER).await?;
                let visa = issue_visa(application, issue.product, sequence, issue.issued_at);
                insert_visa(&mut tx, &visa).await?;
                entry = entry
                    .with_metadata("visaNumber", visa.visa_number.clone())
                    .with_metadata("validTo", visa.valid_to.to_string());
                Some(visa)
            }
            None => None,
        };
        insert_entry(&mut tx, &entry).await?;

        tx.commit().await?;
        Ok(issued)
    }

    /// Marks the application's payment as paid. Confirming twice is a no-op.
    pub async fn confirm_payment(
        &self,
        application_id: &ApplicationId,
        transaction_id: &str,
        now: DateTime<Utc>,
    ) -> Result<PaymentConfirmation, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if !mark_paid(&mut tx, application_id, transaction_id, now).await? {
            let existing = find_payment(&mut tx, application_id).await?;
            tx.commit().await?;
            return Ok(match existing {
                Some(payment) => PaymentConfirmation::AlreadyPaid(payment),
                None => PaymentConfirmation::NotFound,
            });
        }

        sqlx::query("UPDATE applications SET payment_status = ?, updated_at = ? WHERE id = ?")
            .bind(PaymentStatus::Paid.as_str())
            .bind(crate::repositories::encode_timestamp(now))
            .bind(&application_id.0)
            .execute(&mut *tx)
            .await?;

        let payment = find_payment(&mut tx, application_id).await?.ok_or_else(|| {
            RepositoryError::Decode(format!("payment for `{application_id}` vanished mid-update"))
        })?;

        let entry = AuditEntry::new(
            audit::PAYMENT_ACTOR,
            audit::ACTION_PAYMENT_CONFIRMED,
            audit::ENTITY_PAYMENT,
            &payment.id.0,
        )
        .with_metadata("applicationId", application_id.0.clone())
        .with_metadata("transactionId", transaction_id.to_string())
        .with_metadata("amount", payment.amount.to_string())
        .with_metadata("currency", payment.currency.clone());
        insert_entry(&mut tx, &entry).await?;

        tx.commit().await?;
        Ok(PaymentConfirmation::Confirmed(payment))
    }

    pub async fn find_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<Application>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        find_application(&mut conn, id).await
    }
}

async fn guarded_update(
    conn: &mut sqlx::SqliteConnection,
    application: &Application,
    previous_status: ApplicationStatus,
) -> Result<(), RepositoryError> {
    if update_application(conn, application, Some(previous_status)).await? {
        Ok(())
    } else {
        Err(RepositoryError::Conflict(format!(
            "application `{}` is no longer {previous_status}",
            application.id
        )))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use evisa_core::audit::{self, AuditEntry};
    use evisa_core::domain::application::{ApplicationId, ApplicationStatus, DraftRequest};
    use evisa_core::domain::payment::{Payment, PaymentId, PaymentStatus};
    use evisa_core::domain::product::VisaType;

    use super::{PaymentConfirmation, ReviewDecision, SqlLifecycleStore, VisaIssue};
    use crate::repositories::application::insert_application;
    use crate::repositories::{
        AuditLogRepository, ProductRepository, RepositoryError, SqlAuditLogRepository,
        SqlProductRepository, SqlVisaRepository, VisaRepository,
    };
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        pool
    }

    fn draft(nationality: &str) -> DraftRequest {
        DraftRequest {
            first_name: "Jean".to_string(),
            last_name: "Dupont".to_string(),
            email: "jean.dupont@example.com".to_string(),
            nationality: nationality.to_string(),
            visa_type: None,
        }
    }

    fn admin_audit(id: &str, requested: ApplicationStatus) -> AuditEntry {
        AuditEntry::new(
            audit::DEFAULT_ADMIN_ACTOR,
            audit::status_action(requested),
            audit::ENTITY_APPLICATION,
            id,
        )
    }

    #[tokio::test]
    async fn drafts_get_consecutive_numbers_and_an_audit_row() {
        let pool = setup().await;
        let store = SqlLifecycleStore::new(pool.clone());

        let first = store.create_draft(&draft("France"), VisaType::default(), Utc::now()).await.expect("first");
        let second = store.create_draft(&draft("Atlantide"), VisaType::default(), Utc::now()).await.expect("second");

        assert_eq!(first.sequence_number, 1);
        assert_eq!(second.sequence_number, 2);
        assert!(first.application_number.starts_with("eVisa-FRA-"));
        assert!(first.application_number.ends_with("-00001"));
        assert!(second.application_number.starts_with("eVisa-XXX-"));

        let trail = SqlAuditLogRepository::new(pool)
            .list_for_entity(audit::ENTITY_APPLICATION, &first.id.0)
            .await
            .expect("trail");
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].action, audit::ACTION_DRAFT_CREATED);
    }

    #[tokio::test]
    async fn approval_issues_exactly_one_visa_with_product_window() {
        let pool = setup().await;
        let store = SqlLifecycleStore::new(pool.clone());
        let product = SqlProductRepository::new(pool.clone())
            .find_active(&VisaType::default())
            .await
            .expect("product")
            .expect("seeded");

        let mut application =
            store.create_draft(&draft("France"), VisaType::default(), Utc::now()).await.expect("draft");
        application.status = ApplicationStatus::UnderReview;
        application.arrival_date = NaiveDate::from_ymd_opt(2026, 6, 1);
        store
            .record_submission(
                &application,
                ApplicationStatus::Draft,
                None,
                &admin_audit(&application.id.0, ApplicationStatus::UnderReview),
            )
            .await
            .expect("move to review");

        let previous = application.status;
        application.status = ApplicationStatus::Issued;
        let visa = store
            .record_review_decision(ReviewDecision {
                application: &application,
                previous_status: previous,
                visa: Some(VisaIssue { product: Some(&product), issued_at: Utc::now() }),
                audit: admin_audit(&application.id.0, ApplicationStatus::Approved),
            })
            .await
            .expect("approve")
            .expect("visa issued");

        assert_eq!(visa.visa_number, "E-VVL/DGM/DG/CAB/0000001");
        assert_eq!(visa.valid_from, NaiveDate::from_ymd_opt(2026, 6, 1).expect("date"));
        assert_eq!(visa.valid_to, NaiveDate::from_ymd_opt(2026, 6, 8).expect("date"));

        let again = store
            .record_review_decision(ReviewDecision {
                application: &application,
                previous_status: ApplicationStatus::Issued,
                visa: Some(VisaIssue { product: Some(&product), issued_at: Utc::now() }),
                audit: admin_audit(&application.id.0, ApplicationStatus::Approved),
            })
            .await;
        assert!(matches!(again, Err(RepositoryError::Conflict(_))));

        let stored = SqlVisaRepository::new(pool)
            .find_by_application_id(&application.id)
            .await
            .expect("lookup")
            .expect("visa row");
        assert_eq!(stored.id, visa.id);
    }

    #[tokio::test]
    async fn failed_visa_insert_leaves_status_unchanged() {
        let pool = setup().await;
        let store = SqlLifecycleStore::new(pool.clone());

        let mut application =
            store.create_draft(&draft("Kenya"), VisaType::default(), Utc::now()).await.expect("draft");
        application.status = ApplicationStatus::Submitted;
        store
            .record_submission(
                &application,
                ApplicationStatus::Draft,
                None,
                &admin_audit(&application.id.0, ApplicationStatus::Submitted),
            )
            .await
            .expect("submit");

        // Another file already holds the next visa number, so the insert hits the unique index.
        let mut holder = application.clone();
        holder.id = ApplicationId("holder".to_string());
        holder.application_number = "eVisa-KEN-26-99999".to_string();
        holder.sequence_number = 999;
        let mut conn = pool.acquire().await.expect("conn");
        insert_application(&mut conn, &holder).await.expect("holder");
        drop(conn);
        sqlx::query(
            "INSERT INTO visas (id, visa_number, verification_code, application_id, valid_from,
                                valid_to, stay_duration, pdf_url, issued_at)
             VALUES ('v-holder', 'E-VVL/DGM/DG/CAB/0000001', 'VFY-TAKEN-0000', 'holder',
                     '2026-01-01', '2026-01-08', 7, NULL, '2026-01-01T00:00:00.000Z')",
        )
        .execute(&pool)
        .await
        .expect("occupy visa number");

        let mut approved = application.clone();
        approved.status = ApplicationStatus::Issued;
        let result = store
            .record_review_decision(ReviewDecision {
                application: &approved,
                previous_status: ApplicationStatus::Submitted,
                visa: Some(VisaIssue { product: None, issued_at: Utc::now() }),
                audit: admin_audit(&approved.id.0, ApplicationStatus::Approved),
            })
            .await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));

        let reloaded = store.find_application(&application.id).await.expect("find").expect("row");
        assert_eq!(reloaded.status, ApplicationStatus::Submitted);
        let trail = SqlAuditLogRepository::new(pool)
            .list_for_entity(audit::ENTITY_APPLICATION, &application.id.0)
            .await
            .expect("trail");
        assert!(trail.iter().all(|entry| entry.action != "APPLICATION_APPROVED"));
    }

    #[tokio::test]
    async fn payment_confirmation_is_idempotent() {
        let pool = setup().await;
        let store = SqlLifecycleStore::new(pool.clone());

        let mut application =
            store.create_draft(&draft("Ghana"), VisaType::default(), Utc::now()).await.expect("draft");
        application.status = ApplicationStatus::Submitted;
        application.payment_status = PaymentStatus::Pending;
        let payment = Payment {
            id: PaymentId("pay-1".to_string()),
            application_id: application.id.clone(),
            provider: "MPESA".to_string(),
            phone_number: "+233 20 123 4567".to_string(),
            transaction_id: None,
            amount: Decimal::new(255, 0),
            currency: "USD".to_string(),
            status: PaymentStatus::Pending,
            paid_at: None,
            created_at: Utc::now(),
        };
        store
            .record_submission(
                &application,
                ApplicationStatus::Draft,
                Some(&payment),
                &admin_audit(&application.id.0, ApplicationStatus::Submitted),
            )
            .await
            .expect("submit");

        let first = store.confirm_payment(&application.id, "TXN-1", Utc::now()).await.expect("confirm");
        let PaymentConfirmation::Confirmed(paid) = first else {
            panic!("expected first confirmation to apply");
        };
        assert_eq!(paid.status, PaymentStatus::Paid);
        assert_eq!(paid.transaction_id.as_deref(), Some("TXN-1"));

        let second = store.confirm_payment(&application.id, "TXN-2", Utc::now()).await.expect("confirm");
        let PaymentConfirmation::AlreadyPaid(unchanged) = second else {
            panic!("expected second confirmation to be a no-op");
        };
        assert_eq!(unchanged.transaction_id.as_deref(), Some("TXN-1"));

        let reloaded = store.find_application(&application.id).await.expect("find").expect("row");
        assert_eq!(reloaded.payment_status, PaymentStatus::Paid);

        let trail = SqlAuditLogRepository::new(pool)
            .list_for_entity(audit::ENTITY_PAYMENT, "pay-1")
            .await
            .expect("trail");
        assert_eq!(trail.len(), 1);
    }

    #[tokio::test]
    async fn review_after_payment_keeps_file_paid() {
        let pool = setup().await;
        let store = SqlLifecycleStore::new(pool.clone());

        let mut application =
            store.create_draft(&draft("Togo"), VisaType::default(), Utc::now()).await.expect("draft");
        application.status = ApplicationStatus::Submitted;
        application.payment_status = PaymentStatus::Pending;
        let payment = Payment {
            id: PaymentId("pay-race".to_string()),
            application_id: application.id.clone(),
            provider: "MPESA".to_string(),
            phone_number: "+228 90 12 34 56".to_string(),
            transaction_id: None,
            amount: Decimal::new(255, 0),
            currency: "USD".to_string(),
            status: PaymentStatus::Pending,
            paid_at: None,
            created_at: Utc::now(),
        };
        store
            .record_submission(
                &application,
                ApplicationStatus::Draft,
                Some(&payment),
                &admin_audit(&application.id.0, ApplicationStatus::Submitted),
            )
            .await
            .expect("submit");

        // The officer works from a copy read before the payment lands.
        let mut loaded = store.find_application(&application.id).await.expect("find").expect("row");
        assert_eq!(loaded.payment_status, PaymentStatus::Pending);
        store.confirm_payment(&application.id, "TXN-1", Utc::now()).await.expect("confirm");

        loaded.status = ApplicationStatus::UnderReview;
        store
            .record_review_decision(ReviewDecision {
                application: &loaded,
                previous_status: ApplicationStatus::Submitted,
                visa: None,
                audit: admin_audit(&loaded.id.0, ApplicationStatus::UnderReview),
            })
            .await
            .expect("review");

        let reloaded = store.find_application(&application.id).await.expect("find").expect("row");
        assert_eq!(reloaded.status, ApplicationStatus::UnderReview);
        assert_eq!(reloaded.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn resubmission_does_not_reset_a_paid_file() {
        let pool = setup().await;
        let store = SqlLifecycleStore::new(pool.clone());

        let mut application =
            store.create_draft(&draft("Mali"), VisaType::default(), Utc::now()).await.expect("draft");
        application.status = ApplicationStatus::Submitted;
        let mut payment = Payment {
            id: PaymentId("pay-resubmit".to_string()),
            application_id: application.id.clone(),
            provider: "MPESA".to_string(),
            phone_number: "+223 70 12 34 56".to_string(),
            transaction_id: None,
            amount: Decimal::new(255, 0),
            currency: "USD".to_string(),
            status: PaymentStatus::Pending,
            paid_at: None,
            created_at: Utc::now(),
        };
        store
            .record_submission(
                &application,
                ApplicationStatus::Draft,
                Some(&payment),
                &admin_audit(&application.id.0, ApplicationStatus::Submitted),
            )
            .await
            .expect("submit");
        store.confirm_payment(&application.id, "TXN-9", Utc::now()).await.expect("confirm");

        let previous = application.status;
        application.status = ApplicationStatus::UnderReview;
        payment.id = PaymentId("pay-resubmit-2".to_string());
        store
            .record_submission(
                &application,
                previous,
                Some(&payment),
                &admin_audit(&application.id.0, ApplicationStatus::UnderReview),
            )
            .await
            .expect("resubmit");

        let reloaded = store.find_application(&application.id).await.expect("find").expect("row");
        assert_eq!(reloaded.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn confirming_unknown_payment_reports_not_found() {
        let pool = setup().await;
        let store = SqlLifecycleStore::new(pool);
        let outcome = store
            .confirm_payment(&ApplicationId("missing".to_string()), "TXN-0", Utc::now())
            .await
            .expect("confirm");
        assert_eq!(outcome, PaymentConfirmation::NotFound);
    }
}
