use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite};
use thiserror::Error;

use evisa_core::audit::AuditEntry;
use evisa_core::domain::application::{Application, ApplicationId, ApplicationStatus};
use evisa_core::domain::payment::Payment;
use evisa_core::domain::product::{VisaProduct, VisaType};
use evisa_core::domain::user::AdminUser;
use evisa_core::domain::visa::Visa;
use evisa_core::errors::ApplicationError;

pub mod application;
pub mod audit_log;
pub mod payment;
pub mod product;
pub mod sequence;
pub mod user;
pub mod visa;

pub use application::SqlApplicationRepository;
pub use audit_log::SqlAuditLogRepository;
pub use payment::SqlPaymentRepository;
pub use product::SqlProductRepository;
pub use user::SqlUserRepository;
pub use visa::SqlVisaRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(sqlx::Error),
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(error: sqlx::Error) -> Self {
        match error.as_database_error() {
            Some(db_error) if db_error.is_unique_violation() => {
                Self::Conflict(db_error.message().to_string())
            }
            _ => Self::Database(error),
        }
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Conflict(message) => Self::Conflict(message),
            other => Self::Persistence(other.to_string()),
        }
    }
}

#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    async fn find_by_id(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError>;
    /// Case-insensitive lookup by public reference, e.g. `evisa-fra-26-00001`.
    async fn find_by_number(&self, number: &str) -> Result<Option<Application>, RepositoryError>;
    /// Newest submission first; drafts that were never submitted come last.
    async fn list_all(&self) -> Result<Vec<Application>, RepositoryError>;
    async fn count_by_status(&self) -> Result<Vec<(ApplicationStatus, i64)>, RepositoryError>;
    /// Persists applicant-editable fields without touching the status workflow.
    async fn save_profile(&self, application: &Application) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait VisaRepository: Send + Sync {
    async fn find_by_application_id(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Option<Visa>, RepositoryError>;
    async fn find_by_verification_code(&self, code: &str) -> Result<Option<Visa>, RepositoryError>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn find_by_application_id(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Option<Payment>, RepositoryError>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn list_active(&self) -> Result<Vec<VisaProduct>, RepositoryError>;
    async fn find_active(&self, visa_type: &VisaType) -> Result<Option<VisaProduct>, RepositoryError>;
}

#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    async fn insert(&self, entry: &AuditEntry) -> Result<(), RepositoryError>;
    async fn list_for_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<AuditEntry>, RepositoryError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<AdminUser>, RepositoryError>;
    async fn save(&self, user: &AdminUser) -> Result<(), RepositoryError>;
}

/// Fixed-width RFC 3339 so text ordering in SQLite matches time ordering.
pub(crate) fn encode_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("invalid timestamp `{raw}`: {e}")))
}

pub(crate) fn decode_optional_timestamp(
    raw: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    raw.as_deref().map(decode_timestamp).transpose()
}

pub(crate) fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name).map_err(|e| RepositoryError::Decode(e.to_string()))
}

pub(crate) fn parse_column<T>(raw: &str, what: &str) -> Result<T, RepositoryError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| RepositoryError::Decode(format!("invalid {what} `{raw}`: {e}")))
}
