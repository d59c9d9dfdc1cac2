use chrono::NaiveDate;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Sqlite, SqliteConnection};

use evisa_core::domain::application::{Application, ApplicationId, ApplicationStatus};
use evisa_core::domain::product::VisaType;

use super::{
    column, decode_optional_timestamp, decode_timestamp, encode_timestamp, parse_column,
    ApplicationRepository, RepositoryError,
};
use crate::DbPool;

/// Columns a save rewrites. Identity columns (`id`, numbering, `created_at`) are insert-only, and
/// `payment_status` is only written by the payment steps so a stale copy cannot roll it back.
const MUTABLE_COLUMNS: [&str; 33] = [
    "visa_type",
    "status",
    "first_name",
    "last_name",
    "email",
    "phone",
    "nationality",
    "date_of_birth",
    "place_of_birth",
    "gender",
    "civil_status",
    "occupation",
    "address",
    "country_of_origin",
    "passport_number",
    "passport_issue_date",
    "passport_expiry_date",
    "passport_issuing_country",
    "arrival_date",
    "departure_date",
    "entry_point",
    "purpose_of_visit",
    "institution_code",
    "sponsor_first_name",
    "sponsor_last_name",
    "sponsor_address",
    "sponsor_phone",
    "photo_path",
    "passport_copy_path",
    "admin_notes",
    "rejection_reason",
    "submitted_at",
    "updated_at",
];

pub struct SqlApplicationRepository {
    pool: DbPool,
}

impl SqlApplicationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn bind_mutable<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    application: &'q Application,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    query
        .bind(&application.visa_type.0)
        .bind(application.status.as_str())
        .bind(&application.first_name)
        .bind(&application.last_name)
        .bind(&application.email)
        .bind(&application.phone)
        .bind(&application.nationality)
        .bind(application.date_of_birth)
        .bind(&application.place_of_birth)
        .bind(&application.gender)
        .bind(&application.civil_status)
        .bind(&application.occupation)
        .bind(&application.address)
        .bind(&application.country_of_origin)
        .bind(&application.passport_number)
        .bind(application.passport_issue_date)
        .bind(application.passport_expiry_date)
        .bind(&application.passport_issuing_country)
        .bind(application.arrival_date)
        .bind(application.departure_date)
        .bind(&application.entry_point)
        .bind(&application.purpose_of_visit)
        .bind(&application.institution_code)
        .bind(&application.sponsor_first_name)
        .bind(&application.sponsor_last_name)
        .bind(&application.sponsor_address)
        .bind(&application.sponsor_phone)
        .bind(&application.photo_path)
        .bind(&application.passport_copy_path)
        .bind(&application.admin_notes)
        .bind(&application.rejection_reason)
        .bind(application.submitted_at.map(encode_timestamp))
        .bind(encode_timestamp(application.updated_at))
}

pub(crate) async fn insert_application(
    conn: &mut SqliteConnection,
    application: &Application,
) -> Result<(), RepositoryError> {
    let placeholders = vec!["?"; MUTABLE_COLUMNS.len() + 5].join(", ");
    let sql = format!(
        "INSERT INTO applications
             (id, application_number, sequence_number, created_at, payment_status, {})
         VALUES ({placeholders})",
        MUTABLE_COLUMNS.join(", ")
    );

    let query = sqlx::query(&sql)
        .bind(&application.id.0)
        .bind(&application.application_number)
        .bind(application.sequence_number)
        .bind(encode_timestamp(application.created_at))
        .bind(application.payment_status.as_str());
    bind_mutable(query, application).execute(&mut *conn).await?;

    Ok(())
}

/// Copies the status of the file's payment row, if any, onto the application.
pub(crate) async fn sync_payment_status(
    conn: &mut SqliteConnection,
    id: &ApplicationId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE applications
         SET payment_status = (SELECT status FROM payments WHERE application_id = applications.id)
         WHERE id = ? AND EXISTS (SELECT 1 FROM payments WHERE application_id = applications.id)",
    )
    .bind(&id.0)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Rewrites every mutable column. With `expected_status`, the write only lands if the stored
/// status still matches, so a concurrent decision cannot be silently overwritten.
pub(crate) async fn update_application(
    conn: &mut SqliteConnection,
    application: &Application,
    expected_status: Option<ApplicationStatus>,
) -> Result<bool, RepositoryError> {
    let assignments =
        MUTABLE_COLUMNS.iter().map(|name| format!("{name} = ?")).collect::<Vec<_>>().join(", ");
    let guard = expected_status.map(|status| status.as_str());
    let sql = format!(
        "UPDATE applications SET {assignments} WHERE id = ? AND (? IS NULL OR status = ?)"
    );
    let result = bind_mutable(sqlx::query(&sql), application)
        .bind(&application.id.0)
        .bind(guard)
        .bind(guard)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() == 1)
}

pub(crate) async fn find_application(
    conn: &mut SqliteConnection,
    id: &ApplicationId,
) -> Result<Option<Application>, RepositoryError> {
    let row = sqlx::query("SELECT * FROM applications WHERE id = ?")
        .bind(&id.0)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(row_to_application).transpose()
}

pub(crate) fn row_to_application(row: &SqliteRow) -> Result<Application, RepositoryError> {
    let status: String = column(row, "status")?;
    let payment_status: String = column(row, "payment_status")?;
    let created_at: String = column(row, "created_at")?;
    let updated_at: String = column(row, "updated_at")?;
    let date = |name: &str| -> Result<Option<NaiveDate>, RepositoryError> { column(row, name) };

    Ok(Application {
        id: ApplicationId(column(row, "id")?),
        application_number: column(row, "application_number")?,
        sequence_number: column(row, "sequence_number")?,
        visa_type: VisaType(column(row, "visa_type")?),
        status: parse_column(&status, "application status")?,
        first_name: column(row, "first_name")?,
        last_name: column(row, "last_name")?,
        email: column(row, "email")?,
        phone: column(row, "phone")?,
        nationality: column(row, "nationality")?,
        date_of_birth: date("date_of_birth")?,
        place_of_birth: column(row, "place_of_birth")?,
        gender: column(row, "gender")?,
        civil_status: column(row, "civil_status")?,
        occupation: column(row, "occupation")?,
        address: column(row, "address")?,
        country_of_origin: column(row, "country_of_origin")?,
        passport_number: column(row, "passport_number")?,
        passport_issue_date: date("passport_issue_date")?,
        passport_expiry_date: date("passport_expiry_date")?,
        passport_issuing_country: column(row, "passport_issuing_country")?,
        arrival_date: date("arrival_date")?,
        departure_date: date("departure_date")?,
        entry_point: column(row, "entry_point")?,
        purpose_of_visit: column(row, "purpose_of_visit")?,
        institution_code: column(row, "institution_code")?,
        sponsor_first_name: column(row, "sponsor_first_name")?,
        sponsor_last_name: column(row, "sponsor_last_name")?,
        sponsor_address: column(row, "sponsor_address")?,
        sponsor_phone: column(row, "sponsor_phone")?,
        photo_path: column(row, "photo_path")?,
        passport_copy_path: column(row, "passport_copy_path")?,
        payment_status: parse_column(&payment_status, "payment status")?,
        admin_notes: column(row, "admin_notes")?,
        rejection_reason: column(row, "rejection_reason")?,
        submitted_at: decode_optional_timestamp(column(row, "submitted_at")?)?,
        created_at: decode_timestamp(&created_at)?,
        updated_at: decode_timestamp(&updated_at)?,
    })
}

#[async_trait::async_trait]
impl ApplicationRepository for SqlApplicationRepository {
    async fn find_by_id(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        find_application(&mut conn, id).await
    }

    async fn find_by_number(&self, number: &str) -> Result<Option<Application>, RepositoryError> {
        let row =
            sqlx::query("SELECT * FROM applications WHERE UPPER(application_number) = UPPER(?)")
                .bind(number.trim())
                .fetch_optional(&self.pool)
                .await?;

        row.as_ref().map(row_to_application).transpose()
    }

    async fn list_all(&self) -> Result<Vec<Application>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM applications
             ORDER BY submitted_at IS NULL, submitted_at DESC, created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_application).collect()
    }

    async fn count_by_status(&self) -> Result<Vec<(ApplicationStatus, i64)>, RepositoryError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM applications GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(status, count)| Ok((parse_column(&status, "application status")?, count)))
            .collect()
    }

    async fn save_profile(&self, application: &Application) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        if update_application(&mut conn, application, Some(application.status)).await? {
            Ok(())
        } else {
            Err(RepositoryError::Conflict(format!(
                "application `{}` changed status while being edited",
                application.id
            )))
        }
    }
}
