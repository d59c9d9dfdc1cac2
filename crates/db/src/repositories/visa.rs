use sqlx::sqlite::SqliteRow;
use sqlx::SqliteConnection;

use evisa_core::domain::application::ApplicationId;
use evisa_core::domain::visa::{Visa, VisaId};

use super::{column, decode_timestamp, encode_timestamp, RepositoryError, VisaRepository};
use crate::DbPool;

pub struct SqlVisaRepository {
    pool: DbPool,
}

impl SqlVisaRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) async fn insert_visa(
    conn: &mut SqliteConnection,
    visa: &Visa,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO visas (id, visa_number, verification_code, application_id, valid_from,
                            valid_to, stay_duration, pdf_url, issued_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&visa.id.0)
    .bind(&visa.visa_number)
    .bind(&visa.verification_code)
    .bind(&visa.application_id.0)
    .bind(visa.valid_from)
    .bind(visa.valid_to)
    .bind(visa.stay_duration)
    .bind(&visa.pdf_url)
    .bind(encode_timestamp(visa.issued_at))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

fn row_to_visa(row: &SqliteRow) -> Result<Visa, RepositoryError> {
    let issued_at: String = column(row, "issued_at")?;

    Ok(Visa {
        id: VisaId(column(row, "id")?),
        visa_number: column(row, "visa_number")?,
        verification_code: column(row, "verification_code")?,
        application_id: ApplicationId(column(row, "application_id")?),
        valid_from: column(row, "valid_from")?,
        valid_to: column(row, "valid_to")?,
        stay_duration: column(row, "stay_duration")?,
        pdf_url: column(row, "pdf_url")?,
        issued_at: decode_timestamp(&issued_at)?,
    })
}

#[async_trait::async_trait]
impl VisaRepository for SqlVisaRepository {
    async fn find_by_application_id(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Option<Visa>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM visas WHERE application_id = ?")
            .bind(&application_id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_visa).transpose()
    }

    async fn find_by_verification_code(&self, code: &str) -> Result<Option<Visa>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM visas WHERE verification_code = ?")
            .bind(code.trim())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_visa).transpose()
    }
}
