use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::SqliteConnection;

use evisa_core::domain::application::ApplicationId;
use evisa_core::domain::payment::{Payment, PaymentId, PaymentStatus};

use super::{
    column, decode_optional_timestamp, decode_timestamp, encode_timestamp, parse_column,
    PaymentRepository, RepositoryError,
};
use crate::DbPool;

pub struct SqlPaymentRepository {
    pool: DbPool,
}

impl SqlPaymentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Inserts the payment unless the application already has one. Returns whether a row was written.
pub(crate) async fn insert_payment_if_absent(
    conn: &mut SqliteConnection,
    payment: &Payment,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        "INSERT INTO payments (id, application_id, provider, phone_number, transaction_id,
                               amount, currency, status, paid_at, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(application_id) DO NOTHING",
    )
    .bind(&payment.id.0)
    .bind(&payment.application_id.0)
    .bind(&payment.provider)
    .bind(&payment.phone_number)
    .bind(&payment.transaction_id)
    .bind(payment.amount.to_string())
    .bind(&payment.currency)
    .bind(payment.status.as_str())
    .bind(payment.paid_at.map(encode_timestamp))
    .bind(encode_timestamp(payment.created_at))
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Flips an unpaid payment to PAID. Returns false when it was already paid or does not exist.
pub(crate) async fn mark_paid(
    conn: &mut SqliteConnection,
    application_id: &ApplicationId,
    transaction_id: &str,
    paid_at: DateTime<Utc>,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        "UPDATE payments
         SET status = ?, transaction_id = ?, paid_at = ?
         WHERE application_id = ? AND status <> ?",
    )
    .bind(PaymentStatus::Paid.as_str())
    .bind(transaction_id)
    .bind(encode_timestamp(paid_at))
    .bind(&application_id.0)
    .bind(PaymentStatus::Paid.as_str())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub(crate) async fn find_payment(
    conn: &mut SqliteConnection,
    application_id: &ApplicationId,
) -> Result<Option<Payment>, RepositoryError> {
    let row = sqlx::query("SELECT * FROM payments WHERE application_id = ?")
        .bind(&application_id.0)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(row_to_payment).transpose()
}

fn row_to_payment(row: &SqliteRow) -> Result<Payment, RepositoryError> {
    let amount: String = column(row, "amount")?;
    let status: String = column(row, "status")?;
    let created_at: String = column(row, "created_at")?;

    Ok(Payment {
        id: PaymentId(column(row, "id")?),
        application_id: ApplicationId(column(row, "application_id")?),
        provider: column(row, "provider")?,
        phone_number: column(row, "phone_number")?,
        transaction_id: column(row, "transaction_id")?,
        amount: parse_column::<Decimal>(&amount, "amount")?,
        currency: column(row, "currency")?,
        status: parse_column(&status, "payment status")?,
        paid_at: decode_optional_timestamp(column(row, "paid_at")?)?,
        created_at: decode_timestamp(&created_at)?,
    })
}

#[async_trait::async_trait]
impl PaymentRepository for SqlPaymentRepository {
    async fn find_by_application_id(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Option<Payment>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        find_payment(&mut conn, application_id).await
    }
}
