use sqlx::SqliteConnection;

use super::RepositoryError;

pub const APPLICATION_COUNTER: &str = "application";
pub const VISA_COUNTER: &str = "visa";

/// Advances a named counter and returns the new value.
///
/// Runs on the caller's connection so the increment commits or rolls back with the
/// rest of the transaction; two writers can never observe the same value.
pub async fn next_value(conn: &mut SqliteConnection, counter: &str) -> Result<i64, RepositoryError> {
    let value: Option<i64> = sqlx::query_scalar(
        "UPDATE sequence_counter SET value = value + 1 WHERE name = ? RETURNING value",
    )
    .bind(counter)
    .fetch_optional(&mut *conn)
    .await?;

    value.ok_or_else(|| RepositoryError::Decode(format!("sequence counter `{counter}` is missing")))
}

#[cfg(test)]
mod tests {
    use super::{next_value, APPLICATION_COUNTER, VISA_COUNTER};
    use crate::repositories::RepositoryError;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn counters_start_at_one_and_are_independent() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        let mut conn = pool.acquire().await.expect("conn");

        assert_eq!(next_value(&mut conn, APPLICATION_COUNTER).await.expect("next"), 1);
        assert_eq!(next_value(&mut conn, APPLICATION_COUNTER).await.expect("next"), 2);
        assert_eq!(next_value(&mut conn, VISA_COUNTER).await.expect("next"), 1);
    }

    #[tokio::test]
    async fn rolled_back_allocation_is_released() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");

        let mut tx = pool.begin().await.expect("begin");
        assert_eq!(next_value(&mut tx, APPLICATION_COUNTER).await.expect("next"), 1);
        tx.rollback().await.expect("rollback");

        let mut conn = pool.acquire().await.expect("conn");
        assert_eq!(next_value(&mut conn, APPLICATION_COUNTER).await.expect("next"), 1);
    }

    #[tokio::test]
    async fn unknown_counter_is_reported() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        let mut conn = pool.acquire().await.expect("conn");

        assert!(matches!(next_value(&mut conn, "invoice").await, Err(RepositoryError::Decode(_))));
    }
}
