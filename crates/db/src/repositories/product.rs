use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;

use evisa_core::domain::product::{VisaProduct, VisaType};

use super::{column, parse_column, ProductRepository, RepositoryError};
use crate::DbPool;

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_product(row: &SqliteRow) -> Result<VisaProduct, RepositoryError> {
    let price: String = column(row, "price")?;
    let is_active: i64 = column(row, "is_active")?;

    Ok(VisaProduct {
        visa_type: VisaType(column(row, "visa_type")?),
        label_fr: column(row, "label_fr")?,
        label_en: column(row, "label_en")?,
        price: parse_column::<Decimal>(&price, "price")?,
        currency: column(row, "currency")?,
        duration_days: column(row, "duration_days")?,
        validity_months: column(row, "validity_months")?,
        is_active: is_active != 0,
    })
}

#[async_trait::async_trait]
impl ProductRepository for SqlProductRepository {
    async fn list_active(&self) -> Result<Vec<VisaProduct>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM visa_products WHERE is_active = 1 ORDER BY CAST(price AS REAL), visa_type",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_product).collect()
    }

    async fn find_active(&self, visa_type: &VisaType) -> Result<Option<VisaProduct>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM visa_products WHERE visa_type = ? AND is_active = 1")
            .bind(&visa_type.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_product).transpose()
    }
}
