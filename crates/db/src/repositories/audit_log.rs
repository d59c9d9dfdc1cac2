use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::SqliteConnection;

use evisa_core::audit::AuditEntry;

use super::{column, decode_timestamp, encode_timestamp, AuditLogRepository, RepositoryError};
use crate::DbPool;

pub struct SqlAuditLogRepository {
    pool: DbPool,
}

impl SqlAuditLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) async fn insert_entry(
    conn: &mut SqliteConnection,
    entry: &AuditEntry,
) -> Result<(), RepositoryError> {
    let metadata = serde_json::to_string(&entry.metadata)
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;

    sqlx::query(
        "INSERT INTO audit_logs (id, actor_id, actor_name, action, entity_type, entity_id,
                                 metadata, timestamp)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&entry.id)
    .bind(&entry.actor_id)
    .bind(&entry.actor_name)
    .bind(&entry.action)
    .bind(&entry.entity_type)
    .bind(&entry.entity_id)
    .bind(metadata)
    .bind(encode_timestamp(entry.timestamp))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

fn row_to_entry(row: &SqliteRow) -> Result<AuditEntry, RepositoryError> {
    let metadata: String = column(row, "metadata")?;
    let timestamp: String = column(row, "timestamp")?;
    let metadata: Map<String, Value> =
        serde_json::from_str(&metadata).map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(AuditEntry {
        id: column(row, "id")?,
        actor_id: column(row, "actor_id")?,
        actor_name: column(row, "actor_name")?,
        action: column(row, "action")?,
        entity_type: column(row, "entity_type")?,
        entity_id: column(row, "entity_id")?,
        metadata,
        timestamp: decode_timestamp(&timestamp)?,
    })
}

#[async_trait::async_trait]
impl AuditLogRepository for SqlAuditLogRepository {
    async fn insert(&self, entry: &AuditEntry) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        insert_entry(&mut conn, entry).await
    }

    async fn list_for_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<AuditEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM audit_logs WHERE entity_type = ? AND entity_id = ?
             ORDER BY timestamp ASC, rowid ASC",
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_entry).collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use evisa_core::audit::{AuditEntry, ENTITY_APPLICATION};

    use super::SqlAuditLogRepository;
    use crate::repositories::AuditLogRepository;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn entries_are_listed_in_insertion_order_with_metadata() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        let repo = SqlAuditLogRepository::new(pool);

        let first = AuditEntry::new("Applicant", "APPLICATION_DRAFT_CREATED", ENTITY_APPLICATION, "A-1")
            .with_metadata("sequence", 1);
        let second = AuditEntry::new("Admin DGM", "APPLICATION_REJECTED", ENTITY_APPLICATION, "A-1")
            .with_actor_id("user-1")
            .with_metadata("notes", "Dossier incomplet");
        let other = AuditEntry::new("Applicant", "APPLICATION_DRAFT_CREATED", ENTITY_APPLICATION, "A-2");
        for entry in [&first, &second, &other] {
            repo.insert(entry).await.expect("insert");
        }

        let trail = repo.list_for_entity(ENTITY_APPLICATION, "A-1").await.expect("list");
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].action, "APPLICATION_DRAFT_CREATED");
        assert_eq!(trail[0].metadata.get("sequence"), Some(&json!(1)));
        assert_eq!(trail[1].actor_id.as_deref(), Some("user-1"));
    }
}
