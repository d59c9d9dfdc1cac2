use chrono::Utc;
use sqlx::sqlite::SqliteRow;

use evisa_core::domain::user::AdminUser;

use super::{column, encode_timestamp, RepositoryError, UserRepository};
use crate::DbPool;

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_user(row: &SqliteRow) -> Result<AdminUser, RepositoryError> {
    Ok(AdminUser {
        id: column(row, "id")?,
        username: column(row, "username")?,
        password_hash: column(row, "password_hash")?,
        role: column(row, "role")?,
        full_name: column(row, "full_name")?,
    })
}

#[async_trait::async_trait]
impl UserRepository for SqlUserRepository {
    async fn find_by_username(&self, username: &str) -> Result<Option<AdminUser>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, username, password_hash, role, full_name FROM admin_users WHERE username = ?",
        )
        .bind(username.trim())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn save(&self, user: &AdminUser) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO admin_users (id, username, password_hash, role, full_name, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 username = excluded.username,
                 password_hash = excluded.password_hash,
                 role = excluded.role,
                 full_name = excluded.full_name",
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.role)
        .bind(&user.full_name)
        .bind(encode_timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
