use placement_core::model::{ChatUser, UserId};

use super::SqliteRepository;
use super::mapping::{conn, id_to_i64, map_user_row};
use crate::repository::{StorageError, UserRepository};

#[async_trait::async_trait]
impl UserRepository for SqliteRepository {
    async fn upsert_user(&self, user: &ChatUser) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO users (user_id, username, first_name, referral_code, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(user_id) DO UPDATE SET
                username = excluded.username,
                first_name = excluded.first_name,
                referral_code = COALESCE(users.referral_code, excluded.referral_code)
            ",
        )
        .bind(id_to_i64("user_id", user.id.value())?)
        .bind(user.username.as_deref())
        .bind(user.first_name.as_str())
        .bind(user.referral_code.as_ref().map(|c| c.as_str().to_string()))
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<ChatUser>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT user_id, username, first_name, referral_code, created_at
            FROM users WHERE user_id = ?1
            ",
        )
        .bind(id_to_i64("user_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_user_row).transpose()
    }
}
