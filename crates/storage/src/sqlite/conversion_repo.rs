use placement_core::model::{Conversion, PartnerId};

use super::SqliteRepository;
use super::mapping::{conn, id_to_i64, map_conversion_row};
use crate::repository::{ConversionRepository, StorageError};

#[async_trait::async_trait]
impl ConversionRepository for SqliteRepository {
    async fn append_conversion(&self, conversion: &Conversion) -> Result<i64, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO conversions (partner_id, code, platform, event_type, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(id_to_i64("partner_id", conversion.partner_id.value())?)
        .bind(conversion.code.as_str())
        .bind(conversion.platform.as_str())
        .bind(conversion.kind.as_str())
        .bind(conversion.created_at)
        .execute(&self.pool)
        .await;

        match res {
            Ok(done) => Ok(done.last_insert_rowid()),
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                Err(StorageError::NotFound)
            }
            Err(e) => Err(conn(e)),
        }
    }

    async fn conversions_for_partner(
        &self,
        partner_id: PartnerId,
    ) -> Result<Vec<Conversion>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT partner_id, code, platform, event_type, created_at
            FROM conversions
            WHERE partner_id = ?1
            ORDER BY id ASC
            ",
        )
        .bind(id_to_i64("partner_id", partner_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_conversion_row).collect()
    }

    async fn count_conversions(&self) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM conversions")
            .fetch_one(&self.pool)
            .await
            .map_err(conn)?;
        u64::try_from(count)
            .map_err(|_| StorageError::Serialization(format!("invalid count: {count}")))
    }
}
