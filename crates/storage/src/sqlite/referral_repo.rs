use placement_core::model::{PartnerId, ReferralCode, ReferralLink};

use super::SqliteRepository;
use super::mapping::{conn, id_to_i64, map_link_row};
use crate::repository::{ReferralRepository, StorageError};

#[async_trait::async_trait]
impl ReferralRepository for SqliteRepository {
    async fn insert_link(&self, link: &ReferralLink) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO referral_codes (code, partner_id, platform, theme, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(link.code.as_str())
        .bind(id_to_i64("partner_id", link.partner_id.value())?)
        .bind(link.platform.as_str())
        .bind(link.theme.as_str())
        .bind(link.created_at)
        .execute(&self.pool)
        .await;

        match res {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StorageError::Conflict)
            }
            Err(e) => Err(conn(e)),
        }
    }

    async fn get_link(&self, code: &ReferralCode) -> Result<Option<ReferralLink>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT code, partner_id, platform, theme, created_at
            FROM referral_codes WHERE code = ?1
            ",
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_link_row).transpose()
    }

    async fn list_links(&self) -> Result<Vec<ReferralLink>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT code, partner_id, platform, theme, created_at
            FROM referral_codes
            ORDER BY code ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_link_row).collect()
    }

    async fn links_for_partner(
        &self,
        partner_id: PartnerId,
    ) -> Result<Vec<ReferralLink>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT code, partner_id, platform, theme, created_at
            FROM referral_codes
            WHERE partner_id = ?1
            ORDER BY code ASC
            ",
        )
        .bind(id_to_i64("partner_id", partner_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_link_row).collect()
    }
}
