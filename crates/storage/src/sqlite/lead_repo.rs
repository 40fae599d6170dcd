use placement_core::model::LeadRecord;

use super::SqliteRepository;
use super::mapping::{conn, format_to_str, id_to_i64, map_lead_row};
use crate::repository::{LeadRepository, StorageError};

#[async_trait::async_trait]
impl LeadRepository for SqliteRepository {
    async fn append_lead(&self, lead: &LeadRecord) -> Result<i64, StorageError> {
        let quiz = lead.quiz.as_ref();
        let answers = &lead.answers;

        let res = sqlx::query(
            r"
            INSERT INTO leads (
                submitted_at, user_id, name, username,
                quiz_correct, quiz_total, quiz_percentage, level_name, level_description, passed,
                goal, motivation, study_time, budget, needs_help, start_format, payment, phone,
                referral_code
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
            ",
        )
        .bind(lead.submitted_at)
        .bind(id_to_i64("user_id", lead.user_id.value())?)
        .bind(lead.name.as_str())
        .bind(lead.username.as_deref())
        .bind(quiz.map(|q| i64::from(q.correct)))
        .bind(quiz.map(|q| i64::from(q.total)))
        .bind(quiz.map(|q| q.percentage))
        .bind(quiz.map(|q| q.level_name.clone()))
        .bind(quiz.map(|q| q.level_description.clone()))
        .bind(quiz.map(|q| q.passed))
        .bind(answers.goal.as_deref())
        .bind(answers.motivation.map(i64::from))
        .bind(answers.study_time.as_deref())
        .bind(answers.budget.as_deref())
        .bind(answers.needs_help)
        .bind(answers.format.map(format_to_str))
        .bind(answers.payment.as_deref())
        .bind(answers.phone.as_deref())
        .bind(lead.referral_code.as_ref().map(|c| c.as_str().to_string()))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.last_insert_rowid())
    }

    async fn list_leads(&self, limit: u32) -> Result<Vec<LeadRecord>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT *
            FROM leads
            ORDER BY id DESC
            LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_lead_row).collect()
    }
}
