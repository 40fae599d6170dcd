use std::sync::Arc;

use placement_core::Clock;
use placement_core::model::{ChatUser, LeadRecord, QuizOutcome};
use placement_core::survey::SurveyAnswers;
use storage::repository::LeadRepository;

use crate::error::LeadServiceError;

/// Appends completed surveys to the lead sheet.
#[derive(Clone)]
pub struct LeadService {
    clock: Clock,
    leads: Arc<dyn LeadRepository>,
}

impl LeadService {
    #[must_use]
    pub fn new(clock: Clock, leads: Arc<dyn LeadRepository>) -> Self {
        Self { clock, leads }
    }

    /// Builds a lead row for `user` and stores it.
    ///
    /// # Errors
    ///
    /// Returns `LeadServiceError::Storage` if the row cannot be appended.
    pub async fn record(
        &self,
        user: &ChatUser,
        quiz: Option<QuizOutcome>,
        answers: SurveyAnswers,
    ) -> Result<LeadRecord, LeadServiceError> {
        let lead = LeadRecord {
            submitted_at: self.clock.now(),
            user_id: user.id,
            name: user.first_name.clone(),
            username: user.username.clone(),
            quiz,
            answers,
            referral_code: user.referral_code.clone(),
        };
        let row_id = self.leads.append_lead(&lead).await?;
        tracing::info!(user_id = %user.id, row_id, "lead recorded");
        Ok(lead)
    }

    /// Most recent leads first.
    ///
    /// # Errors
    ///
    /// Returns `LeadServiceError::Storage` on repository failures.
    pub async fn recent(&self, limit: u32) -> Result<Vec<LeadRecord>, LeadServiceError> {
        Ok(self.leads.list_leads(limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use placement_core::model::{LevelScale, ReferralCode, UserId};
    use placement_core::time::{fixed_clock, fixed_now};
    use storage::repository::InMemoryRepository;

    #[tokio::test]
    async fn record_stamps_and_copies_user_fields() {
        let repo = InMemoryRepository::new();
        let service = LeadService::new(fixed_clock(), Arc::new(repo.clone()));

        let mut user = ChatUser::new(UserId::new(3), Some("anna".into()), "Anna", fixed_now());
        user.attribute(&ReferralCode::parse("tiktok_1000_aaaaaa").unwrap());

        let outcome = LevelScale::default_english().outcome(9, 10);
        let lead = service
            .record(&user, Some(outcome.clone()), SurveyAnswers::default())
            .await
            .unwrap();

        assert_eq!(lead.submitted_at, fixed_now());
        assert_eq!(lead.quiz, Some(outcome));
        assert_eq!(lead.referral_code, user.referral_code);

        let stored = service.recent(5).await.unwrap();
        assert_eq!(stored, vec![lead]);
    }
}
