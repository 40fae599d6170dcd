use std::sync::Arc;

use rand::Rng;
use url::Url;

use placement_core::Clock;
use placement_core::model::{
    ChatUser, Conversion, ConversionKind, Label, PartnerId, ReferralCode, ReferralLink, UserId,
};
use placement_core::stats::{PartnerStats, TotalStats};
use storage::repository::{
    ConversionRepository, ReferralRepository, StorageError, UserRepository,
};

use crate::error::ReferralServiceError;

const MAX_CODE_ATTEMPTS: u32 = 8;

/// A freshly issued referral link with its public URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedLink {
    pub link: ReferralLink,
    pub url: Url,
}

/// Issues referral links, attributes users and tracks funnel conversions.
#[derive(Clone)]
pub struct ReferralService {
    clock: Clock,
    bot_username: String,
    users: Arc<dyn UserRepository>,
    referrals: Arc<dyn ReferralRepository>,
    conversions: Arc<dyn ConversionRepository>,
}

impl ReferralService {
    #[must_use]
    pub fn new(
        clock: Clock,
        bot_username: impl Into<String>,
        users: Arc<dyn UserRepository>,
        referrals: Arc<dyn ReferralRepository>,
        conversions: Arc<dyn ConversionRepository>,
    ) -> Self {
        Self {
            clock,
            bot_username: bot_username.into(),
            users,
            referrals,
            conversions,
        }
    }

    #[must_use]
    pub fn bot_username(&self) -> &str {
        &self.bot_username
    }

    /// Creates and stores a new referral link.
    ///
    /// A partner id is drawn from `PartnerId::RANDOM_RANGE` when none is given.
    ///
    /// # Errors
    ///
    /// Returns `ReferralServiceError::Referral` for invalid labels or bot username,
    /// `ReferralServiceError::CodeSpaceExhausted` if every generated code collided,
    /// or `ReferralServiceError::Storage`.
    pub async fn create_link<R: Rng + Send + ?Sized>(
        &self,
        platform: &str,
        theme: &str,
        partner_id: Option<PartnerId>,
        rng: &mut R,
    ) -> Result<CreatedLink, ReferralServiceError> {
        let platform = Label::new(platform)?;
        let theme = Label::new(theme)?;
        let partner_id = partner_id
            .unwrap_or_else(|| PartnerId::new(rng.random_range(PartnerId::RANDOM_RANGE)));

        for _ in 0..MAX_CODE_ATTEMPTS {
            let link = ReferralLink {
                code: ReferralCode::generate(&platform, partner_id, rng),
                partner_id,
                platform: platform.clone(),
                theme: theme.clone(),
                created_at: self.clock.now(),
            };
            let url = link.url(&self.bot_username)?;

            match self.referrals.insert_link(&link).await {
                Ok(()) => {
                    tracing::info!(
                        code = %link.code,
                        partner_id = %partner_id,
                        platform = %link.platform,
                        theme = %link.theme,
                        "referral link created"
                    );
                    return Ok(CreatedLink { link, url });
                }
                Err(StorageError::Conflict) => {
                    tracing::debug!(code = %link.code, "referral code collision, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ReferralServiceError::CodeSpaceExhausted {
            attempts: MAX_CODE_ATTEMPTS,
        })
    }

    /// Handles the payload of `/start <code>`.
    ///
    /// Unknown or malformed codes are logged and ignored. A known code records a
    /// click and attributes `user` if they have no attribution yet; the caller
    /// persists the user.
    ///
    /// # Errors
    ///
    /// Returns `ReferralServiceError::Storage` on repository failures.
    pub async fn register_start(
        &self,
        user: &mut ChatUser,
        raw_code: &str,
    ) -> Result<Option<ReferralLink>, ReferralServiceError> {
        let Ok(code) = ReferralCode::parse(raw_code) else {
            tracing::warn!(user_id = %user.id, raw_code, "malformed referral code ignored");
            return Ok(None);
        };
        let Some(link) = self.referrals.get_link(&code).await? else {
            tracing::warn!(user_id = %user.id, code = %code, "unknown referral code ignored");
            return Ok(None);
        };

        self.conversions
            .append_conversion(&Conversion::for_link(
                &link,
                ConversionKind::Click,
                self.clock.now(),
            ))
            .await?;
        if user.attribute(&code) {
            tracing::info!(user_id = %user.id, code = %code, "user attributed to referral");
        }
        Ok(Some(link))
    }

    /// Records a funnel stage for an attributed user.
    ///
    /// Returns `false` (and records nothing) when the user has no attribution.
    ///
    /// # Errors
    ///
    /// Returns `ReferralServiceError::Storage` on repository failures.
    pub async fn track(
        &self,
        user_id: UserId,
        kind: ConversionKind,
    ) -> Result<bool, ReferralServiceError> {
        let Some(code) = self
            .users
            .get_user(user_id)
            .await?
            .and_then(|u| u.referral_code)
        else {
            return Ok(false);
        };
        let Some(link) = self.referrals.get_link(&code).await? else {
            tracing::warn!(user_id = %user_id, code = %code, "attributed code no longer exists");
            return Ok(false);
        };

        self.conversions
            .append_conversion(&Conversion::for_link(&link, kind, self.clock.now()))
            .await?;
        tracing::debug!(user_id = %user_id, kind = kind.as_str(), "conversion tracked");
        Ok(true)
    }

    /// Funnel statistics for one partner.
    ///
    /// # Errors
    ///
    /// Returns `ReferralServiceError::UnknownPartner` if the partner owns no links.
    pub async fn partner_stats(
        &self,
        partner_id: PartnerId,
    ) -> Result<PartnerStats, ReferralServiceError> {
        let links = self.referrals.links_for_partner(partner_id).await?;
        if links.is_empty() {
            return Err(ReferralServiceError::UnknownPartner(partner_id));
        }
        let conversions = self.conversions.conversions_for_partner(partner_id).await?;
        Ok(PartnerStats::aggregate(partner_id, &links, &conversions))
    }

    /// Totals across every partner.
    ///
    /// # Errors
    ///
    /// Returns `ReferralServiceError::Storage` on repository failures.
    pub async fn total_stats(&self) -> Result<TotalStats, ReferralServiceError> {
        let links = self.referrals.list_links().await?;
        let conversions = self.conversions.count_conversions().await?;
        Ok(TotalStats::aggregate(&links, conversions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use placement_core::time::{fixed_clock, fixed_now};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use storage::repository::InMemoryRepository;

    fn service(repo: &InMemoryRepository) -> ReferralService {
        ReferralService::new(
            fixed_clock(),
            "@placement_bot",
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        )
    }

    #[tokio::test]
    async fn create_link_normalizes_labels_and_builds_url() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let mut rng = StdRng::seed_from_u64(11);

        let created = svc
            .create_link(" TikTok ", "crypto", Some(PartnerId::new(4521)), &mut rng)
            .await
            .unwrap();

        let code = created.link.code.as_str();
        assert!(code.starts_with("tiktok_4521_"), "{code}");
        assert_eq!(code.len(), "tiktok_4521_".len() + 6);
        assert_eq!(
            created.url.as_str(),
            format!("https://t.me/placement_bot?start={code}")
        );
        assert_eq!(repo.get_link(&created.link.code).await.unwrap(), Some(created.link));
    }

    #[tokio::test]
    async fn create_link_picks_partner_in_range() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let mut rng = StdRng::seed_from_u64(2);
        let created = svc.create_link("yt", "ielts", None, &mut rng).await.unwrap();
        assert!(PartnerId::RANDOM_RANGE.contains(&created.link.partner_id.value()));
    }

    #[tokio::test]
    async fn invalid_label_is_rejected() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let mut rng = StdRng::seed_from_u64(2);
        let err = svc
            .create_link("tik tok", "crypto", None, &mut rng)
            .await
            .unwrap_err();
        assert!(matches!(err, ReferralServiceError::Referral(_)));
    }

    #[tokio::test]
    async fn unknown_codes_are_ignored_and_known_codes_attribute() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let mut rng = StdRng::seed_from_u64(4);
        let created = svc
            .create_link("tiktok", "crypto", Some(PartnerId::new(1000)), &mut rng)
            .await
            .unwrap();

        let mut user = ChatUser::new(UserId::new(1), None, "Anna", fixed_now());
        assert_eq!(svc.register_start(&mut user, "nope_0000_zzzzzz").await.unwrap(), None);
        assert_eq!(svc.register_start(&mut user, "bad code!").await.unwrap(), None);
        assert!(user.referral_code.is_none());

        let link = svc
            .register_start(&mut user, created.link.code.as_str())
            .await
            .unwrap();
        assert_eq!(link, Some(created.link.clone()));
        assert_eq!(user.referral_code, Some(created.link.code));
        assert_eq!(repo.count_conversions().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn track_requires_attribution_and_stats_aggregate() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let mut rng = StdRng::seed_from_u64(8);
        let created = svc
            .create_link("tiktok", "crypto", Some(PartnerId::new(1000)), &mut rng)
            .await
            .unwrap();

        let stranger = ChatUser::new(UserId::new(2), None, "Bo", fixed_now());
        repo.upsert_user(&stranger).await.unwrap();
        assert!(!svc.track(stranger.id, ConversionKind::Start).await.unwrap());

        let mut user = ChatUser::new(UserId::new(1), None, "Anna", fixed_now());
        svc.register_start(&mut user, created.link.code.as_str())
            .await
            .unwrap();
        repo.upsert_user(&user).await.unwrap();
        assert!(svc.track(user.id, ConversionKind::Start).await.unwrap());
        assert!(svc.track(user.id, ConversionKind::Complete).await.unwrap());

        let stats = svc.partner_stats(PartnerId::new(1000)).await.unwrap();
        assert_eq!(
            (stats.total_clicks, stats.total_starts, stats.total_completes),
            (1, 1, 1)
        );

        let totals = svc.total_stats().await.unwrap();
        assert_eq!(totals.total_links, 1);
        assert_eq!(totals.total_partners, 1);
        assert_eq!(totals.total_conversions, 3);

        assert!(matches!(
            svc.partner_stats(PartnerId::new(9)).await,
            Err(ReferralServiceError::UnknownPartner(_))
        ));
    }
}
