use async_trait::async_trait;
use placement_core::model::{
    ChatUser, Conversion, LeadRecord, PartnerId, ReferralCode, ReferralLink, UserId,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Repository contract for chat users.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert or update a user.
    ///
    /// An existing referral attribution is never replaced.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the user cannot be stored.
    async fn upsert_user(&self, user: &ChatUser) -> Result<(), StorageError>;

    /// Fetch a user by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_user(&self, id: UserId) -> Result<Option<ChatUser>, StorageError>;
}

/// Repository contract for issued referral links.
#[async_trait]
pub trait ReferralRepository: Send + Sync {
    /// Store a new link.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the code is already taken.
    async fn insert_link(&self, link: &ReferralLink) -> Result<(), StorageError>;

    /// Look up a link by its code.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_link(&self, code: &ReferralCode) -> Result<Option<ReferralLink>, StorageError>;

    /// All links ordered by code.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_links(&self) -> Result<Vec<ReferralLink>, StorageError>;

    /// Links owned by one partner, ordered by code.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn links_for_partner(
        &self,
        partner_id: PartnerId,
    ) -> Result<Vec<ReferralLink>, StorageError>;
}

/// Append-only log of referral conversions.
#[async_trait]
pub trait ConversionRepository: Send + Sync {
    /// Append a conversion and return its row id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the conversion cannot be stored.
    async fn append_conversion(&self, conversion: &Conversion) -> Result<i64, StorageError>;

    /// Conversions of one partner in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn conversions_for_partner(
        &self,
        partner_id: PartnerId,
    ) -> Result<Vec<Conversion>, StorageError>;

    /// Number of conversions across all partners.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn count_conversions(&self) -> Result<u64, StorageError>;
}

/// The lead sheet: one row per completed survey.
#[async_trait]
pub trait LeadRepository: Send + Sync {
    /// Append a lead and return its row id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the lead cannot be stored.
    async fn append_lead(&self, lead: &LeadRecord) -> Result<i64, StorageError>;

    /// Most recent leads first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_leads(&self, limit: u32) -> Result<Vec<LeadRecord>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    users: Arc<Mutex<HashMap<UserId, ChatUser>>>,
    links: Arc<Mutex<BTreeMap<ReferralCode, ReferralLink>>>,
    conversions: Arc<Mutex<Vec<Conversion>>>,
    leads: Arc<Mutex<Vec<LeadRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|e| StorageError::Connection(e.to_string()))
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn upsert_user(&self, user: &ChatUser) -> Result<(), StorageError> {
        let mut guard = lock(&self.users)?;
        let mut stored = user.clone();
        if let Some(existing) = guard.get(&user.id) {
            stored.created_at = existing.created_at;
            if existing.referral_code.is_some() {
                stored.referral_code.clone_from(&existing.referral_code);
            }
        }
        guard.insert(user.id, stored);
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<ChatUser>, StorageError> {
        Ok(lock(&self.users)?.get(&id).cloned())
    }
}

#[async_trait]
impl ReferralRepository for InMemoryRepository {
    async fn insert_link(&self, link: &ReferralLink) -> Result<(), StorageError> {
        let mut guard = lock(&self.links)?;
        if guard.contains_key(&link.code) {
            return Err(StorageError::Conflict);
        }
        guard.insert(link.code.clone(), link.clone());
        Ok(())
    }

    async fn get_link(&self, code: &ReferralCode) -> Result<Option<ReferralLink>, StorageError> {
        Ok(lock(&self.links)?.get(code).cloned())
    }

    async fn list_links(&self) -> Result<Vec<ReferralLink>, StorageError> {
        Ok(lock(&self.links)?.values().cloned().collect())
    }

    async fn links_for_partner(
        &self,
        partner_id: PartnerId,
    ) -> Result<Vec<ReferralLink>, StorageError> {
        Ok(lock(&self.links)?
            .values()
            .filter(|l| l.partner_id == partner_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ConversionRepository for InMemoryRepository {
    async fn append_conversion(&self, conversion: &Conversion) -> Result<i64, StorageError> {
        if !lock(&self.links)?.contains_key(&conversion.code) {
            return Err(StorageError::NotFound);
        }
        let mut guard = lock(&self.conversions)?;
        guard.push(conversion.clone());
        i64::try_from(guard.len()).map_err(|_| StorageError::Serialization("id overflow".into()))
    }

    async fn conversions_for_partner(
        &self,
        partner_id: PartnerId,
    ) -> Result<Vec<Conversion>, StorageError> {
        Ok(lock(&self.conversions)?
            .iter()
            .filter(|c| c.partner_id == partner_id)
            .cloned()
            .collect())
    }

    async fn count_conversions(&self) -> Result<u64, StorageError> {
        Ok(lock(&self.conversions)?.len() as u64)
    }
}

#[async_trait]
impl LeadRepository for InMemoryRepository {
    async fn append_lead(&self, lead: &LeadRecord) -> Result<i64, StorageError> {
        let mut guard = lock(&self.leads)?;
        guard.push(lead.clone());
        i64::try_from(guard.len()).map_err(|_| StorageError::Serialization("id overflow".into()))
    }

    async fn list_leads(&self, limit: u32) -> Result<Vec<LeadRecord>, StorageError> {
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(lock(&self.leads)?
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub users: Arc<dyn UserRepository>,
    pub referrals: Arc<dyn ReferralRepository>,
    pub conversions: Arc<dyn ConversionRepository>,
    pub leads: Arc<dyn LeadRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    /// Uses one repository value for every role.
    #[must_use]
    pub fn from_repository<R>(repo: R) -> Self
    where
        R: UserRepository
            + ReferralRepository
            + ConversionRepository
            + LeadRepository
            + Clone
            + 'static,
    {
        Self {
            users: Arc::new(repo.clone()),
            referrals: Arc::new(repo.clone()),
            conversions: Arc::new(repo.clone()),
            leads: Arc::new(repo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use placement_core::model::{ConversionKind, Label};
    use placement_core::survey::SurveyAnswers;
    use placement_core::time::fixed_now;

    fn link(code: &str, partner: u64) -> ReferralLink {
        ReferralLink {
            code: ReferralCode::parse(code).unwrap(),
            partner_id: PartnerId::new(partner),
            platform: Label::new("tiktok").unwrap(),
            theme: Label::new("crypto").unwrap(),
            created_at: fixed_now(),
        }
    }

    #[tokio::test]
    async fn duplicate_code_conflicts() {
        let repo = InMemoryRepository::new();
        let l = link("tiktok_1000_aaaaaa", 1000);
        repo.insert_link(&l).await.unwrap();
        assert!(matches!(
            repo.insert_link(&l).await,
            Err(StorageError::Conflict)
        ));
    }

    #[tokio::test]
    async fn upsert_keeps_first_attribution() {
        let repo = InMemoryRepository::new();
        let mut user = ChatUser::new(UserId::new(1), None, "Anna", fixed_now());
        user.attribute(&ReferralCode::parse("tiktok_1000_aaaaaa").unwrap());
        repo.upsert_user(&user).await.unwrap();

        let mut again = ChatUser::new(UserId::new(1), Some("anna".into()), "Anna", fixed_now());
        again.attribute(&ReferralCode::parse("youtube_2000_bbbbbb").unwrap());
        repo.upsert_user(&again).await.unwrap();

        let stored = repo.get_user(UserId::new(1)).await.unwrap().unwrap();
        assert_eq!(stored.username.as_deref(), Some("anna"));
        assert_eq!(
            stored.referral_code.map(|c| c.to_string()).as_deref(),
            Some("tiktok_1000_aaaaaa")
        );
    }

    #[tokio::test]
    async fn conversions_require_known_code_and_filter_by_partner() {
        let repo = InMemoryRepository::new();
        let a = link("tiktok_1000_aaaaaa", 1000);
        let b = link("tiktok_2000_bbbbbb", 2000);
        repo.insert_link(&a).await.unwrap();

        let orphan = Conversion::for_link(&b, ConversionKind::Click, fixed_now());
        assert!(matches!(
            repo.append_conversion(&orphan).await,
            Err(StorageError::NotFound)
        ));

        repo.insert_link(&b).await.unwrap();
        repo.append_conversion(&Conversion::for_link(&a, ConversionKind::Click, fixed_now()))
            .await
            .unwrap();
        repo.append_conversion(&orphan).await.unwrap();

        assert_eq!(repo.count_conversions().await.unwrap(), 2);
        let mine = repo
            .conversions_for_partner(PartnerId::new(1000))
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(repo.links_for_partner(PartnerId::new(2000)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn leads_are_listed_newest_first() {
        let repo = InMemoryRepository::new();
        for (id, name) in [(1, "first"), (2, "second"), (3, "third")] {
            let lead = LeadRecord {
                submitted_at: fixed_now(),
                user_id: UserId::new(id),
                name: name.into(),
                username: None,
                quiz: None,
                answers: SurveyAnswers::default(),
                referral_code: None,
            };
            repo.append_lead(&lead).await.unwrap();
        }
        let leads = repo.list_leads(2).await.unwrap();
        let names: Vec<_> = leads.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["third", "second"]);
    }
}
