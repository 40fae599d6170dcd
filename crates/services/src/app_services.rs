use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;

use placement_core::model::UserId;
use storage::repository::Storage;

use crate::Clock;
use crate::catalog::Catalog;
use crate::chat::ChatService;
use crate::error::AppServicesError;
use crate::lead_service::LeadService;
use crate::quiz::{DEFAULT_QUIZ_SIZE, QuizService};
use crate::referral_service::ReferralService;

/// Runtime knobs of the conversation engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSettings {
    pub admin_id: Option<UserId>,
    pub bot_username: String,
    pub quiz_size: usize,
    /// Fixed seed for reproducible quizzes; random when `None`.
    pub seed: Option<u64>,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            admin_id: None,
            bot_username: "placement_bot".to_string(),
            quiz_size: DEFAULT_QUIZ_SIZE,
            seed: None,
        }
    }
}

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    catalog: Catalog,
    quiz: QuizService,
    leads: Arc<LeadService>,
    referrals: Arc<ReferralService>,
    chat: Arc<ChatService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        catalog: Catalog,
        settings: ChatSettings,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock, catalog, settings))
    }

    /// Build services over in-memory repositories.
    #[must_use]
    pub fn in_memory(clock: Clock, catalog: Catalog, settings: ChatSettings) -> Self {
        Self::from_storage(&Storage::in_memory(), clock, catalog, settings)
    }

    #[must_use]
    pub fn from_storage(
        storage: &Storage,
        clock: Clock,
        catalog: Catalog,
        settings: ChatSettings,
    ) -> Self {
        let quiz = QuizService::new(catalog.bank(), catalog.scale(), settings.quiz_size);
        let leads = LeadService::new(clock, Arc::clone(&storage.leads));
        let referrals = ReferralService::new(
            clock,
            settings.bot_username,
            Arc::clone(&storage.users),
            Arc::clone(&storage.referrals),
            Arc::clone(&storage.conversions),
        );
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let chat = ChatService::new(
            clock,
            settings.admin_id,
            quiz.clone(),
            leads.clone(),
            referrals.clone(),
            Arc::clone(&storage.users),
            rng,
        );

        Self {
            catalog,
            quiz,
            leads: Arc::new(leads),
            referrals: Arc::new(referrals),
            chat: Arc::new(chat),
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub fn quiz(&self) -> &QuizService {
        &self.quiz
    }

    #[must_use]
    pub fn leads(&self) -> Arc<LeadService> {
        Arc::clone(&self.leads)
    }

    #[must_use]
    pub fn referrals(&self) -> Arc<ReferralService> {
        Arc::clone(&self.referrals)
    }

    #[must_use]
    pub fn chat(&self) -> Arc<ChatService> {
        Arc::clone(&self.chat)
    }
}
