#![forbid(unsafe_code)]

pub mod app_services;
pub mod catalog;
pub mod chat;
pub mod error;
pub mod lead_service;
pub mod quiz;
pub mod referral_service;

pub use placement_core::Clock;

pub use app_services::{AppServices, ChatSettings};
pub use catalog::Catalog;
pub use chat::{ChatService, Incoming, Keyboard, Reply, Sender};
pub use error::{
    AppServicesError, CatalogError, ChatError, LeadServiceError, QuizError, ReferralServiceError,
};
pub use lead_service::LeadService;
pub use quiz::{QuizService, QuizSession};
pub use referral_service::{CreatedLink, ReferralService};
