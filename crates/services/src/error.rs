//! Shared error types for the services crate.

use std::path::PathBuf;

use thiserror::Error;

use placement_core::BankError;
use placement_core::model::{LevelError, PartnerId, QuestionError, ReferralError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted while loading the question catalog.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("catalog has no questions")]
    Empty,
    #[error("question {index}: {source}")]
    Question {
        index: usize,
        #[source]
        source: QuestionError,
    },
    #[error(transparent)]
    Level(#[from] LevelError),
}

/// Errors emitted by quiz sessions.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizError {
    #[error("no questions available for a quiz")]
    Empty,
    #[error("quiz already completed")]
    Completed,
    #[error(transparent)]
    Bank(#[from] BankError),
}

/// Errors emitted by `LeadService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LeadServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ReferralService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReferralServiceError {
    #[error(transparent)]
    Referral(#[from] ReferralError),
    #[error("partner {0} has no referral links")]
    UnknownPartner(PartnerId),
    #[error("could not generate a free referral code after {attempts} attempts")]
    CodeSpaceExhausted { attempts: u32 },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ChatService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChatError {
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Lead(#[from] LeadServiceError),
    #[error(transparent)]
    Referral(#[from] ReferralServiceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
