//! Question catalog loading.
//!
//! The catalog is a TOML document with a pass percentage, a level scale and
//! the list of questions. One copy is embedded at build time; operators may
//! ship their own file instead.

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use placement_core::QuestionBank;
use placement_core::model::{DEFAULT_PASS_PERCENTAGE, Difficulty, Level, LevelScale, Question};

use crate::error::CatalogError;

const EMBEDDED_CATALOG: &str = include_str!("../data/catalog.toml");

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    pass_percentage: Option<f64>,
    #[serde(default)]
    levels: Vec<Level>,
    #[serde(default)]
    questions: Vec<QuestionEntry>,
}

#[derive(Debug, Deserialize)]
struct QuestionEntry {
    text: String,
    correct_answer: String,
    wrong_answers: Vec<String>,
    difficulty: i64,
}

/// Validated question bank plus the level scale used to grade it.
#[derive(Debug, Clone)]
pub struct Catalog {
    bank: Arc<QuestionBank>,
    scale: Arc<LevelScale>,
}

impl Catalog {
    /// The catalog compiled into the binary.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the embedded document is invalid.
    pub fn embedded() -> Result<Self, CatalogError> {
        Self::from_toml_str(EMBEDDED_CATALOG)
    }

    /// Reads and validates a catalog file.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Io` when the file cannot be read, or any parse and
    /// validation error from [`Catalog::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_toml_str(&raw)?;
        tracing::info!(
            path = %path.display(),
            questions = catalog.bank.len(),
            "loaded catalog"
        );
        Ok(catalog)
    }

    /// Parses a catalog document.
    ///
    /// A missing `levels` table falls back to the default A1..C2 scale.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Parse` for malformed TOML, `CatalogError::Question`
    /// with the zero-based index of the first invalid question,
    /// `CatalogError::Level` for an invalid scale, or `CatalogError::Empty`.
    pub fn from_toml_str(raw: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(raw)?;

        let questions = file
            .questions
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                let difficulty = Difficulty::new(entry.difficulty)
                    .map_err(|source| CatalogError::Question { index, source })?;
                Question::new(
                    entry.text,
                    entry.correct_answer,
                    entry.wrong_answers,
                    difficulty,
                )
                .map_err(|source| CatalogError::Question { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if questions.is_empty() {
            return Err(CatalogError::Empty);
        }

        let pass_percentage = file.pass_percentage.unwrap_or(DEFAULT_PASS_PERCENTAGE);
        let scale = if file.levels.is_empty() {
            let default = LevelScale::default_english();
            LevelScale::new(default.levels().to_vec(), pass_percentage)?
        } else {
            LevelScale::new(file.levels, pass_percentage)?
        };

        Ok(Self {
            bank: Arc::new(QuestionBank::new(questions)),
            scale: Arc::new(scale),
        })
    }

    #[must_use]
    pub fn bank(&self) -> Arc<QuestionBank> {
        Arc::clone(&self.bank)
    }

    #[must_use]
    pub fn scale(&self) -> Arc<LevelScale> {
        Arc::clone(&self.scale)
    }
}
