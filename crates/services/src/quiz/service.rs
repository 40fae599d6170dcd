use std::sync::Arc;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use placement_core::QuestionBank;
use placement_core::model::LevelScale;

use super::session::QuizSession;
use crate::error::QuizError;

/// Number of questions in a placement quiz unless configured otherwise.
pub const DEFAULT_QUIZ_SIZE: usize = 10;

/// Starts placement quizzes over a shared question bank.
#[derive(Clone)]
pub struct QuizService {
    bank: Arc<QuestionBank>,
    scale: Arc<LevelScale>,
    quiz_size: usize,
}

impl QuizService {
    #[must_use]
    pub fn new(bank: Arc<QuestionBank>, scale: Arc<LevelScale>, quiz_size: usize) -> Self {
        Self {
            bank,
            scale,
            quiz_size,
        }
    }

    #[must_use]
    pub fn quiz_size(&self) -> usize {
        self.quiz_size
    }

    #[must_use]
    pub fn scale(&self) -> &LevelScale {
        &self.scale
    }

    /// Samples a new quiz.
    ///
    /// The session gets its own RNG seeded from `rng`, so answer shuffling in
    /// one session never disturbs another.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Empty` if the bank (or the configured size) yields no questions.
    pub fn start<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<QuizSession, QuizError> {
        let questions = self.bank.sample(self.quiz_size, rng);
        if questions.is_empty() {
            return Err(QuizError::Empty);
        }
        tracing::debug!(questions = questions.len(), "quiz started");
        Ok(QuizSession::new(
            questions,
            StdRng::seed_from_u64(rng.random()),
        ))
    }
}
