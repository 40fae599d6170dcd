use rand::rngs::StdRng;

use placement_core::model::{LevelScale, Question, QuizOutcome};

use super::progress::QuizProgress;
use crate::error::QuizError;

/// The question currently on screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuizPrompt<'a> {
    /// 1-based position in the quiz.
    pub number: usize,
    pub total: usize,
    pub question: &'a Question,
    pub options: &'a [String],
}

/// Feedback for one answered question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizAnswer {
    pub correct: bool,
    pub correct_answer: String,
    pub is_complete: bool,
}

/// One user's run through a sampled set of questions.
///
/// Questions are asked in order; each one's options are shuffled when it
/// becomes current.
pub struct QuizSession {
    questions: Vec<Question>,
    current: usize,
    options: Vec<String>,
    correct: usize,
    rng: StdRng,
}

impl QuizSession {
    pub(crate) fn new(questions: Vec<Question>, mut rng: StdRng) -> Self {
        let options = questions
            .first()
            .map(|q| q.shuffled_answers(&mut rng))
            .unwrap_or_default();
        Self {
            questions,
            current: 0,
            options,
            correct: 0,
            rng,
        }
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn current(&self) -> Option<QuizPrompt<'_>> {
        self.questions.get(self.current).map(|question| QuizPrompt {
            number: self.current + 1,
            total: self.questions.len(),
            question,
            options: &self.options,
        })
    }

    /// Whether `text` is one of the options offered for the current question.
    #[must_use]
    pub fn is_option(&self, text: &str) -> bool {
        let text = text.trim();
        self.options.iter().any(|o| o.trim() == text)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.current >= self.questions.len()
    }

    #[must_use]
    pub fn progress(&self) -> QuizProgress {
        let answered = self.current.min(self.questions.len());
        QuizProgress {
            total: self.questions.len(),
            answered,
            correct: self.correct,
            remaining: self.questions.len() - answered,
            is_complete: self.is_complete(),
        }
    }

    /// Grades `text` against the current question and advances.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Completed` once every question has been answered.
    pub fn answer(&mut self, text: &str) -> Result<QuizAnswer, QuizError> {
        let question = self
            .questions
            .get(self.current)
            .ok_or(QuizError::Completed)?;
        let correct = question.check_answer(text);
        let correct_answer = question.correct_answer().to_string();

        if correct {
            self.correct += 1;
        }
        self.current += 1;
        self.options = match self.questions.get(self.current) {
            Some(next) => next.shuffled_answers(&mut self.rng),
            None => Vec::new(),
        };

        Ok(QuizAnswer {
            correct,
            correct_answer,
            is_complete: self.is_complete(),
        })
    }

    /// Final score, available once the quiz is complete.
    #[must_use]
    pub fn outcome(&self, scale: &LevelScale) -> Option<QuizOutcome> {
        if !self.is_complete() {
            return None;
        }
        let total = u32::try_from(self.questions.len()).unwrap_or(u32::MAX);
        let correct = u32::try_from(self.correct).unwrap_or(u32::MAX);
        Some(scale.outcome(correct, total))
    }
}
