use rand::Rng;
use rand::seq::SliceRandom;
use std::fmt;
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyText,

    #[error("correct answer cannot be empty")]
    EmptyCorrectAnswer,

    #[error("at least one wrong answer is required")]
    NoWrongAnswers,

    #[error("wrong answer #{index} is empty")]
    EmptyWrongAnswer { index: usize },

    #[error("wrong answer #{index} duplicates the correct answer")]
    WrongAnswerIsCorrect { index: usize },

    #[error("difficulty must be between {min} and {max}, got {provided}", min = Difficulty::MIN, max = Difficulty::MAX)]
    InvalidDifficulty { provided: i64 },
}

//
// ─── DIFFICULTY ────────────────────────────────────────────────────────────────
//

/// Difficulty tag of a question, `1` (easiest) to `5` (hardest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Difficulty(u8);

impl Difficulty {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// # Errors
    ///
    /// Returns `QuestionError::InvalidDifficulty` outside `MIN..=MAX`.
    pub fn new(value: i64) -> Result<Self, QuestionError> {
        u8::try_from(value)
            .ok()
            .filter(|v| (Self::MIN..=Self::MAX).contains(v))
            .map(Self)
            .ok_or(QuestionError::InvalidDifficulty { provided: value })
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// Immutable multiple-choice quiz item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Question {
    text: String,
    correct_answer: String,
    wrong_answers: Vec<String>,
    difficulty: Difficulty,
}

impl Question {
    /// Creates a validated question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` when text or answers are blank, when there are no
    /// wrong answers, or when a wrong answer equals the correct one (compared
    /// after trimming, the same way answers are graded).
    pub fn new(
        text: impl Into<String>,
        correct_answer: impl Into<String>,
        wrong_answers: Vec<String>,
        difficulty: Difficulty,
    ) -> Result<Self, QuestionError> {
        let text = text.into();
        let correct_answer = correct_answer.into();

        if text.trim().is_empty() {
            return Err(QuestionError::EmptyText);
        }
        if correct_answer.trim().is_empty() {
            return Err(QuestionError::EmptyCorrectAnswer);
        }
        if wrong_answers.is_empty() {
            return Err(QuestionError::NoWrongAnswers);
        }
        for (index, wrong) in wrong_answers.iter().enumerate() {
            if wrong.trim().is_empty() {
                return Err(QuestionError::EmptyWrongAnswer { index });
            }
            if wrong.trim() == correct_answer.trim() {
                return Err(QuestionError::WrongAnswerIsCorrect { index });
            }
        }

        Ok(Self {
            text,
            correct_answer,
            wrong_answers,
            difficulty,
        })
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn correct_answer(&self) -> &str {
        &self.correct_answer
    }

    #[must_use]
    pub fn wrong_answers(&self) -> &[String] {
        &self.wrong_answers
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Number of answer options shown to the user.
    #[must_use]
    pub fn option_count(&self) -> usize {
        1 + self.wrong_answers.len()
    }

    /// All answer options (correct + wrong) in uniformly random order.
    #[must_use]
    pub fn shuffled_answers<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<String> {
        let mut answers = Vec::with_capacity(self.option_count());
        answers.push(self.correct_answer.clone());
        answers.extend(self.wrong_answers.iter().cloned());
        answers.shuffle(rng);
        answers
    }

    /// Grades a submitted answer.
    ///
    /// Only surrounding whitespace is ignored; the comparison is case-sensitive.
    #[must_use]
    pub fn check_answer(&self, submitted: &str) -> bool {
        submitted.trim() == self.correct_answer.trim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn question() -> Question {
        Question::new(
            "Translate 'книга' into English:",
            "book",
            vec!["magazine".into(), "newspaper".into(), "letter".into()],
            Difficulty::new(1).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn check_answer_trims_but_keeps_case() {
        let q = question();
        assert!(q.check_answer("book"));
        assert!(q.check_answer("  book\n"));
        assert!(!q.check_answer("Book"));
        assert!(!q.check_answer("magazine"));
        assert!(!q.check_answer(""));
    }

    #[test]
    fn shuffled_answers_contain_every_option_once() {
        let q = question();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let mut answers = q.shuffled_answers(&mut rng);
            assert_eq!(answers.len(), 4);
            answers.sort();
            assert_eq!(answers, vec!["book", "letter", "magazine", "newspaper"]);
        }
        assert_eq!(q.wrong_answers(), ["magazine", "newspaper", "letter"]);
    }

    #[test]
    fn shuffled_answers_vary_order() {
        let q = question();
        let mut rng = StdRng::seed_from_u64(11);
        let first = q.shuffled_answers(&mut rng);
        let differs = (0..50).any(|_| q.shuffled_answers(&mut rng) != first);
        assert!(differs);
    }

    #[test]
    fn rejects_wrong_answer_equal_to_correct() {
        let err = Question::new(
            "Q",
            "since",
            vec!["for".into(), " since ".into()],
            Difficulty::new(3).unwrap(),
        )
        .unwrap_err();
        assert_eq!(err, QuestionError::WrongAnswerIsCorrect { index: 1 });
    }

    #[test]
    fn rejects_missing_wrong_answers() {
        let err = Question::new("Q", "A", Vec::new(), Difficulty::new(2).unwrap()).unwrap_err();
        assert_eq!(err, QuestionError::NoWrongAnswers);
    }

    #[test]
    fn difficulty_bounds() {
        assert!(Difficulty::new(1).is_ok());
        assert!(Difficulty::new(5).is_ok());
        assert_eq!(
            Difficulty::new(0),
            Err(QuestionError::InvalidDifficulty { provided: 0 })
        );
        assert!(Difficulty::new(6).is_err());
        assert!(Difficulty::new(-1).is_err());
    }
}
