use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Percentage at or above which a quiz counts as passed.
pub const DEFAULT_PASS_PERCENTAGE: f64 = 50.0;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum LevelError {
    #[error("level scale cannot be empty")]
    Empty,

    #[error("level threshold must be within 0..=100, got {provided}")]
    InvalidThreshold { provided: f64 },

    #[error("level name cannot be empty")]
    EmptyName,

    #[error("duplicate level threshold {threshold}")]
    DuplicateThreshold { threshold: f64 },

    #[error("level scale needs a level starting at 0%")]
    MissingFloor,

    #[error("pass percentage must be within 0..=100, got {provided}")]
    InvalidPassPercentage { provided: f64 },
}

/// Named proficiency level reached at `min_percentage` or above.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub min_percentage: f64,
    pub name: String,
    pub description: String,
}

/// Ordered mapping from a percentage score to a [`Level`].
#[derive(Debug, Clone, PartialEq)]
pub struct LevelScale {
    // sorted by threshold, highest first
    levels: Vec<Level>,
    pass_percentage: f64,
}

impl LevelScale {
    /// Builds a scale from levels in any order.
    ///
    /// # Errors
    ///
    /// Returns `LevelError` if the list is empty, a threshold is outside
    /// `0..=100` or repeated, a name is blank, or no level starts at 0%.
    pub fn new(mut levels: Vec<Level>, pass_percentage: f64) -> Result<Self, LevelError> {
        if levels.is_empty() {
            return Err(LevelError::Empty);
        }
        if !(0.0..=100.0).contains(&pass_percentage) {
            return Err(LevelError::InvalidPassPercentage {
                provided: pass_percentage,
            });
        }
        for level in &levels {
            if !(0.0..=100.0).contains(&level.min_percentage) {
                return Err(LevelError::InvalidThreshold {
                    provided: level.min_percentage,
                });
            }
            if level.name.trim().is_empty() {
                return Err(LevelError::EmptyName);
            }
        }

        levels.sort_by(|a, b| b.min_percentage.total_cmp(&a.min_percentage));
        if let Some(pair) = levels
            .windows(2)
            .find(|pair| pair[0].min_percentage == pair[1].min_percentage)
        {
            return Err(LevelError::DuplicateThreshold {
                threshold: pair[0].min_percentage,
            });
        }
        if levels.last().is_none_or(|l| l.min_percentage != 0.0) {
            return Err(LevelError::MissingFloor);
        }

        Ok(Self {
            levels,
            pass_percentage,
        })
    }

    /// The A1..C2 scale used by the course.
    #[must_use]
    pub fn default_english() -> Self {
        let level = |min: f64, name: &str, description: &str| Level {
            min_percentage: min,
            name: name.to_string(),
            description: description.to_string(),
        };
        Self {
            levels: vec![
                level(90.0, "C2 (Вільне володіння) 🎭", "Ви володієте англійською на найвищому рівні!"),
                level(80.0, "C1 (Просунутий) 🎯", "Ви маєте глибоке розуміння мови!"),
                level(70.0, "B2+ (Вище середнього) 🌸", "Ви впевнено володієте мовою!"),
                level(60.0, "B1 (Середній) 🌺", "У вас хороший базовий рівень!"),
                level(50.0, "A2 (Елементарний) 🌿", "Ви знаєте основи мови!"),
                level(0.0, "A1 (Початковий) 🌱", "Ви починаєте вивчати мову!"),
            ],
            pass_percentage: DEFAULT_PASS_PERCENTAGE,
        }
    }

    #[must_use]
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    #[must_use]
    pub fn pass_percentage(&self) -> f64 {
        self.pass_percentage
    }

    /// Highest level whose threshold is at or below `percentage`.
    #[must_use]
    pub fn level_for(&self, percentage: f64) -> &Level {
        self.levels
            .iter()
            .find(|l| l.min_percentage <= percentage)
            .unwrap_or_else(|| self.floor())
    }

    fn floor(&self) -> &Level {
        // `new` guarantees a 0% level at the end.
        &self.levels[self.levels.len() - 1]
    }

    /// Scores a finished quiz.
    #[must_use]
    pub fn outcome(&self, correct: u32, total: u32) -> QuizOutcome {
        let percentage = if total == 0 {
            0.0
        } else {
            f64::from(correct) * 100.0 / f64::from(total)
        };
        let level = self.level_for(percentage);
        QuizOutcome {
            correct,
            total,
            percentage,
            level_name: level.name.clone(),
            level_description: level.description.clone(),
            passed: percentage >= self.pass_percentage,
        }
    }
}

/// Result of a completed placement quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizOutcome {
    pub correct: u32,
    pub total: u32,
    pub percentage: f64,
    pub level_name: String,
    pub level_description: String,
    pub passed: bool,
}
