//! Branching lead-qualification survey.
//!
//! The survey is a small state machine: each step accepts either one of a fixed
//! set of options or (for the phone step) a free-form number, stores the answer,
//! and decides which step comes next.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const GOAL_OPTIONS: [&str; 6] = [
    "Для роботи",
    "Для подорожей",
    "Для переїзду",
    "Для навчання",
    "Для розвитку особистих навичок",
    "Інше",
];

pub const MOTIVATION_OPTIONS: [&str; 5] = ["1", "2", "3", "4", "5"];

pub const STUDY_TIME_OPTIONS: [&str; 3] = ["1-2 години", "3-4 години", "5-7 годин"];

pub const BUDGET_OPTIONS: [&str; 4] = [
    "100-300 грн",
    "300-500 грн",
    "500-700 грн",
    BUDGET_UNSURE,
];
const BUDGET_UNSURE: &str = "Я поки не знаю, хочу розібратися";

pub const NEEDS_HELP_OPTIONS: [&str; 2] = [
    "Так, мені потрібна допомога",
    "Ні, я впевнений у своїх знаннях",
];

pub const START_CHOICE_OPTIONS: [&str; 2] = [
    "Так, я готовий розпочати навчання негайно",
    "Ні, хочу спочатку пройти пробне заняття",
];

pub const PAYMENT_OPTIONS: [&str; 3] = [
    "Оплата одразу за курс",
    "Оплата частинами",
    "Оплата за кожне заняття",
];

const PHONE_MIN_DIGITS: usize = 9;
const PHONE_MAX_DIGITS: usize = 15;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SurveyError {
    #[error("{input:?} is not an option for {step:?}")]
    InvalidOption { step: SurveyStep, input: String },

    #[error("{input:?} is not a valid phone number")]
    InvalidPhone { input: String },

    #[error("survey already completed")]
    Completed,
}

//
// ─── STEPS ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurveyStep {
    Goal,
    Motivation,
    StudyTime,
    Budget,
    NeedsHelp,
    StartChoice,
    Payment,
    Phone,
}

impl SurveyStep {
    #[must_use]
    pub fn prompt(self) -> &'static str {
        match self {
            SurveyStep::Goal => "🎯 Для чого вам англійська?",
            SurveyStep::Motivation => "Оцініть свою мотивацію від 1 до 5:",
            SurveyStep::StudyTime => "⏳ Скільки часу на тиждень ви готові приділяти навчанню?",
            SurveyStep::Budget => "💰 Який бюджет на одне заняття вам комфортний?",
            SurveyStep::NeedsHelp => "Чи потрібна вам допомога з вибором програми?",
            SurveyStep::StartChoice => "📅 Чи готові ви розпочати навчання одразу?",
            SurveyStep::Payment => "Який спосіб оплати вам зручніший?",
            SurveyStep::Phone => "📞 Залиште, будь ласка, номер телефону, і менеджер зв'яжеться з вами.",
        }
    }

    /// Allowed answers; empty for free-form steps.
    #[must_use]
    pub fn options(self) -> &'static [&'static str] {
        match self {
            SurveyStep::Goal => &GOAL_OPTIONS,
            SurveyStep::Motivation => &MOTIVATION_OPTIONS,
            SurveyStep::StudyTime => &STUDY_TIME_OPTIONS,
            SurveyStep::Budget => &BUDGET_OPTIONS,
            SurveyStep::NeedsHelp => &NEEDS_HELP_OPTIONS,
            SurveyStep::StartChoice => &START_CHOICE_OPTIONS,
            SurveyStep::Payment => &PAYMENT_OPTIONS,
            SurveyStep::Phone => &[],
        }
    }
}

/// How the lead wants to begin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartFormat {
    Immediate,
    TrialFirst,
}

impl StartFormat {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            StartFormat::Immediate => "Хочу почати відразу",
            StartFormat::TrialFirst => "Спочатку пробне заняття",
        }
    }

    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        [Self::Immediate, Self::TrialFirst]
            .into_iter()
            .find(|f| f.label() == label)
    }
}

/// Everything collected by the survey. Branches leave some fields unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyAnswers {
    pub goal: Option<String>,
    pub motivation: Option<u8>,
    pub study_time: Option<String>,
    pub budget: Option<String>,
    pub needs_help: Option<bool>,
    pub format: Option<StartFormat>,
    pub payment: Option<String>,
    pub phone: Option<String>,
}

/// Outcome of answering one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurveyProgress {
    Next(SurveyStep),
    Complete,
}

//
// ─── SURVEY ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Survey {
    current: Option<SurveyStep>,
    answers: SurveyAnswers,
}

impl Default for Survey {
    fn default() -> Self {
        Self::new()
    }
}

impl Survey {
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: Some(SurveyStep::Goal),
            answers: SurveyAnswers::default(),
        }
    }

    /// Survey with the start format already decided (e.g. trial lesson booking).
    /// The start-choice step is skipped.
    #[must_use]
    pub fn with_format(format: StartFormat) -> Self {
        let mut survey = Self::new();
        survey.answers.format = Some(format);
        survey
    }

    /// Step awaiting an answer, `None` once complete.
    #[must_use]
    pub fn current(&self) -> Option<SurveyStep> {
        self.current
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.current.is_none()
    }

    #[must_use]
    pub fn answers(&self) -> &SurveyAnswers {
        &self.answers
    }

    #[must_use]
    pub fn into_answers(self) -> SurveyAnswers {
        self.answers
    }

    /// Records an answer for the current step and moves on.
    ///
    /// # Errors
    ///
    /// Returns `SurveyError::InvalidOption`/`InvalidPhone` when the input is not
    /// acceptable (the step does not change), or `SurveyError::Completed`.
    pub fn answer(&mut self, input: &str) -> Result<SurveyProgress, SurveyError> {
        let step = self.current.ok_or(SurveyError::Completed)?;
        let input = input.trim();

        let next = if step == SurveyStep::Phone {
            let phone = normalize_phone(input).ok_or_else(|| SurveyError::InvalidPhone {
                input: input.to_string(),
            })?;
            self.answers.phone = Some(phone);
            None
        } else {
            let index = step
                .options()
                .iter()
                .position(|o| *o == input)
                .ok_or_else(|| SurveyError::InvalidOption {
                    step,
                    input: input.to_string(),
                })?;
            self.record_choice(step, index)
        };

        self.current = next;
        Ok(next.map_or(SurveyProgress::Complete, SurveyProgress::Next))
    }

    fn record_choice(&mut self, step: SurveyStep, index: usize) -> Option<SurveyStep> {
        let option = step.options()[index].to_string();
        match step {
            SurveyStep::Goal => {
                self.answers.goal = Some(option);
                Some(SurveyStep::Motivation)
            }
            SurveyStep::Motivation => {
                self.answers.motivation = u8::try_from(index + 1).ok();
                Some(SurveyStep::StudyTime)
            }
            SurveyStep::StudyTime => {
                self.answers.study_time = Some(option);
                Some(SurveyStep::Budget)
            }
            SurveyStep::Budget => {
                let unsure = option == BUDGET_UNSURE;
                self.answers.budget = Some(option);
                if unsure {
                    Some(SurveyStep::NeedsHelp)
                } else {
                    Some(self.after_budget())
                }
            }
            SurveyStep::NeedsHelp => {
                let needs_help = index == 0;
                self.answers.needs_help = Some(needs_help);
                if needs_help {
                    Some(SurveyStep::Phone)
                } else {
                    Some(self.after_budget())
                }
            }
            SurveyStep::StartChoice => {
                let format = if index == 0 {
                    StartFormat::Immediate
                } else {
                    StartFormat::TrialFirst
                };
                self.answers.format = Some(format);
                Some(Self::after_format(format))
            }
            SurveyStep::Payment => {
                self.answers.payment = Some(option);
                Some(SurveyStep::Phone)
            }
            SurveyStep::Phone => None,
        }
    }

    fn after_budget(&self) -> SurveyStep {
        match self.answers.format {
            Some(format) => Self::after_format(format),
            None => SurveyStep::StartChoice,
        }
    }

    fn after_format(format: StartFormat) -> SurveyStep {
        match format {
            StartFormat::Immediate => SurveyStep::Payment,
            StartFormat::TrialFirst => SurveyStep::Phone,
        }
    }
}

/// Normalises a phone number to `+digits` or `digits`.
///
/// Accepts spaces, dashes, dots and parentheses as separators and a single
/// leading `+`. Returns `None` unless 9 to 15 digits remain.
#[must_use]
pub fn normalize_phone(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let (plus, rest) = match raw.strip_prefix('+') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };

    let mut digits = String::with_capacity(rest.len());
    for c in rest.chars() {
        match c {
            '0'..='9' => digits.push(c),
            ' ' | '-' | '.' | '(' | ')' => {}
            _ => return None,
        }
    }

    if !(PHONE_MIN_DIGITS..=PHONE_MAX_DIGITS).contains(&digits.len()) {
        return None;
    }
    Some(if plus { format!("+{digits}") } else { digits })
}
