use chrono::{DateTime, Utc};

use crate::model::ids::UserId;
use crate::model::level::QuizOutcome;
use crate::model::referral::ReferralCode;
use crate::survey::SurveyAnswers;

/// Placeholder written into the lead sheet for missing values.
pub const NOT_SPECIFIED: &str = "Не вказано";

/// Column titles of the lead sheet, in row order.
pub const SHEET_HEADERS: [&str; 15] = [
    "Дата та час",
    "Ім'я",
    "Telegram",
    "Результат тесту",
    "Відсоток",
    "Рівень",
    "Мета",
    "Мотивація",
    "Час на навчання",
    "Бюджет",
    "Потрібна допомога",
    "Формат",
    "Спосіб оплати",
    "Телефон",
    "Реферальний код",
];

/// A completed lead: who, how they scored, and what they told the survey.
#[derive(Debug, Clone, PartialEq)]
pub struct LeadRecord {
    pub submitted_at: DateTime<Utc>,
    pub user_id: UserId,
    pub name: String,
    pub username: Option<String>,
    pub quiz: Option<QuizOutcome>,
    pub answers: SurveyAnswers,
    pub referral_code: Option<ReferralCode>,
}

impl LeadRecord {
    /// Renders the record as one sheet row matching [`SHEET_HEADERS`].
    #[must_use]
    pub fn sheet_row(&self) -> Vec<String> {
        fn or_missing(value: Option<String>) -> String {
            value.unwrap_or_else(|| NOT_SPECIFIED.to_string())
        }

        let a = &self.answers;
        vec![
            self.submitted_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            self.name.clone(),
            or_missing(self.username.as_ref().map(|u| format!("@{u}"))),
            or_missing(self.quiz.as_ref().map(|q| format!("{}/{}", q.correct, q.total))),
            or_missing(self.quiz.as_ref().map(|q| format!("{:.1}%", q.percentage))),
            or_missing(self.quiz.as_ref().map(|q| q.level_name.clone())),
            or_missing(a.goal.clone()),
            or_missing(a.motivation.map(|m| m.to_string())),
            or_missing(a.study_time.clone()),
            or_missing(a.budget.clone()),
            or_missing(a.needs_help.map(|h| if h { "Так" } else { "Ні" }.to_string())),
            or_missing(a.format.map(|f| f.label().to_string())),
            or_missing(a.payment.clone()),
            or_missing(a.phone.clone()),
            or_missing(self.referral_code.as_ref().map(ToString::to_string)),
        ]
    }
}
