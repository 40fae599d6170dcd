//! Main menu and the fixed texts of the conversation.

use placement_core::model::QuizOutcome;
use placement_core::survey::SurveyStep;

use super::reply::Keyboard;

/// Entries of the main menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    LevelQuiz,
    BuyCourse,
    TrialLesson,
    ContactManager,
}

impl MenuAction {
    pub const ALL: [MenuAction; 4] = [
        MenuAction::LevelQuiz,
        MenuAction::BuyCourse,
        MenuAction::TrialLesson,
        MenuAction::ContactManager,
    ];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            MenuAction::LevelQuiz => "📚 Дізнатися рівень англійської",
            MenuAction::BuyCourse => "💰 Купити курс",
            MenuAction::TrialLesson => "📅 Записатись на пробний урок",
            MenuAction::ContactManager => "📞 Зв'язатись з менеджером",
        }
    }

    #[must_use]
    pub fn from_label(text: &str) -> Option<Self> {
        let text = text.trim();
        Self::ALL.into_iter().find(|a| a.label() == text)
    }
}

#[must_use]
pub fn main_menu() -> Keyboard {
    let labels: Vec<&str> = MenuAction::ALL.iter().map(|a| a.label()).collect();
    Keyboard::options(labels.as_slice(), 1)
}

/// Keyboard for a survey step.
#[must_use]
pub fn survey_keyboard(step: SurveyStep) -> Keyboard {
    match step {
        SurveyStep::Phone => Keyboard::RequestContact,
        SurveyStep::StartChoice | SurveyStep::Payment | SurveyStep::NeedsHelp => {
            Keyboard::options(step.options(), 1)
        }
        _ => Keyboard::options(step.options(), 2),
    }
}

#[must_use]
pub fn greeting(first_name: &str) -> String {
    format!(
        "👋 Вітаємо, {first_name}!\n\n\
         Тут можна безкоштовно визначити свій рівень англійської, \
         записатися на пробний урок або обрати курс.\n\n\
         Оберіть, що вас цікавить:"
    )
}

pub const MENU_HINT: &str = "Оберіть пункт меню 👇";
pub const BACK_TO_MENU: &str = "🔙 Повертаємось до головного меню.";
pub const UNKNOWN_COMMAND: &str = "Невідома команда. Оберіть пункт меню 👇";
pub const QUIZ_INTRO: &str =
    "📝 Починаємо тест! Оберіть правильну відповідь на кожне питання.";
pub const PICK_AN_OPTION: &str = "Будь ласка, оберіть один з варіантів на клавіатурі.";
pub const INVALID_PHONE: &str =
    "Не вдалося розпізнати номер. Введіть його у форматі +380XXXXXXXXX або поділіться контактом.";
pub const SURVEY_INTRO: &str = "Дайте, будь ласка, відповідь на кілька запитань, щоб ми підібрали для вас програму.";
pub const SURVEY_DONE: &str =
    "✨ Дякуємо! Ваша заявка прийнята, менеджер зв'яжеться з вами найближчим часом.";
pub const CONTACT_MANAGER: &str =
    "📞 Залиште номер телефону через «Купити курс» або «Записатись на пробний урок», \
     і менеджер зв'яжеться з вами. Ми на зв'язку щодня з 9:00 до 20:00.";
pub const QUIZ_UNAVAILABLE: &str = "На жаль, тест зараз недоступний. Спробуйте пізніше.";

#[must_use]
pub fn question_text(number: usize, total: usize, text: &str) -> String {
    format!("Питання {number}/{total}:\n\n{text}")
}

#[must_use]
pub fn answer_feedback(correct: bool, correct_answer: &str) -> String {
    if correct {
        "✨ Правильно!".to_string()
    } else {
        format!("❌ Неправильно. Правильна відповідь: {correct_answer}")
    }
}

#[must_use]
pub fn outcome_text(outcome: &QuizOutcome) -> String {
    format!(
        "🎉 Тест завершено!\n\n\
         Правильних відповідей: {}/{} ({:.1}%)\n\
         Ваш рівень: {}\n{}",
        outcome.correct,
        outcome.total,
        outcome.percentage,
        outcome.level_name,
        outcome.level_description
    )
}
