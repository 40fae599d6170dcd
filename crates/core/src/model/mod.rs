mod ids;
mod lead;
mod level;
mod question;
mod referral;
mod user;

pub use ids::{ParseIdError, PartnerId, UserId};
pub use lead::{LeadRecord, NOT_SPECIFIED, SHEET_HEADERS};
pub use level::{DEFAULT_PASS_PERCENTAGE, Level, LevelError, LevelScale, QuizOutcome};
pub use question::{Difficulty, Question, QuestionError};
pub use referral::{
    Conversion, ConversionKind, Label, ReferralCode, ReferralError, ReferralLink,
};
pub use user::ChatUser;
