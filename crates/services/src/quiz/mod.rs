mod progress;
mod service;
mod session;

pub use crate::error::QuizError;
pub use progress::QuizProgress;
pub use service::{DEFAULT_QUIZ_SIZE, QuizService};
pub use session::{QuizAnswer, QuizPrompt, QuizSession};
