#![forbid(unsafe_code)]

pub mod bank;
pub mod model;
pub mod stats;
pub mod survey;
pub mod time;

pub use bank::{BankError, QuestionBank};
pub use time::Clock;
