use chrono::{DateTime, Utc};

use crate::model::ids::UserId;
use crate::model::referral::ReferralCode;

/// A person talking to the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatUser {
    pub id: UserId,
    pub username: Option<String>,
    pub first_name: String,
    /// First referral code the user arrived with, if any.
    pub referral_code: Option<ReferralCode>,
    pub created_at: DateTime<Utc>,
}

impl ChatUser {
    #[must_use]
    pub fn new(
        id: UserId,
        username: Option<String>,
        first_name: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            username: username
                .map(|u| u.trim().trim_start_matches('@').to_string())
                .filter(|u| !u.is_empty()),
            first_name: first_name.into(),
            referral_code: None,
            created_at,
        }
    }

    /// Attributes the user to `code` unless they already came through another link.
    ///
    /// Returns `true` when the attribution changed.
    pub fn attribute(&mut self, code: &ReferralCode) -> bool {
        if self.referral_code.is_some() {
            return false;
        }
        self.referral_code = Some(code.clone());
        true
    }

    /// `@username` when known.
    #[must_use]
    pub fn handle(&self) -> Option<String> {
        self.username.as_ref().map(|u| format!("@{u}"))
    }
}
