use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distr::{Alphanumeric, Distribution};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

use crate::model::ids::PartnerId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ReferralError {
    #[error("label cannot be empty")]
    EmptyLabel,

    #[error("label is longer than {max} characters", max = Label::MAX_LEN)]
    LabelTooLong,

    #[error("label may only contain a-z, 0-9, '_' and '-': {raw}")]
    InvalidLabel { raw: String },

    #[error("invalid referral code: {raw}")]
    InvalidCode { raw: String },

    #[error("unknown conversion kind: {raw}")]
    UnknownKind { raw: String },

    #[error("invalid bot username: {raw}")]
    InvalidBotUsername { raw: String },
}

//
// ─── LABEL ─────────────────────────────────────────────────────────────────────
//

/// Normalised platform or theme tag (`tiktok`, `crypto`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Label(String);

impl Label {
    pub const MAX_LEN: usize = 24;

    /// Trims and lowercases the input, then validates it.
    ///
    /// # Errors
    ///
    /// Returns `ReferralError` if the label is empty, too long, or contains
    /// characters outside `[a-z0-9_-]`.
    pub fn new(value: impl AsRef<str>) -> Result<Self, ReferralError> {
        let normalized = value.as_ref().trim().to_lowercase();
        if normalized.is_empty() {
            return Err(ReferralError::EmptyLabel);
        }
        if normalized.chars().count() > Self::MAX_LEN {
            return Err(ReferralError::LabelTooLong);
        }
        if !normalized
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        {
            return Err(ReferralError::InvalidLabel { raw: normalized });
        }
        Ok(Self(normalized))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//
// ─── REFERRAL CODE ─────────────────────────────────────────────────────────────
//

/// Deep-link payload carried by `/start <code>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReferralCode(String);

impl ReferralCode {
    /// Chat platforms cap deep-link payloads at 64 characters.
    pub const MAX_LEN: usize = 64;
    const SUFFIX_LEN: usize = 6;

    /// Parses a code received from a user.
    ///
    /// # Errors
    ///
    /// Returns `ReferralError::InvalidCode` for empty, overlong or non
    /// `[A-Za-z0-9_-]` input.
    pub fn parse(raw: &str) -> Result<Self, ReferralError> {
        let trimmed = raw.trim();
        let valid = !trimmed.is_empty()
            && trimmed.len() <= Self::MAX_LEN
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if valid {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(ReferralError::InvalidCode {
                raw: trimmed.to_string(),
            })
        }
    }

    /// Generates `{platform}_{partner}_{suffix}` with a random lowercase suffix.
    #[must_use]
    pub fn generate<R: Rng + ?Sized>(platform: &Label, partner_id: PartnerId, rng: &mut R) -> Self {
        let suffix: String = (0..Self::SUFFIX_LEN)
            .map(|_| char::from(Alphanumeric.sample(&mut *rng)).to_ascii_lowercase())
            .collect();
        Self(format!("{platform}_{partner_id}_{suffix}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReferralCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//
// ─── LINK ──────────────────────────────────────────────────────────────────────
//

/// A referral code issued to a partner for one platform/theme campaign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferralLink {
    pub code: ReferralCode,
    pub partner_id: PartnerId,
    pub platform: Label,
    pub theme: Label,
    pub created_at: DateTime<Utc>,
}

impl ReferralLink {
    /// Public deep link, e.g. `https://t.me/my_bot?start=tiktok_4521_x1y2z3`.
    ///
    /// # Errors
    ///
    /// Returns `ReferralError::InvalidBotUsername` if the username cannot form a URL path.
    pub fn url(&self, bot_username: &str) -> Result<Url, ReferralError> {
        let name = bot_username.trim().trim_start_matches('@');
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ReferralError::InvalidBotUsername {
                raw: bot_username.to_string(),
            });
        }
        let base = format!("https://t.me/{name}");
        Url::parse_with_params(&base, &[("start", self.code.as_str())]).map_err(|_| {
            ReferralError::InvalidBotUsername {
                raw: bot_username.to_string(),
            }
        })
    }
}

//
// ─── CONVERSIONS ───────────────────────────────────────────────────────────────
//

/// Funnel stage reached by a referred user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionKind {
    /// Opened the bot through a referral link.
    Click,
    /// Began the survey.
    Start,
    /// Finished the survey.
    Complete,
}

impl ConversionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ConversionKind::Click => "click",
            ConversionKind::Start => "start",
            ConversionKind::Complete => "complete",
        }
    }
}

impl FromStr for ConversionKind {
    type Err = ReferralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "click" => Ok(Self::Click),
            "start" => Ok(Self::Start),
            "complete" => Ok(Self::Complete),
            other => Err(ReferralError::UnknownKind {
                raw: other.to_string(),
            }),
        }
    }
}

/// One tracked referral event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    pub partner_id: PartnerId,
    pub code: ReferralCode,
    pub platform: Label,
    pub kind: ConversionKind,
    pub created_at: DateTime<Utc>,
}

impl Conversion {
    #[must_use]
    pub fn for_link(link: &ReferralLink, kind: ConversionKind, at: DateTime<Utc>) -> Self {
        Self {
            partner_id: link.partner_id,
            code: link.code.clone(),
            platform: link.platform.clone(),
            kind,
            created_at: at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn label_normalizes_case_and_whitespace() {
        assert_eq!(Label::new("  TikTok ").unwrap().as_str(), "tiktok");
        assert_eq!(Label::new(""), Err(ReferralError::EmptyLabel));
        assert_eq!(
            Label::new("no spaces"),
            Err(ReferralError::InvalidLabel {
                raw: "no spaces".into()
            })
        );
        assert_eq!(Label::new("x".repeat(25)), Err(ReferralError::LabelTooLong));
    }

    #[test]
    fn generated_code_is_parseable() {
        let mut rng = StdRng::seed_from_u64(3);
        let platform = Label::new("instagram").unwrap();
        let code = ReferralCode::generate(&platform, PartnerId::new(4521), &mut rng);
        assert!(code.as_str().starts_with("instagram_4521_"));
        assert_eq!(code.as_str().len(), "instagram_4521_".len() + 6);
        assert_eq!(ReferralCode::parse(code.as_str()).unwrap(), code);
    }

    #[test]
    fn parse_rejects_unsafe_payloads() {
        assert!(ReferralCode::parse("").is_err());
        assert!(ReferralCode::parse("a b").is_err());
        assert!(ReferralCode::parse("drop;table").is_err());
        assert!(ReferralCode::parse(&"a".repeat(65)).is_err());
        assert!(ReferralCode::parse("tiktok_1000_ab-c").is_ok());
    }

    #[test]
    fn link_url_carries_start_parameter() {
        let link = ReferralLink {
            code: ReferralCode::parse("tiktok_1000_abc123").unwrap(),
            partner_id: PartnerId::new(1000),
            platform: Label::new("tiktok").unwrap(),
            theme: Label::new("crypto").unwrap(),
            created_at: fixed_now(),
        };
        let url = link.url("@english_bot").unwrap();
        assert_eq!(
            url.as_str(),
            "https://t.me/english_bot?start=tiktok_1000_abc123"
        );
        assert!(link.url("bad name").is_err());
    }

    #[test]
    fn conversion_kind_round_trips_storage_names() {
        for kind in [
            ConversionKind::Click,
            ConversionKind::Start,
            ConversionKind::Complete,
        ] {
            assert_eq!(kind.as_str().parse::<ConversionKind>().unwrap(), kind);
        }
        assert!("visit".parse::<ConversionKind>().is_err());
    }
}
