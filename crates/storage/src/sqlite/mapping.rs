use chrono::{DateTime, Utc};
use placement_core::model::{
    ChatUser, Conversion, ConversionKind, Label, LeadRecord, PartnerId, QuizOutcome,
    ReferralCode, ReferralLink, UserId,
};
use placement_core::survey::{StartFormat, SurveyAnswers};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn format_to_str(format: StartFormat) -> &'static str {
    match format {
        StartFormat::Immediate => "immediate",
        StartFormat::TrialFirst => "trial",
    }
}

fn parse_format(s: &str) -> Result<StartFormat, StorageError> {
    match s {
        "immediate" => Ok(StartFormat::Immediate),
        "trial" => Ok(StartFormat::TrialFirst),
        _ => Err(StorageError::Serialization(format!("invalid start format: {s}"))),
    }
}

fn code_from_opt(raw: Option<String>) -> Result<Option<ReferralCode>, StorageError> {
    raw.as_deref().map(ReferralCode::parse).transpose().map_err(ser)
}

pub(crate) fn map_user_row(row: &SqliteRow) -> Result<ChatUser, StorageError> {
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(ser)?;
    let mut user = ChatUser::new(
        UserId::new(i64_to_u64("user_id", row.try_get("user_id").map_err(ser)?)?),
        row.try_get::<Option<String>, _>("username").map_err(ser)?,
        row.try_get::<String, _>("first_name").map_err(ser)?,
        created_at,
    );
    user.referral_code = code_from_opt(row.try_get("referral_code").map_err(ser)?)?;
    Ok(user)
}

pub(crate) fn map_link_row(row: &SqliteRow) -> Result<ReferralLink, StorageError> {
    Ok(ReferralLink {
        code: ReferralCode::parse(&row.try_get::<String, _>("code").map_err(ser)?).map_err(ser)?,
        partner_id: PartnerId::new(i64_to_u64(
            "partner_id",
            row.try_get("partner_id").map_err(ser)?,
        )?),
        platform: Label::new(row.try_get::<String, _>("platform").map_err(ser)?).map_err(ser)?,
        theme: Label::new(row.try_get::<String, _>("theme").map_err(ser)?).map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

pub(crate) fn map_conversion_row(row: &SqliteRow) -> Result<Conversion, StorageError> {
    let kind: String = row.try_get("event_type").map_err(ser)?;
    Ok(Conversion {
        partner_id: PartnerId::new(i64_to_u64(
            "partner_id",
            row.try_get("partner_id").map_err(ser)?,
        )?),
        code: ReferralCode::parse(&row.try_get::<String, _>("code").map_err(ser)?).map_err(ser)?,
        platform: Label::new(row.try_get::<String, _>("platform").map_err(ser)?).map_err(ser)?,
        kind: kind.parse::<ConversionKind>().map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

pub(crate) fn map_lead_row(row: &SqliteRow) -> Result<LeadRecord, StorageError> {
    let quiz = match (
        row.try_get::<Option<i64>, _>("quiz_correct").map_err(ser)?,
        row.try_get::<Option<i64>, _>("quiz_total").map_err(ser)?,
    ) {
        (Some(correct), Some(total)) => Some(QuizOutcome {
            correct: u32::try_from(correct)
                .map_err(|_| StorageError::Serialization(format!("invalid quiz_correct: {correct}")))?,
            total: u32::try_from(total)
                .map_err(|_| StorageError::Serialization(format!("invalid quiz_total: {total}")))?,
            percentage: row
                .try_get::<Option<f64>, _>("quiz_percentage")
                .map_err(ser)?
                .unwrap_or_default(),
            level_name: row
                .try_get::<Option<String>, _>("level_name")
                .map_err(ser)?
                .unwrap_or_default(),
            level_description: row
                .try_get::<Option<String>, _>("level_description")
                .map_err(ser)?
                .unwrap_or_default(),
            passed: row
                .try_get::<Option<bool>, _>("passed")
                .map_err(ser)?
                .unwrap_or(false),
        }),
        _ => None,
    };

    let motivation = row
        .try_get::<Option<i64>, _>("motivation")
        .map_err(ser)?
        .map(|m| {
            u8::try_from(m)
                .map_err(|_| StorageError::Serialization(format!("invalid motivation: {m}")))
        })
        .transpose()?;

    let answers = SurveyAnswers {
        goal: row.try_get("goal").map_err(ser)?,
        motivation,
        study_time: row.try_get("study_time").map_err(ser)?,
        budget: row.try_get("budget").map_err(ser)?,
        needs_help: row.try_get("needs_help").map_err(ser)?,
        format: row
            .try_get::<Option<String>, _>("start_format")
            .map_err(ser)?
            .as_deref()
            .map(parse_format)
            .transpose()?,
        payment: row.try_get("payment").map_err(ser)?,
        phone: row.try_get("phone").map_err(ser)?,
    };

    Ok(LeadRecord {
        submitted_at: row.try_get("submitted_at").map_err(ser)?,
        user_id: UserId::new(i64_to_u64("user_id", row.try_get("user_id").map_err(ser)?)?),
        name: row.try_get("name").map_err(ser)?,
        username: row.try_get("username").map_err(ser)?,
        quiz,
        answers,
        referral_code: code_from_opt(row.try_get("referral_code").map_err(ser)?)?,
    })
}
