//! Operator commands: `/create_link` and `/stats`.

use thiserror::Error;

use placement_core::model::PartnerId;
use placement_core::stats::{PartnerStats, TotalStats};

use crate::referral_service::CreatedLink;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    CreateLink {
        platform: String,
        theme: String,
        partner_id: Option<PartnerId>,
    },
    Stats {
        partner_id: Option<PartnerId>,
    },
}

/// Malformed admin command; the message is the usage text sent back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum AdminCommandError {
    #[error(
        "❌ Використання: /create_link platform theme [partner_id]\n\
         Наприклад: /create_link tiktok crypto"
    )]
    CreateLinkUsage,
    #[error(
        "❌ Використання:\n\
         /stats - загальна статистика\n\
         /stats partner_id - статистика партнера"
    )]
    StatsUsage,
}

impl AdminCommand {
    /// Parses an admin command. Returns `None` for any other command.
    #[must_use]
    pub fn parse(command: &str, args: &[&str]) -> Option<Result<Self, AdminCommandError>> {
        match command {
            "/create_link" => Some(Self::parse_create_link(args)),
            "/stats" => Some(Self::parse_stats(args)),
            _ => None,
        }
    }

    fn parse_create_link(args: &[&str]) -> Result<Self, AdminCommandError> {
        let (platform, theme, partner) = match args {
            [platform, theme] => (platform, theme, None),
            [platform, theme, partner] => (platform, theme, Some(partner)),
            _ => return Err(AdminCommandError::CreateLinkUsage),
        };
        let partner_id = partner
            .map(|raw| raw.parse::<PartnerId>())
            .transpose()
            .map_err(|_| AdminCommandError::CreateLinkUsage)?;
        Ok(Self::CreateLink {
            platform: (*platform).to_string(),
            theme: (*theme).to_string(),
            partner_id,
        })
    }

    fn parse_stats(args: &[&str]) -> Result<Self, AdminCommandError> {
        match args {
            [] => Ok(Self::Stats { partner_id: None }),
            [raw] => raw
                .parse::<PartnerId>()
                .map(|id| Self::Stats {
                    partner_id: Some(id),
                })
                .map_err(|_| AdminCommandError::StatsUsage),
            _ => Err(AdminCommandError::StatsUsage),
        }
    }
}

#[must_use]
pub fn created_link_text(created: &CreatedLink) -> String {
    let link = &created.link;
    format!(
        "✨ Нове реферальне посилання створено!\n\n\
         🔗 Посилання: {}\n\
         📱 Платформа: {}\n\
         🎯 Тема: {}\n\
         🆔 ID партнера: {}\n\n\
         Збережіть ID партнера, щоб переглядати статистику!",
        created.url, link.platform, link.theme, link.partner_id
    )
}

#[must_use]
pub fn partner_stats_text(stats: &PartnerStats) -> String {
    let mut text = format!(
        "📊 Статистика партнера #{}\n\n\
         👆 Всього кліків: {}\n\
         🎯 Почали опитування: {}\n\
         ✅ Завершили: {}\n\
         📈 Конверсія: {:.1}%\n",
        stats.partner_id,
        stats.total_clicks,
        stats.total_starts,
        stats.total_completes,
        stats.completion_rate()
    );
    for (platform, counts) in &stats.by_platform {
        text.push_str(&format!(
            "\n📱 {}:\n   Кліки: {}\n   Старти: {}\n   Завершення: {}\n",
            platform.as_str().to_uppercase(),
            counts.clicks,
            counts.starts,
            counts.completes
        ));
    }
    text
}

#[must_use]
pub fn total_stats_text(stats: &TotalStats) -> String {
    format!(
        "📈 Загальна статистика:\n\n\
         🔗 Активних посилань: {}\n\
         👥 Партнерів: {}\n\
         👆 Всього конверсій: {}",
        stats.total_links, stats.total_partners, stats.total_conversions
    )
}
