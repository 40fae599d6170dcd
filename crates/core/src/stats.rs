//! Referral statistics aggregation.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{Conversion, ConversionKind, Label, PartnerId, ReferralLink};

/// Funnel counts for one platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlatformStats {
    pub clicks: u64,
    pub starts: u64,
    pub completes: u64,
}

impl PlatformStats {
    fn bump(&mut self, kind: ConversionKind) {
        let slot = match kind {
            ConversionKind::Click => &mut self.clicks,
            ConversionKind::Start => &mut self.starts,
            ConversionKind::Complete => &mut self.completes,
        };
        *slot = slot.saturating_add(1);
    }
}

/// Per-partner funnel totals and a per-platform breakdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartnerStats {
    pub partner_id: PartnerId,
    pub total_clicks: u64,
    pub total_starts: u64,
    pub total_completes: u64,
    pub by_platform: BTreeMap<Label, PlatformStats>,
}

impl PartnerStats {
    /// Aggregates a partner's links and conversions.
    ///
    /// Conversions of other partners are ignored. Every platform the partner
    /// has a link for is listed, even without conversions.
    #[must_use]
    pub fn aggregate(
        partner_id: PartnerId,
        links: &[ReferralLink],
        conversions: &[Conversion],
    ) -> Self {
        let mut by_platform: BTreeMap<Label, PlatformStats> = links
            .iter()
            .filter(|l| l.partner_id == partner_id)
            .map(|l| (l.platform.clone(), PlatformStats::default()))
            .collect();

        let mut totals = PlatformStats::default();
        for conversion in conversions.iter().filter(|c| c.partner_id == partner_id) {
            totals.bump(conversion.kind);
            by_platform
                .entry(conversion.platform.clone())
                .or_default()
                .bump(conversion.kind);
        }

        Self {
            partner_id,
            total_clicks: totals.clicks,
            total_starts: totals.starts,
            total_completes: totals.completes,
            by_platform,
        }
    }

    /// Share of clicks that ended in a completed survey, in percent.
    #[must_use]
    pub fn completion_rate(&self) -> f64 {
        if self.total_clicks == 0 {
            return 0.0;
        }
        self.total_completes as f64 * 100.0 / self.total_clicks as f64
    }
}

/// Global referral totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TotalStats {
    pub total_links: u64,
    pub total_partners: u64,
    pub total_conversions: u64,
}

impl TotalStats {
    #[must_use]
    pub fn aggregate(links: &[ReferralLink], total_conversions: u64) -> Self {
        let partners: BTreeSet<PartnerId> = links.iter().map(|l| l.partner_id).collect();
        Self {
            total_links: links.len() as u64,
            total_partners: partners.len() as u64,
            total_conversions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReferralCode;
    use crate::time::fixed_now;

    fn link(code: &str, partner: u64, platform: &str) -> ReferralLink {
        ReferralLink {
            code: ReferralCode::parse(code).unwrap(),
            partner_id: PartnerId::new(partner),
            platform: Label::new(platform).unwrap(),
            theme: Label::new("crypto").unwrap(),
            created_at: fixed_now(),
        }
    }

    fn conv(link: &ReferralLink, kind: ConversionKind) -> Conversion {
        Conversion::for_link(link, kind, fixed_now())
    }

    #[test]
    fn partner_stats_split_by_kind_and_platform() {
        let tiktok = link("tiktok_1000_aaaaaa", 1000, "tiktok");
        let youtube = link("youtube_1000_bbbbbb", 1000, "youtube");
        let other = link("tiktok_2000_cccccc", 2000, "tiktok");
        let conversions = vec![
            conv(&tiktok, ConversionKind::Click),
            conv(&tiktok, ConversionKind::Click),
            conv(&tiktok, ConversionKind::Start),
            conv(&tiktok, ConversionKind::Complete),
            conv(&other, ConversionKind::Click),
        ];

        let stats = PartnerStats::aggregate(
            PartnerId::new(1000),
            &[tiktok.clone(), youtube, other],
            &conversions,
        );

        assert_eq!(stats.total_clicks, 2);
        assert_eq!(stats.total_starts, 1);
        assert_eq!(stats.total_completes, 1);
        assert_eq!(stats.by_platform.len(), 2);
        assert_eq!(
            stats.by_platform[&tiktok.platform],
            PlatformStats {
                clicks: 2,
                starts: 1,
                completes: 1
            }
        );
        assert_eq!(
            stats.by_platform[&Label::new("youtube").unwrap()],
            PlatformStats::default()
        );
        assert!((stats.completion_rate() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn partner_without_activity_is_all_zero() {
        let stats = PartnerStats::aggregate(PartnerId::new(5), &[], &[]);
        assert_eq!(stats.total_clicks, 0);
        assert!(stats.by_platform.is_empty());
        assert_eq!(stats.completion_rate(), 0.0);
    }

    #[test]
    fn totals_count_distinct_partners() {
        let links = [
            link("a_1000_aaaaaa", 1000, "a"),
            link("b_1000_bbbbbb", 1000, "b"),
            link("a_2000_cccccc", 2000, "a"),
        ];
        let totals = TotalStats::aggregate(&links, 17);
        assert_eq!(
            totals,
            TotalStats {
                total_links: 3,
                total_partners: 2,
                total_conversions: 17
            }
        );
    }
}
