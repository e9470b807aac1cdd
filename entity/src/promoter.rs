use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Referral partner tier. Each tier fixes a commission rate and the number of
/// converted referrals needed to reach it.
#[derive(
    Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize,
)]
pub enum PromoterTier {
    #[default]
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
}

impl PromoterTier {
    pub const ALL: [PromoterTier; 5] = [
        PromoterTier::Bronze,
        PromoterTier::Silver,
        PromoterTier::Gold,
        PromoterTier::Platinum,
        PromoterTier::Diamond,
    ];

    /// Commission rate as a whole percentage.
    pub fn commission_percent(self) -> u32 {
        match self {
            PromoterTier::Bronze => 10,
            PromoterTier::Silver => 12,
            PromoterTier::Gold => 15,
            PromoterTier::Platinum => 18,
            PromoterTier::Diamond => 20,
        }
    }

    /// Commission rate as a fraction (`0.15` for Gold).
    pub fn commission_rate(self) -> Decimal {
        Decimal::from(self.commission_percent()) / Decimal::ONE_HUNDRED
    }

    pub fn min_referrals(self) -> u32 {
        match self {
            PromoterTier::Bronze => 0,
            PromoterTier::Silver => 10,
            PromoterTier::Gold => 25,
            PromoterTier::Platinum => 50,
            PromoterTier::Diamond => 100,
        }
    }

    /// Highest tier whose referral threshold is met.
    pub fn for_converted(converted: u32) -> Self {
        Self::ALL
            .into_iter()
            .rev()
            .find(|tier| converted >= tier.min_referrals())
            .unwrap_or_default()
    }

    pub fn next(self) -> Option<Self> {
        match self {
            PromoterTier::Bronze => Some(PromoterTier::Silver),
            PromoterTier::Silver => Some(PromoterTier::Gold),
            PromoterTier::Gold => Some(PromoterTier::Platinum),
            PromoterTier::Platinum => Some(PromoterTier::Diamond),
            PromoterTier::Diamond => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PromoterTier::Bronze => "Bronze",
            PromoterTier::Silver => "Silver",
            PromoterTier::Gold => "Gold",
            PromoterTier::Platinum => "Platinum",
            PromoterTier::Diamond => "Diamond",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownTier(pub String);

impl fmt::Display for UnknownTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown promoter tier '{}'", self.0)
    }
}

impl std::error::Error for UnknownTier {}

impl FromStr for PromoterTier {
    type Err = UnknownTier;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        PromoterTier::ALL
            .into_iter()
            .find(|tier| tier.label().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| UnknownTier(value.to_string()))
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum PromoterStatus {
    #[default]
    Pending,
    Active,
    Suspended,
    Inactive,
}

/// A referral partner. Performance counters are not stored here; they are
/// computed from the deal collection on every dashboard request.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Promoter {
    pub promoter_id: Option<String>,
    pub promo_code: Option<String>,
    pub name: Option<String>,
    pub tier: PromoterTier,
    pub status: PromoterStatus,
}

impl Promoter {
    pub fn new(promoter_id: impl Into<String>, tier: PromoterTier) -> Self {
        Self {
            promoter_id: Some(promoter_id.into()),
            tier,
            status: PromoterStatus::Active,
            ..Self::default()
        }
    }

    pub fn with_promo_code(mut self, code: impl Into<String>) -> Self {
        self.promo_code = Some(code.into());
        self
    }

    /// True when the deal's promoter id or promo code names this promoter.
    pub fn refers(&self, promoter_id: Option<&str>, promo_code: Option<&str>) -> bool {
        fn same(a: Option<&str>, b: Option<&str>) -> bool {
            match (a.map(str::trim), b.map(str::trim)) {
                (Some(a), Some(b)) if !a.is_empty() => a.eq_ignore_ascii_case(b),
                _ => false,
            }
        }
        same(self.promoter_id.as_deref(), promoter_id)
            || same(self.promo_code.as_deref(), promo_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_parses_ignoring_case() {
        assert_eq!(" gold ".parse::<PromoterTier>().unwrap(), PromoterTier::Gold);
        assert!("copper".parse::<PromoterTier>().is_err());
    }

    #[test]
    fn tier_rates_and_thresholds() {
        let rates: Vec<u32> = PromoterTier::ALL.iter().map(|t| t.commission_percent()).collect();
        assert_eq!(rates, vec![10, 12, 15, 18, 20]);
        let mins: Vec<u32> = PromoterTier::ALL.iter().map(|t| t.min_referrals()).collect();
        assert_eq!(mins, vec![0, 10, 25, 50, 100]);
        assert_eq!(PromoterTier::Gold.commission_rate(), Decimal::new(15, 2));
    }

    #[test]
    fn tier_progression_uses_highest_met_threshold() {
        assert_eq!(PromoterTier::for_converted(0), PromoterTier::Bronze);
        assert_eq!(PromoterTier::for_converted(9), PromoterTier::Bronze);
        assert_eq!(PromoterTier::for_converted(10), PromoterTier::Silver);
        assert_eq!(PromoterTier::for_converted(99), PromoterTier::Platinum);
        assert_eq!(PromoterTier::for_converted(250), PromoterTier::Diamond);
    }

    #[test]
    fn refers_matches_id_or_code_ignoring_case() {
        let promoter = Promoter::new("P-001", PromoterTier::Gold).with_promo_code("SUN10");
        assert!(promoter.refers(Some("p-001"), None));
        assert!(promoter.refers(None, Some("sun10")));
        assert!(!promoter.refers(Some("P-002"), Some("WIND5")));
        assert!(!Promoter::default().refers(Some(""), Some("")));
    }
}
