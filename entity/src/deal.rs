use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::stage::Stage;

/// Largest money amount accepted from input: £1 trillion. Sums over a
/// collection saturate rather than overflow, but a single value is capped.
pub const MAX_AMOUNT_GBP: Decimal = Decimal::from_parts(0xD4A5_1000, 0xE8, 0, false, 0);

/// A sales opportunity.
///
/// `weighted_amount_gbp` is not a field: it is always derived from
/// `amount_gbp` and `probability`, see [`Deal::weighted_amount_gbp`].
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Deal {
    pub deal_id: String,
    pub order_no: Option<String>,
    pub user_id: Option<String>,

    pub account_name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,

    pub postcode: Option<String>,
    pub postcode_area: Option<String>,
    pub region: Option<String>,
    pub installation_location: Option<String>,
    pub map_link: Option<String>,

    pub lead_source: Option<String>,
    pub product_line: Option<String>,
    pub deal_name: String,

    pub stage: Stage,
    pub probability: u8,
    #[serde(rename = "amountGBP")]
    pub amount_gbp: Option<Decimal>,

    pub owner: Option<String>,
    pub created_date: Option<NaiveDate>,
    pub last_contacted_date: Option<NaiveDate>,
    pub next_step: Option<String>,
    pub next_step_due_date: Option<NaiveDate>,
    pub close_date: Option<NaiveDate>,

    pub service_plan: Option<String>,
    pub last_service_date: Option<NaiveDate>,
    pub next_service_due_date: Option<NaiveDate>,

    pub comments: Option<String>,
    pub tags: Vec<String>,

    pub promoter_id: Option<String>,
    pub promo_code: Option<String>,
    pub promoter_commission: Option<Decimal>,
    pub commission_paid: bool,
    pub commission_paid_date: Option<NaiveDate>,
}

impl Deal {
    pub fn new(deal_name: impl Into<String>, account_name: impl Into<String>) -> Self {
        Self {
            deal_name: deal_name.into(),
            account_name: account_name.into(),
            ..Self::default()
        }
    }

    /// `amount * probability / 100`, absent when the amount is absent.
    ///
    /// The probability is scaled first so the product never exceeds the
    /// amount.
    pub fn weighted_amount_gbp(&self) -> Option<Decimal> {
        let share = Decimal::from(self.probability.min(100)) / Decimal::ONE_HUNDRED;
        self.amount_gbp.map(|amount| amount.saturating_mul(share))
    }

    /// Amount with missing values counted as zero.
    pub fn amount_or_zero(&self) -> Decimal {
        self.amount_gbp.unwrap_or(Decimal::ZERO)
    }

    pub fn weighted_or_zero(&self) -> Decimal {
        self.weighted_amount_gbp().unwrap_or(Decimal::ZERO)
    }

    pub fn is_open(&self) -> bool {
        self.stage.is_open()
    }

    /// Case-insensitive identity comparison.
    pub fn has_id(&self, deal_id: &str) -> bool {
        !self.deal_id.is_empty() && self.deal_id.eq_ignore_ascii_case(deal_id.trim())
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        let wanted = tag.trim();
        self.tags.iter().any(|t| t.trim().eq_ignore_ascii_case(wanted))
    }

    pub fn view(&self) -> DealView<'_> {
        DealView::from(self)
    }
}

/// Output shape of a deal: every stored field plus the derived weighted
/// amount.
#[derive(Clone, Debug, Serialize)]
pub struct DealView<'a> {
    #[serde(flatten)]
    pub deal: &'a Deal,
    #[serde(rename = "weightedAmountGBP")]
    pub weighted_amount_gbp: Option<Decimal>,
}

impl<'a> From<&'a Deal> for DealView<'a> {
    fn from(deal: &'a Deal) -> Self {
        Self {
            deal,
            weighted_amount_gbp: deal.weighted_amount_gbp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(value: i64) -> Decimal {
        Decimal::from(value)
    }

    #[test]
    fn weighted_amount_tracks_amount_and_probability() {
        let mut deal = Deal::new("Heat pump", "Acme");
        deal.probability = 60;
        assert_eq!(deal.weighted_amount_gbp(), None);

        deal.amount_gbp = Some(dec(50_000));
        assert_eq!(deal.weighted_amount_gbp(), Some(dec(30_000)));

        deal.probability = 25;
        assert_eq!(deal.weighted_amount_gbp(), Some(dec(12_500)));
    }

    #[test]
    fn weighted_amount_of_the_largest_decimal_does_not_overflow() {
        let mut deal = Deal::new("Whale", "Acme");
        deal.amount_gbp = Some(Decimal::MAX);
        deal.probability = 100;
        assert_eq!(deal.weighted_amount_gbp(), Some(Decimal::MAX));
        deal.probability = 60;
        assert!(deal.weighted_or_zero() < Decimal::MAX);
    }

    #[test]
    fn amount_ceiling_is_one_trillion() {
        assert_eq!(MAX_AMOUNT_GBP, Decimal::from(1_000_000_000_000i64));
    }

    #[test]
    fn id_comparison_ignores_case() {
        let mut deal = Deal::new("Boiler", "Acme");
        assert!(!deal.has_id(""));
        deal.deal_id = "D-20250101-ABC".into();
        assert!(deal.has_id("d-20250101-abc"));
        assert!(!deal.has_id("D-20250101-ABD"));
    }

    #[test]
    fn view_serializes_weighted_amount() {
        let mut deal = Deal::new("Boiler", "Acme");
        deal.amount_gbp = Some(dec(1_000));
        deal.probability = 50;
        let json = serde_json::to_value(deal.view()).unwrap();
        assert_eq!(json["dealName"], "Boiler");
        assert_eq!(json["amountGBP"], "1000");
        let weighted: Decimal = json["weightedAmountGBP"].as_str().unwrap().parse().unwrap();
        assert_eq!(weighted, dec(500));
    }

    #[test]
    fn missing_fields_deserialize_to_defaults() {
        let deal: Deal =
            serde_json::from_str(r#"{"dealName":"X","accountName":"Y","amountGBP":1200.5}"#)
                .unwrap();
        assert_eq!(deal.stage, Stage::Lead);
        assert_eq!(deal.probability, 0);
        assert!(deal.tags.is_empty());
        assert_eq!(deal.amount_gbp, Some(Decimal::new(12005, 1)));
    }
}
