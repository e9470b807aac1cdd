//! Read-only reports over a deal snapshot. Every report is a pure function of
//! its inputs and the caller-supplied reference date.

use std::cmp::Ordering;

use chrono::NaiveDate;
use entity::{Deal, Stage};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

pub mod daily_brief;
pub mod forecast;
pub mod hygiene;
pub mod promoter;

pub use daily_brief::{AtRiskItem, DailyBrief, NoContactItem, OverdueItem, RiskReason, daily_brief};
pub use forecast::{
    CloseMonthTotals, ForecastSnapshot, GroupTotals, OwnerForecast, StageForecast,
    forecast_snapshot,
};
pub use hygiene::{
    HygieneIssue, HygieneReport, IssueType, IssueTypeCount, Severity, SeverityCounts,
    hygiene_report,
};
pub use promoter::{
    ActionPriority, ActionType, CommissionSummary, DealHealth, PromoterDashboard,
    PromoterDealHealth, PromoterStageBreakdown, PromoterSummary, RecommendedAction,
    classify_health, promoter_dashboard,
};

/// Compact deal row shared by report sections. Carries the weighted amount
/// so every report shows the same derived value.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DealSummary {
    pub deal_id: String,
    pub deal_name: String,
    pub account_name: String,
    pub owner: Option<String>,
    pub stage: Stage,
    pub probability: u8,
    #[serde(rename = "amountGBP")]
    pub amount_gbp: Option<Decimal>,
    #[serde(rename = "weightedAmountGBP")]
    pub weighted_amount_gbp: Option<Decimal>,
    pub close_date: Option<NaiveDate>,
    pub next_step: Option<String>,
    pub next_step_due_date: Option<NaiveDate>,
    pub last_contacted_date: Option<NaiveDate>,
}

impl From<&Deal> for DealSummary {
    fn from(deal: &Deal) -> Self {
        Self {
            deal_id: deal.deal_id.clone(),
            deal_name: deal.deal_name.clone(),
            account_name: deal.account_name.clone(),
            owner: deal.owner.clone(),
            stage: deal.stage,
            probability: deal.probability,
            amount_gbp: deal.amount_gbp,
            weighted_amount_gbp: deal.weighted_amount_gbp(),
            close_date: deal.close_date,
            next_step: deal.next_step.clone(),
            next_step_due_date: deal.next_step_due_date,
            last_contacted_date: deal.last_contacted_date,
        }
    }
}

/// Amount descending with missing amounts last, then id for stability.
pub(crate) fn by_amount_desc(a: &Deal, b: &Deal) -> Ordering {
    b.amount_gbp
        .cmp(&a.amount_gbp)
        .then_with(|| a.deal_id.cmp(&b.deal_id))
}

/// Running money total. Saturates at `Decimal::MAX`.
pub(crate) fn accumulate(sum: &mut Decimal, value: Decimal) {
    *sum = sum.saturating_add(value);
}

/// `part / whole` as a percentage rounded to one decimal place; 0 when
/// `whole` is zero.
pub(crate) fn percentage(part: Decimal, whole: Decimal) -> f64 {
    if whole.is_zero() {
        return 0.0;
    }
    let scaled = match part.checked_mul(Decimal::ONE_HUNDRED) {
        Some(hundreds) => hundreds.checked_div(whole),
        None => part
            .checked_div(whole)
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED)),
    };
    scaled
        .and_then(|value| value.round_dp(1).to_f64())
        .unwrap_or(0.0)
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub(crate) fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}
