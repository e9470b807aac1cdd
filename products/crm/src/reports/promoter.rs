//! Per-promoter referral dashboard.
//!
//! Aggregates are recomputed from the deal collection on every call; nothing
//! here is stored on the promoter.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use entity::{Deal, Promoter, PromoterTier, Stage};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info_span};

use super::{DealSummary, accumulate, percentage, round1};
use crate::filter::{days_since_contact, is_overdue};
use crate::settings::PipelineSettings;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum DealHealth {
    Healthy,
    AtRisk,
    Stalled,
    Critical,
    Won,
    Lost,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ActionType {
    CheckIn,
    ProvideContext,
    MakeIntroduction,
    ProvideReference,
    ShareContent,
    FollowUpWithLead,
    EscalateInternal,
    CelebrateWin,
    ReviewLoss,
}

impl ActionType {
    pub fn describe(self) -> &'static str {
        match self {
            ActionType::CheckIn => "Check in with the account owner on progress",
            ActionType::ProvideContext => "Share background on the customer's needs",
            ActionType::MakeIntroduction => "Introduce the decision maker",
            ActionType::ProvideReference => "Offer a reference or testimonial",
            ActionType::ShareContent => "Share relevant case studies",
            ActionType::FollowUpWithLead => "Follow up with the lead directly",
            ActionType::EscalateInternal => "Escalate internally for a decision",
            ActionType::CelebrateWin => "Thank the customer and celebrate the win",
            ActionType::ReviewLoss => "Review why the deal was lost",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ActionPriority {
    Low,
    Medium,
    High,
    Urgent,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoterSummary {
    pub total_referrals: usize,
    pub active_deals: usize,
    pub closed_won: usize,
    pub closed_lost: usize,
    /// `closedWon / totalReferrals` as a percentage.
    pub conversion_rate: f64,
    pub total_pipeline: Decimal,
    pub weighted_pipeline: Decimal,
    pub total_won_value: Decimal,
    /// Mean amount over referred deals that carry an amount.
    pub average_deal_value: Decimal,
    pub closing_this_month: usize,
    pub closing_this_month_value: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoterStageBreakdown {
    pub stage: Stage,
    pub count: usize,
    pub total: Decimal,
    pub weighted: Decimal,
    pub potential_commission: Decimal,
    pub average_age_days: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoterDealHealth {
    #[serde(flatten)]
    pub deal: DealSummary,
    pub health: DealHealth,
    pub days_since_contact: Option<i64>,
    pub potential_commission: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedAction {
    pub deal_id: String,
    pub deal_name: String,
    pub account_name: String,
    pub stage: Stage,
    pub health: DealHealth,
    pub action: ActionType,
    pub priority: ActionPriority,
    pub description: &'static str,
    pub potential_commission: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionSummary {
    pub rate_percent: u32,
    pub total_earned: Decimal,
    pub total_paid: Decimal,
    pub pending_payment: Decimal,
    pub projected_from_pipeline: Decimal,
    pub projected_this_month: Decimal,
    pub projected_this_quarter: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoterDashboard {
    pub as_of: NaiveDate,
    pub promoter: Promoter,
    pub summary: PromoterSummary,
    pub by_stage: Vec<PromoterStageBreakdown>,
    pub deals: Vec<PromoterDealHealth>,
    pub actions: Vec<RecommendedAction>,
    pub commission: CommissionSummary,
    /// Tier earned by converted referrals, which may differ from the
    /// promoter's assigned tier.
    pub eligible_tier: PromoterTier,
    pub referrals_to_next_tier: Option<u32>,
}

/// Health of one deal against the contact thresholds in `settings`.
pub fn classify_health(deal: &Deal, today: NaiveDate, settings: &PipelineSettings) -> DealHealth {
    match deal.stage {
        Stage::ClosedWon => return DealHealth::Won,
        Stage::ClosedLost => return DealHealth::Lost,
        _ => {}
    }
    let overdue = is_overdue(deal, today);
    if overdue && deal.amount_gbp.is_some_and(|a| a >= settings.high_value_threshold) {
        return DealHealth::Critical;
    }
    let at_risk_after = settings.no_contact_threshold_days - settings.at_risk_window_days;
    match days_since_contact(deal, today) {
        None => DealHealth::Stalled,
        Some(days) if days > settings.no_contact_threshold_days => DealHealth::Stalled,
        Some(days) if days > at_risk_after => DealHealth::AtRisk,
        _ if overdue => DealHealth::AtRisk,
        _ => DealHealth::Healthy,
    }
}

/// Action for a deal of the given stage and health, `None` when nothing
/// needs doing.
fn recommend(
    stage: Stage,
    health: DealHealth,
    high_value: bool,
) -> Option<(ActionType, ActionPriority)> {
    use ActionPriority::*;
    use ActionType::*;
    let picked = match (health, stage) {
        (DealHealth::Won, _) => (CelebrateWin, Medium),
        (DealHealth::Lost, _) => (ReviewLoss, Low),
        (DealHealth::Healthy, _) => return None,

        (DealHealth::Critical, Stage::Proposal | Stage::Negotiation) => (EscalateInternal, Urgent),
        (DealHealth::Critical, Stage::Lead | Stage::Qualified) => (FollowUpWithLead, High),
        (DealHealth::Critical, Stage::Discovery) => (MakeIntroduction, High),
        (DealHealth::Critical, _) => (CheckIn, High),

        (DealHealth::Stalled, Stage::Lead) => {
            (FollowUpWithLead, if high_value { Medium } else { Low })
        }
        (DealHealth::Stalled, Stage::Qualified) => (ProvideContext, Medium),
        (DealHealth::Stalled, Stage::Discovery) => (MakeIntroduction, Medium),
        (DealHealth::Stalled, Stage::Proposal) => (ProvideReference, High),
        (DealHealth::Stalled, Stage::Negotiation) => (EscalateInternal, High),
        (DealHealth::Stalled, _) => (CheckIn, Low),

        (DealHealth::AtRisk, Stage::Lead) => (FollowUpWithLead, Low),
        (DealHealth::AtRisk, Stage::Qualified) => (ShareContent, Low),
        (DealHealth::AtRisk, Stage::Discovery) => (ProvideContext, Medium),
        (DealHealth::AtRisk, Stage::Proposal) => (ProvideReference, Medium),
        (DealHealth::AtRisk, Stage::Negotiation) => (CheckIn, Medium),
        (DealHealth::AtRisk, _) => (CheckIn, Low),
    };
    Some(picked)
}

pub fn promoter_dashboard(
    deals: &[Deal],
    promoter: &Promoter,
    today: NaiveDate,
    settings: &PipelineSettings,
) -> PromoterDashboard {
    let span = info_span!(
        "crm.promoterDashboard",
        promoter = promoter.promoter_id.as_deref().or(promoter.promo_code.as_deref()).unwrap_or(""),
        as_of = %today
    );
    let _guard = span.enter();

    let rate = promoter.tier.commission_rate();
    let referred: Vec<&Deal> = deals
        .iter()
        .filter(|d| promoter.refers(d.promoter_id.as_deref(), d.promo_code.as_deref()))
        .collect();
    let potential = |deal: &Deal| deal.amount_or_zero().saturating_mul(rate);

    let summary = summarize(&referred, today);
    let by_stage = breakdown(&referred, today, rate);

    let deals_health: Vec<PromoterDealHealth> = referred
        .iter()
        .map(|deal| PromoterDealHealth {
            deal: DealSummary::from(*deal),
            health: classify_health(deal, today, settings),
            days_since_contact: days_since_contact(deal, today),
            potential_commission: potential(*deal),
        })
        .collect();

    let mut actions: Vec<RecommendedAction> = referred
        .iter()
        .zip(&deals_health)
        .filter(|(deal, entry)| {
            deal.is_open() || recently_closed(deal, today, settings.recent_close_days, entry.health)
        })
        .filter_map(|(deal, entry)| {
            let high_value = deal.amount_gbp.is_some_and(|a| a >= settings.high_value_threshold);
            let (action, priority) = recommend(deal.stage, entry.health, high_value)?;
            Some(RecommendedAction {
                deal_id: deal.deal_id.clone(),
                deal_name: deal.deal_name.clone(),
                account_name: deal.account_name.clone(),
                stage: deal.stage,
                health: entry.health,
                action,
                priority,
                description: action.describe(),
                potential_commission: entry.potential_commission,
            })
        })
        .collect();
    actions.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| b.potential_commission.cmp(&a.potential_commission))
            .then_with(|| a.deal_id.cmp(&b.deal_id))
    });

    let commission = commission_summary(&referred, promoter.tier, today);
    let converted = summary.closed_won as u32;
    let eligible_tier = PromoterTier::for_converted(converted);
    let referrals_to_next_tier = eligible_tier
        .next()
        .map(|next| next.min_referrals().saturating_sub(converted));

    debug!(
        referrals = summary.total_referrals,
        actions = actions.len(),
        "promoter dashboard computed"
    );

    PromoterDashboard {
        as_of: today,
        promoter: promoter.clone(),
        summary,
        by_stage,
        deals: deals_health,
        actions,
        commission,
        eligible_tier,
        referrals_to_next_tier,
    }
}

fn recently_closed(deal: &Deal, today: NaiveDate, window_days: i64, health: DealHealth) -> bool {
    matches!(health, DealHealth::Won | DealHealth::Lost)
        && deal
            .close_date
            .is_none_or(|closed| (0..=window_days).contains(&(today - closed).num_days()))
}

fn same_month(date: NaiveDate, today: NaiveDate) -> bool {
    date.year() == today.year() && date.month() == today.month()
}

fn same_quarter(date: NaiveDate, today: NaiveDate) -> bool {
    date.year() == today.year() && date.month0() / 3 == today.month0() / 3
}

fn summarize(referred: &[&Deal], today: NaiveDate) -> PromoterSummary {
    let mut summary = PromoterSummary {
        total_referrals: referred.len(),
        active_deals: 0,
        closed_won: 0,
        closed_lost: 0,
        conversion_rate: 0.0,
        total_pipeline: Decimal::ZERO,
        weighted_pipeline: Decimal::ZERO,
        total_won_value: Decimal::ZERO,
        average_deal_value: Decimal::ZERO,
        closing_this_month: 0,
        closing_this_month_value: Decimal::ZERO,
    };
    let mut priced = 0u32;
    let mut priced_total = Decimal::ZERO;
    for deal in referred {
        if let Some(amount) = deal.amount_gbp {
            priced += 1;
            accumulate(&mut priced_total, amount);
        }
        match deal.stage {
            Stage::ClosedWon => {
                summary.closed_won += 1;
                accumulate(&mut summary.total_won_value, deal.amount_or_zero());
            }
            Stage::ClosedLost => summary.closed_lost += 1,
            _ => {
                summary.active_deals += 1;
                accumulate(&mut summary.total_pipeline, deal.amount_or_zero());
                accumulate(&mut summary.weighted_pipeline, deal.weighted_or_zero());
                if deal.close_date.is_some_and(|d| same_month(d, today)) {
                    summary.closing_this_month += 1;
                    let value = deal.amount_or_zero();
                    accumulate(&mut summary.closing_this_month_value, value);
                }
            }
        }
    }
    summary.conversion_rate = percentage(
        Decimal::from(summary.closed_won as u64),
        Decimal::from(summary.total_referrals as u64),
    );
    if priced > 0 {
        summary.average_deal_value = (priced_total / Decimal::from(priced)).round_dp(2);
    }
    summary
}

fn breakdown(referred: &[&Deal], today: NaiveDate, rate: Decimal) -> Vec<PromoterStageBreakdown> {
    #[derive(Default)]
    struct Acc {
        count: usize,
        total: Decimal,
        weighted: Decimal,
        age_days: i64,
        aged: i64,
    }

    let mut stages: BTreeMap<Stage, Acc> = BTreeMap::new();
    for deal in referred {
        let acc = stages.entry(deal.stage).or_default();
        acc.count += 1;
        accumulate(&mut acc.total, deal.amount_or_zero());
        accumulate(&mut acc.weighted, deal.weighted_or_zero());
        if let Some(created) = deal.created_date {
            acc.age_days += (today - created).num_days().max(0);
            acc.aged += 1;
        }
    }
    Stage::ALL
        .iter()
        .filter_map(|stage| {
            let acc = stages.get(stage)?;
            Some(PromoterStageBreakdown {
                stage: *stage,
                count: acc.count,
                total: acc.total,
                weighted: acc.weighted,
                potential_commission: acc.total.saturating_mul(rate),
                average_age_days: if acc.aged == 0 {
                    0.0
                } else {
                    round1(acc.age_days as f64 / acc.aged as f64)
                },
            })
        })
        .collect()
}

fn commission_summary(
    referred: &[&Deal],
    tier: PromoterTier,
    today: NaiveDate,
) -> CommissionSummary {
    let rate = tier.commission_rate();
    let mut summary = CommissionSummary {
        rate_percent: tier.commission_percent(),
        total_earned: Decimal::ZERO,
        total_paid: Decimal::ZERO,
        pending_payment: Decimal::ZERO,
        projected_from_pipeline: Decimal::ZERO,
        projected_this_month: Decimal::ZERO,
        projected_this_quarter: Decimal::ZERO,
    };
    for deal in referred {
        if deal.stage == Stage::ClosedWon {
            // Recorded commission wins over the tier rate.
            let earned = deal
                .promoter_commission
                .unwrap_or_else(|| deal.amount_or_zero().saturating_mul(rate));
            accumulate(&mut summary.total_earned, earned);
            if deal.commission_paid {
                accumulate(&mut summary.total_paid, earned);
            }
        } else if deal.is_open() {
            let projected = deal.weighted_or_zero().saturating_mul(rate);
            accumulate(&mut summary.projected_from_pipeline, projected);
            if let Some(close) = deal.close_date {
                if same_month(close, today) {
                    accumulate(&mut summary.projected_this_month, projected);
                }
                if same_quarter(close, today) {
                    accumulate(&mut summary.projected_this_quarter, projected);
                }
            }
        }
    }
    summary.pending_payment = summary
        .total_earned
        .saturating_sub(summary.total_paid)
        .max(Decimal::ZERO);
    summary
}
