use chrono::NaiveDate;
use entity::Deal;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info_span};

use super::{DealSummary, by_amount_desc};
use crate::filter::{days_since_contact, is_overdue};
use crate::settings::PipelineSettings;

/// What needs attention today.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyBrief {
    pub as_of: NaiveDate,
    pub due_today: Vec<DealSummary>,
    pub overdue: Vec<OverdueItem>,
    pub no_contact: Vec<NoContactItem>,
    pub high_value_at_risk: Vec<AtRiskItem>,
    pub total_action_items: usize,
    #[serde(rename = "totalAtRiskValueGBP")]
    pub total_at_risk_value: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverdueItem {
    #[serde(flatten)]
    pub deal: DealSummary,
    pub days_overdue: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoContactItem {
    #[serde(flatten)]
    pub deal: DealSummary,
    /// `None` when the deal has never been contacted.
    pub days_since_contact: Option<i64>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum RiskReason {
    Overdue,
    NoContact,
    StaleContact,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AtRiskItem {
    #[serde(flatten)]
    pub deal: DealSummary,
    pub reasons: Vec<RiskReason>,
    pub risk_reason: String,
}

pub fn daily_brief(deals: &[Deal], today: NaiveDate, settings: &PipelineSettings) -> DailyBrief {
    let span = info_span!("crm.dailyBrief", deals = deals.len(), as_of = %today);
    let _guard = span.enter();

    let open: Vec<&Deal> = deals.iter().filter(|d| d.is_open()).collect();

    let mut due_today: Vec<&Deal> = open
        .iter()
        .copied()
        .filter(|d| d.next_step_due_date == Some(today))
        .collect();
    due_today.sort_by(|a, b| by_amount_desc(a, b));

    let mut overdue: Vec<&Deal> = open.iter().copied().filter(|d| is_overdue(d, today)).collect();
    overdue.sort_by(|a, b| {
        a.next_step_due_date
            .cmp(&b.next_step_due_date)
            .then_with(|| by_amount_desc(a, b))
    });

    let mut no_contact: Vec<(&Deal, Option<i64>)> = open
        .iter()
        .map(|d| (*d, days_since_contact(d, today)))
        .filter(|(_, days)| days.is_none_or(|days| days >= settings.no_contact_threshold_days))
        .collect();
    // Never contacted first, then longest silence.
    no_contact.sort_by(|(a, a_days), (b, b_days)| {
        a_days
            .is_some()
            .cmp(&b_days.is_some())
            .then_with(|| b_days.cmp(a_days))
            .then_with(|| by_amount_desc(a, b))
    });

    let mut at_risk: Vec<(&Deal, Vec<RiskReason>)> = open
        .iter()
        .copied()
        .filter(|d| d.amount_gbp.is_some_and(|a| a >= settings.high_value_threshold))
        .filter_map(|d| {
            let reasons = risk_reasons(d, today, settings);
            (!reasons.is_empty()).then_some((d, reasons))
        })
        .collect();
    at_risk.sort_by(|(a, _), (b, _)| by_amount_desc(a, b));
    at_risk.truncate(settings.high_value_top_n);

    let high_value_at_risk: Vec<AtRiskItem> = at_risk
        .into_iter()
        .map(|(deal, reasons)| AtRiskItem {
            risk_reason: describe_risk(deal, &reasons, today),
            deal: DealSummary::from(deal),
            reasons,
        })
        .collect();
    let total_at_risk_value = high_value_at_risk
        .iter()
        .filter_map(|item| item.deal.amount_gbp)
        .fold(Decimal::ZERO, Decimal::saturating_add);

    let brief = DailyBrief {
        as_of: today,
        total_action_items: due_today.len() + overdue.len(),
        due_today: due_today.into_iter().map(DealSummary::from).collect(),
        overdue: overdue
            .into_iter()
            .map(|deal| OverdueItem {
                days_overdue: days_overdue(deal, today),
                deal: DealSummary::from(deal),
            })
            .collect(),
        no_contact: no_contact
            .into_iter()
            .map(|(deal, days)| NoContactItem {
                deal: DealSummary::from(deal),
                days_since_contact: days,
            })
            .collect(),
        high_value_at_risk,
        total_at_risk_value,
    };
    debug!(
        due_today = brief.due_today.len(),
        overdue = brief.overdue.len(),
        no_contact = brief.no_contact.len(),
        at_risk = brief.high_value_at_risk.len(),
        "daily brief computed"
    );
    brief
}

fn days_overdue(deal: &Deal, today: NaiveDate) -> i64 {
    deal.next_step_due_date
        .map(|due| (today - due).num_days())
        .unwrap_or(0)
}

fn risk_reasons(deal: &Deal, today: NaiveDate, settings: &PipelineSettings) -> Vec<RiskReason> {
    let mut reasons = Vec::new();
    if is_overdue(deal, today) {
        reasons.push(RiskReason::Overdue);
    }
    match days_since_contact(deal, today) {
        None => reasons.push(RiskReason::NoContact),
        Some(days) if days >= settings.no_contact_threshold_days => {
            reasons.push(RiskReason::NoContact)
        }
        _ => {}
    }
    if days_since_contact(deal, today).is_some_and(|d| d >= settings.stale_contact_warning_days) {
        reasons.push(RiskReason::StaleContact);
    }
    reasons
}

fn describe_risk(deal: &Deal, reasons: &[RiskReason], today: NaiveDate) -> String {
    let contact = days_since_contact(deal, today);
    reasons
        .iter()
        .map(|reason| match (reason, contact) {
            (RiskReason::Overdue, _) => {
                format!("next step overdue by {} days", days_overdue(deal, today))
            }
            (RiskReason::NoContact, None) => "never contacted".to_string(),
            (RiskReason::NoContact, Some(days)) => format!("no contact for {days} days"),
            (RiskReason::StaleContact, _) => "contact is stale".to_string(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}
