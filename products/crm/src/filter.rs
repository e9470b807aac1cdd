//! Multi-criteria deal predicate. Every set criterion must hold; an unset
//! criterion never excludes anything.

use chrono::NaiveDate;
use entity::{Deal, Stage};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DealFilter {
    /// Case-insensitive substring of deal name, account, contact, id or owner.
    pub search: Option<String>,
    /// Empty means any stage.
    pub stages: Vec<Stage>,
    pub owner: Option<String>,
    pub region: Option<String>,
    pub product_line: Option<String>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    pub close_from: Option<NaiveDate>,
    pub close_to: Option<NaiveDate>,
    pub has_overdue_next_step: bool,
    /// Never-contacted deals always match.
    pub no_contact_days: Option<i64>,
    /// Deal must carry every tag listed.
    pub tags: Vec<String>,
    pub promoter_id: Option<String>,
    pub promo_code: Option<String>,
    pub has_promoter: bool,
    /// Won deals with a promoter whose commission is not yet paid.
    pub commission_pending: bool,
}

impl DealFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matches(&self, deal: &Deal, today: NaiveDate) -> bool {
        self.matches_search(deal)
            && (self.stages.is_empty() || self.stages.contains(&deal.stage))
            && same_text(self.owner.as_deref(), deal.owner.as_deref())
            && same_text(self.region.as_deref(), deal.region.as_deref())
            && same_text(self.product_line.as_deref(), deal.product_line.as_deref())
            && in_range(deal.amount_gbp, self.min_amount, self.max_amount)
            && in_range(deal.close_date, self.close_from, self.close_to)
            && (!self.has_overdue_next_step || is_overdue(deal, today))
            && self.matches_contact(deal, today)
            && self.tags.iter().all(|tag| deal.has_tag(tag))
            && same_text(self.promoter_id.as_deref(), deal.promoter_id.as_deref())
            && same_text(self.promo_code.as_deref(), deal.promo_code.as_deref())
            && (!self.has_promoter || has_promoter(deal))
            && (!self.commission_pending || commission_pending(deal))
    }

    /// Matching deals, in input order.
    pub fn apply<'d>(&self, deals: &'d [Deal], today: NaiveDate) -> Vec<&'d Deal> {
        deals.iter().filter(|d| self.matches(d, today)).collect()
    }

    fn matches_search(&self, deal: &Deal) -> bool {
        let Some(term) = self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
            return true;
        };
        let term = term.to_lowercase();
        [
            Some(deal.deal_name.as_str()),
            Some(deal.account_name.as_str()),
            deal.contact_name.as_deref(),
            Some(deal.deal_id.as_str()),
            deal.owner.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&term))
    }

    fn matches_contact(&self, deal: &Deal, today: NaiveDate) -> bool {
        match (self.no_contact_days, days_since_contact(deal, today)) {
            (None, _) => true,
            (Some(_), None) => true,
            (Some(min), Some(days)) => days >= min,
        }
    }
}

/// Free-function form of [`DealFilter::matches`].
pub fn matches(deal: &Deal, filter: &DealFilter, today: NaiveDate) -> bool {
    filter.matches(deal, today)
}

/// Next step due strictly before `today`.
pub fn is_overdue(deal: &Deal, today: NaiveDate) -> bool {
    deal.next_step_due_date.is_some_and(|due| due < today)
}

/// Whole days since the last contact, `None` when never contacted.
pub fn days_since_contact(deal: &Deal, today: NaiveDate) -> Option<i64> {
    deal.last_contacted_date
        .map(|last| (today - last).num_days())
}

pub fn has_promoter(deal: &Deal) -> bool {
    [deal.promoter_id.as_deref(), deal.promo_code.as_deref()]
        .into_iter()
        .flatten()
        .any(|v| !v.trim().is_empty())
}

pub fn commission_pending(deal: &Deal) -> bool {
    has_promoter(deal) && deal.stage == Stage::ClosedWon && !deal.commission_paid
}

fn same_text(wanted: Option<&str>, actual: Option<&str>) -> bool {
    match wanted.map(str::trim).filter(|w| !w.is_empty()) {
        None => true,
        Some(wanted) => actual.is_some_and(|a| a.trim().eq_ignore_ascii_case(wanted)),
    }
}

/// An absent value fails any bound that is set.
fn in_range<T: PartialOrd + Copy>(value: Option<T>, min: Option<T>, max: Option<T>) -> bool {
    if min.is_none() && max.is_none() {
        return true;
    }
    let Some(value) = value else {
        return false;
    };
    min.is_none_or(|min| value >= min) && max.is_none_or(|max| value <= max)
}
