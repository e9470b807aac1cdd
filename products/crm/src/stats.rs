use std::collections::BTreeSet;

use entity::{Deal, Stage};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::reports::{accumulate, is_blank};

/// Headline counts for the whole collection.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStats {
    pub total_deals: usize,
    pub open_deals: usize,
    pub closed_won: usize,
    pub closed_lost: usize,
    pub total_pipeline: Decimal,
    pub weighted_pipeline: Decimal,
    pub closed_won_value: Decimal,
    /// `totalPipeline / openDeals`, 0 with no open deals.
    pub average_deal_value: Decimal,
    pub owners: Vec<String>,
    pub regions: Vec<String>,
}

/// Single pass over `deals`.
pub fn stats(deals: &[Deal]) -> PipelineStats {
    let mut out = PipelineStats {
        total_deals: deals.len(),
        ..PipelineStats::default()
    };
    let mut owners = BTreeSet::new();
    let mut regions = BTreeSet::new();

    for deal in deals {
        match deal.stage {
            Stage::ClosedWon => {
                out.closed_won += 1;
                accumulate(&mut out.closed_won_value, deal.amount_or_zero());
            }
            Stage::ClosedLost => out.closed_lost += 1,
            _ => {
                out.open_deals += 1;
                accumulate(&mut out.total_pipeline, deal.amount_or_zero());
                accumulate(&mut out.weighted_pipeline, deal.weighted_or_zero());
            }
        }
        if !is_blank(deal.owner.as_deref()) {
            owners.extend(deal.owner.as_deref().map(|o| o.trim().to_string()));
        }
        if !is_blank(deal.region.as_deref()) {
            regions.extend(deal.region.as_deref().map(|r| r.trim().to_string()));
        }
    }

    if out.open_deals > 0 {
        out.average_deal_value =
            (out.total_pipeline / Decimal::from(out.open_deals as u64)).round_dp(2);
    }
    out.owners = owners.into_iter().collect();
    out.regions = regions.into_iter().collect();
    out
}
