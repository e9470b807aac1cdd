use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use entity::{Deal, Stage};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info_span};

use super::{accumulate, is_blank, percentage};

const UNASSIGNED: &str = "Unassigned";
const UNKNOWN: &str = "Unknown";

/// Pipeline value rollups. Totals cover open deals only; missing amounts
/// count as zero.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastSnapshot {
    pub as_of: NaiveDate,
    pub open_deals: usize,
    pub total_pipeline: Decimal,
    pub weighted_pipeline: Decimal,
    pub by_stage: Vec<StageForecast>,
    pub by_owner: Vec<OwnerForecast>,
    pub by_close_month: Vec<CloseMonthTotals>,
    pub by_region: Vec<GroupTotals>,
    pub by_product: Vec<GroupTotals>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageForecast {
    pub stage: Stage,
    pub label: &'static str,
    pub count: usize,
    pub total: Decimal,
    pub weighted: Decimal,
    /// Share of `totalPipeline`; always 0 for closed stages.
    pub percentage_of_pipeline: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerForecast {
    pub owner: String,
    pub open_deals: usize,
    pub pipeline: Decimal,
    pub weighted_pipeline: Decimal,
    pub closed_won: usize,
    pub closed_lost: usize,
    /// `won / (won + lost)` as a percentage, 0 with no closed deals.
    pub win_rate: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseMonthTotals {
    /// `YYYY-MM`
    pub month: String,
    pub count: usize,
    pub total: Decimal,
    pub weighted: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupTotals {
    pub name: String,
    pub count: usize,
    pub total: Decimal,
    pub weighted: Decimal,
}

#[derive(Default)]
struct Bucket {
    count: usize,
    total: Decimal,
    weighted: Decimal,
}

impl Bucket {
    fn add(&mut self, deal: &Deal) {
        self.count += 1;
        accumulate(&mut self.total, deal.amount_or_zero());
        accumulate(&mut self.weighted, deal.weighted_or_zero());
    }
}

#[derive(Default)]
struct OwnerBucket {
    open: Bucket,
    won: usize,
    lost: usize,
}

pub fn forecast_snapshot(deals: &[Deal], today: NaiveDate) -> ForecastSnapshot {
    let span = info_span!("crm.forecastSnapshot", deals = deals.len(), as_of = %today);
    let _guard = span.enter();

    let mut pipeline = Bucket::default();
    let mut stages: BTreeMap<Stage, Bucket> = BTreeMap::new();
    let mut owners: BTreeMap<String, OwnerBucket> = BTreeMap::new();
    let mut months: BTreeMap<(i32, u32), Bucket> = BTreeMap::new();
    let mut regions: BTreeMap<String, Bucket> = BTreeMap::new();
    let mut products: BTreeMap<String, Bucket> = BTreeMap::new();

    for deal in deals {
        stages.entry(deal.stage).or_default().add(deal);
        let owner = owners.entry(group_name(deal.owner.as_deref(), UNASSIGNED)).or_default();
        match deal.stage {
            Stage::ClosedWon => owner.won += 1,
            Stage::ClosedLost => owner.lost += 1,
            _ => {}
        }
        if !deal.is_open() {
            continue;
        }
        owner.open.add(deal);
        pipeline.add(deal);
        if let Some(close) = deal.close_date {
            months.entry((close.year(), close.month())).or_default().add(deal);
        }
        regions
            .entry(group_name(deal.region.as_deref(), UNKNOWN))
            .or_default()
            .add(deal);
        products
            .entry(group_name(deal.product_line.as_deref(), UNKNOWN))
            .or_default()
            .add(deal);
    }

    let total_pipeline = pipeline.total;
    let by_stage = Stage::ALL
        .iter()
        .filter_map(|stage| {
            let bucket = stages.get(stage)?;
            Some(StageForecast {
                stage: *stage,
                label: stage.label(),
                count: bucket.count,
                total: bucket.total,
                weighted: bucket.weighted,
                percentage_of_pipeline: if stage.is_open() {
                    percentage(bucket.total, total_pipeline)
                } else {
                    0.0
                },
            })
        })
        .collect();

    let mut by_owner: Vec<OwnerForecast> = owners
        .into_iter()
        .map(|(owner, bucket)| OwnerForecast {
            owner,
            open_deals: bucket.open.count,
            pipeline: bucket.open.total,
            weighted_pipeline: bucket.open.weighted,
            closed_won: bucket.won,
            closed_lost: bucket.lost,
            win_rate: percentage(
                Decimal::from(bucket.won),
                Decimal::from(bucket.won + bucket.lost),
            ),
        })
        .collect();
    by_owner.sort_by(|a, b| b.pipeline.cmp(&a.pipeline).then_with(|| a.owner.cmp(&b.owner)));

    let by_close_month = months
        .into_iter()
        .map(|((year, month), bucket)| CloseMonthTotals {
            month: format!("{year:04}-{month:02}"),
            count: bucket.count,
            total: bucket.total,
            weighted: bucket.weighted,
        })
        .collect();

    let snapshot = ForecastSnapshot {
        as_of: today,
        open_deals: pipeline.count,
        total_pipeline,
        weighted_pipeline: pipeline.weighted,
        by_stage,
        by_owner,
        by_close_month,
        by_region: ranked(regions),
        by_product: ranked(products),
    };
    debug!(
        open_deals = snapshot.open_deals,
        total_pipeline = %snapshot.total_pipeline,
        "forecast snapshot computed"
    );
    snapshot
}

fn group_name(value: Option<&str>, fallback: &str) -> String {
    if is_blank(value) {
        fallback.to_string()
    } else {
        value.unwrap_or(fallback).trim().to_string()
    }
}

/// Largest total first, then most deals, then name.
fn ranked(groups: BTreeMap<String, Bucket>) -> Vec<GroupTotals> {
    let mut rows: Vec<GroupTotals> = groups
        .into_iter()
        .map(|(name, bucket)| GroupTotals {
            name,
            count: bucket.count,
            total: bucket.total,
            weighted: bucket.weighted,
        })
        .collect();
    rows.sort_by(|a, b| {
        b.total
            .cmp(&a.total)
            .then_with(|| b.count.cmp(&a.count))
            .then_with(|| a.name.cmp(&b.name))
    });
    rows
}
