//! Synthetic demo deals.

use chrono::{Duration, NaiveDate};
use entity::{Deal, Stage};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

const ACCOUNTS: &[&str] = &[
    "Acme Farms",
    "Brook Dental",
    "Cedar Lodge",
    "Dale Haulage",
    "Elm Court Surgery",
    "Fenwick Bakery",
    "Glen Motors",
    "Harbour Inn",
    "Ivy School",
    "Juniper Homes",
];
const CONTACTS: &[&str] = &[
    "Alex Reid",
    "Sam Patel",
    "Jo Evans",
    "Chris Lowe",
    "Priya Shah",
    "Tom Hughes",
];
const OWNERS: &[&str] = &["Ana", "Ben", "Cara", "Dev"];
const POSTCODES: &[&str] = &[
    "SW1A 1AA", "M1 1AE", "LS1 4AP", "EH1 1YZ", "CF10 1EP", "BS1 4DJ", "B1 1BB", "NE1 7RU",
    "BT1 5GS", "NR1 3QU", "OX1 2JD", "G1 1XQ",
];
const PRODUCTS: &[&str] = &[
    "Solar PV",
    "Battery Storage",
    "Heat Pump",
    "EV Charger",
    "Service Contract",
];
const SOURCES: &[&str] = &["Website", "Referral", "Promoter", "Trade Show", "Cold Call"];
const STEPS: &[&str] = &["Call back", "Send quote", "Site survey", "Chase signature"];
const PROMOTERS: &[(&str, &str)] = &[("P-100", "SUNNY10"), ("P-200", "GREEN5")];

/// `count` plausible deals around `today`. The same seed gives the same deals.
pub fn generate(count: usize, seed: u64, today: NaiveDate) -> Vec<Deal> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count).map(|i| one(&mut rng, i, today)).collect()
}

fn pick<'a>(rng: &mut StdRng, items: &[&'a str]) -> &'a str {
    items.choose(rng).copied().unwrap_or_default()
}

fn days(rng: &mut StdRng, from: i64, to: i64) -> Duration {
    Duration::days(rng.gen_range(from..=to))
}

fn one(rng: &mut StdRng, index: usize, today: NaiveDate) -> Deal {
    let account = pick(rng, ACCOUNTS);
    let product = pick(rng, PRODUCTS);
    let mut deal = Deal::new(format!("{product} for {account}"), account);
    deal.deal_id = format!("D-{}-{:04}", today.format("%Y%m%d"), index + 1);
    deal.stage = *Stage::ALL.choose(rng).unwrap_or(&Stage::Lead);
    deal.contact_name = Some(pick(rng, CONTACTS).to_string());
    if rng.gen_bool(0.8) {
        let slug = deal
            .contact_name
            .iter()
            .flat_map(|c| c.split_whitespace())
            .collect::<Vec<_>>()
            .join(".");
        deal.email = Some(format!("{}@example.co.uk", slug.to_lowercase()));
    }
    if rng.gen_bool(0.5) {
        deal.phone = Some(format!("07700 9{:05}", rng.gen_range(0..100_000)));
    }
    if rng.gen_bool(0.9) {
        deal.postcode = Some(pick(rng, POSTCODES).to_string());
    }
    if rng.gen_bool(0.9) {
        deal.owner = Some(pick(rng, OWNERS).to_string());
    }
    deal.product_line = Some(product.to_string());
    deal.lead_source = Some(pick(rng, SOURCES).to_string());
    if rng.gen_bool(0.85) {
        deal.amount_gbp = Some(Decimal::from(rng.gen_range(20..=1_200) * 100));
    }
    deal.created_date = Some(today - days(rng, 5, 180));
    if rng.gen_bool(0.85) {
        deal.last_contacted_date = Some(today - days(rng, 0, 40));
    }
    if rng.gen_bool(0.8) {
        deal.next_step = Some(pick(rng, STEPS).to_string());
        deal.next_step_due_date = Some(today + days(rng, -10, 14));
    }
    if rng.gen_bool(0.7) {
        deal.close_date = Some(today + days(rng, -60, 120));
    }
    if deal.lead_source.as_deref() == Some("Promoter") || rng.gen_bool(0.15) {
        let (id, code) = PROMOTERS.choose(rng).copied().unwrap_or(PROMOTERS[0]);
        deal.promoter_id = Some(id.to_string());
        deal.promo_code = Some(code.to_string());
        if deal.stage == Stage::ClosedWon {
            deal.commission_paid = rng.gen_bool(0.5);
        }
    }
    deal
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    #[test]
    fn same_seed_same_deals() {
        assert_eq!(generate(20, 7, today()), generate(20, 7, today()));
        assert_ne!(generate(20, 7, today()), generate(20, 8, today()));
    }

    #[test]
    fn deals_have_unique_ids_and_names() {
        let deals = generate(50, 1, today());
        let mut ids: Vec<&str> = deals.iter().map(|d| d.deal_id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 50);
        assert!(deals.iter().all(|d| !d.account_name.is_empty() && !d.deal_name.is_empty()));
        assert!(deals.iter().all(|d| d.amount_gbp.is_none_or(|a| a >= Decimal::ZERO)));
    }
}
