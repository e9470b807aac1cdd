use chrono::NaiveDate;
use entity::{Deal, Stage};
use products_crm::reports::{IssueType, Severity};
use products_crm::{
    LookupTables, Normalizer, PatchValue, PipelineSettings, apply_patch, daily_brief,
    forecast_snapshot, hygiene_report,
};
use rust_decimal::Decimal;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
}

fn three_deals() -> Vec<Deal> {
    let mut a = Deal::new("Office roof", "Acme");
    a.deal_id = "A".into();
    a.stage = Stage::Proposal;
    a.amount_gbp = Some(Decimal::from(50_000));
    a.probability = 60;

    let mut b = Deal::new("Garage charger", "Beta");
    b.deal_id = "B".into();
    b.stage = Stage::Lead;
    b.probability = 10;

    let mut c = Deal::new("Farm battery", "Gamma");
    c.deal_id = "C".into();
    c.stage = Stage::ClosedWon;
    c.amount_gbp = Some(Decimal::from(10_000));
    c.probability = 100;

    vec![a, b, c]
}

#[test]
fn three_deal_hygiene_and_forecast() {
    let deals = three_deals();
    let lookup = LookupTables::uk_defaults();
    let settings = PipelineSettings::default();

    let hygiene = hygiene_report(&deals, today(), &settings, &lookup);
    let close = hygiene
        .issues
        .iter()
        .find(|i| i.deal_id == "A" && i.issue == IssueType::MissingCloseDate)
        .expect("deal A flagged for close date");
    assert_eq!(close.severity, Severity::High);
    let amount = hygiene
        .issues
        .iter()
        .find(|i| i.deal_id == "B" && i.issue == IssueType::MissingAmount)
        .expect("deal B flagged for amount");
    assert_eq!(amount.severity, Severity::Medium);

    let forecast = forecast_snapshot(&deals, today());
    assert_eq!(forecast.total_pipeline, Decimal::from(50_000));
    assert_eq!(forecast.weighted_pipeline, Decimal::from(30_000));
}

#[test]
fn weighted_amount_is_consistent_across_reports() {
    let deals = three_deals();
    let forecast = forecast_snapshot(&deals, today());
    let proposal = forecast
        .by_stage
        .iter()
        .find(|s| s.stage == Stage::Proposal)
        .unwrap();
    assert_eq!(proposal.weighted, deals[0].weighted_amount_gbp().unwrap());
    assert_eq!(deals[1].weighted_amount_gbp(), None);

    let json = serde_json::to_value(deals[0].view()).unwrap();
    let weighted: Decimal = json["weightedAmountGBP"].as_str().unwrap().parse().unwrap();
    assert_eq!(weighted, Decimal::from(30_000));
}

#[test]
fn never_contacted_qualified_deal_is_always_flagged() {
    let mut deal = Deal::new("Retrofit", "Delta");
    deal.deal_id = "Q".into();
    deal.stage = Stage::Qualified;
    for threshold in [1, 30, 365] {
        let settings = PipelineSettings {
            no_contact_threshold_days: threshold,
            ..PipelineSettings::default()
        };
        let brief = daily_brief(std::slice::from_ref(&deal), today(), &settings);
        assert!(
            brief.no_contact.iter().any(|n| n.deal.deal_id == "Q"),
            "threshold {threshold}"
        );
    }
}

#[test]
fn patch_batch_validates_each_field() {
    let lookup = LookupTables::uk_defaults();
    let normalizer = Normalizer::new(&lookup);
    let base = normalizer.normalize(&three_deals()[1], today()).deal;

    let out = apply_patch(
        &normalizer,
        &base,
        vec![
            ("probability".to_string(), PatchValue::from("150")),
            ("dealId".to_string(), PatchValue::from("X")),
            ("amountGBP".to_string(), PatchValue::from("£12,500")),
        ],
        today(),
    );
    assert_eq!(out.deal.amount_gbp, Some(Decimal::from(12_500)));
    assert_eq!(out.deal.deal_id, "B");
    let rejected: Vec<&str> = out.rejected.iter().map(|r| r.field.as_str()).collect();
    assert_eq!(rejected, vec!["probability", "dealId"]);
    assert!(out.rejected[0].reason.contains("0 and 100"));
    assert_eq!(out.applied.len(), 1);
}

#[test]
fn health_score_falls_as_more_deals_have_issues() {
    let lookup = LookupTables::uk_defaults();
    let settings = PipelineSettings::default();
    assert_eq!(hygiene_report(&[], today(), &settings, &lookup).health_score, 100.0);

    let mut clean = Deal::new("Clean", "Acme");
    clean.stage = Stage::Lead;
    clean.probability = 10;
    clean.amount_gbp = Some(Decimal::from(100));
    clean.postcode = Some("LS1 4AP".into());
    clean.phone = Some("0113 000 0000".into());
    clean.owner = Some("Sam".into());
    clean.next_step = Some("Call back".into());

    let clean_batch: Vec<Deal> = (0..4)
        .map(|i| {
            let mut d = clean.clone();
            d.deal_id = format!("D-{i}");
            d
        })
        .collect();
    let mut previous = hygiene_report(&clean_batch, today(), &settings, &lookup).health_score;
    assert_eq!(previous, 100.0);

    for flagged in 1..=4 {
        let mut batch = clean_batch.clone();
        for deal in batch.iter_mut().take(flagged) {
            deal.owner = None;
        }
        let score = hygiene_report(&batch, today(), &settings, &lookup).health_score;
        assert!(score < previous, "{score} !< {previous}");
        previous = score;
    }
    assert_eq!(previous, 0.0);
}
