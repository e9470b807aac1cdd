use anyhow::Result;
use entity::{Promoter, PromoterTier, Stage};
use products_crm::DealFilter;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use suite_tests::{days_ago, file_crm, today};

fn fields(value: Value) -> serde_json::Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected an object"),
    }
}

#[test]
fn loose_input_flows_through_every_report() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let crm = file_crm(&dir.path().join("deals.json"))?;

    let big = crm.create_from_fields(
        &fields(json!({
            "dealName": "Estate solar",
            "accountName": "Glen Motors",
            "stage": "negotiation",
            "amountGBP": "£120,000",
            "owner": "Ben",
            "postcode": "m1 1ae",
            "email": "ops@glen.example",
            "lastContactedDate": days_ago(20).to_string(),
            "nextStep": "Chase signature",
            "nextStepDueDate": days_ago(3).to_string(),
            "closeDate": "2025-06-30",
            "promoterId": "P-100",
        })),
        today(),
    )?;
    assert!(big.rejected.is_empty(), "{:?}", big.rejected);
    assert_eq!(big.deal.region.as_deref(), Some("North West"));

    let lead = crm.create_from_fields(
        &fields(json!({
            "dealName": "Garage charger",
            "accountName": "Ivy School",
            "probability": 150,
        })),
        today(),
    )?;
    assert_eq!(lead.rejected.len(), 1);
    assert_eq!(lead.deal.probability, Stage::Lead.default_probability());

    let brief = crm.daily_brief(today())?;
    assert!(
        brief
            .overdue
            .iter()
            .any(|o| o.deal.deal_id == big.deal.deal_id && o.days_overdue == 3)
    );
    assert!(brief.high_value_at_risk.iter().any(|r| r.deal.deal_id == big.deal.deal_id));
    assert!(brief.no_contact.iter().any(|n| n.deal.deal_id == lead.deal.deal_id));

    let hygiene = crm.hygiene_report(today())?;
    assert_eq!(hygiene.total_deals, 2);
    assert!(hygiene.issues.iter().any(|i| i.deal_id == lead.deal.deal_id));
    assert!(hygiene.health_score < 100.0);

    let forecast = crm.forecast_snapshot(today())?;
    let stats = crm.stats()?;
    assert_eq!(forecast.total_pipeline, Decimal::from(120_000));
    assert_eq!(forecast.weighted_pipeline, stats.weighted_pipeline);
    assert_eq!(forecast.by_close_month[0].month, "2025-06");

    let promoter = Promoter::new("P-100", PromoterTier::Bronze);
    let dashboard = crm.promoter_dashboard(&promoter, today())?;
    assert_eq!(dashboard.summary.total_referrals, 1);
    assert_eq!(dashboard.summary.active_deals, 1);
    Ok(())
}

#[test]
fn stage_patch_rederives_probability_and_filters_follow() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let crm = file_crm(&dir.path().join("deals.json"))?;
    let created = crm.create_from_fields(
        &fields(json!({"dealName": "Battery", "accountName": "Harbour Inn", "amountGBP": 10000})),
        today(),
    )?;
    let id = created.deal.deal_id;

    let patched = crm
        .update_deal(&id, &fields(json!({"stage": "Proposal"})), today())?
        .expect("known id");
    assert_eq!(patched.deal.probability, Stage::Proposal.default_probability());
    assert!(patched.side_effects.iter().any(|c| c.field == "probability"));

    let proposals = DealFilter {
        stages: vec![Stage::Proposal],
        ..DealFilter::default()
    };
    assert_eq!(crm.list_deals(&proposals, today())?.len(), 1);
    let leads = DealFilter {
        stages: vec![Stage::Lead],
        ..DealFilter::default()
    };
    assert!(crm.list_deals(&leads, today())?.is_empty());

    assert!(crm.update_deal("missing", &fields(json!({"owner": "x"})), today())?.is_none());
    Ok(())
}

#[test]
fn normalize_all_is_idempotent_on_stored_deals() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let crm = file_crm(&dir.path().join("deals.json"))?;
    crm.create_from_fields(
        &fields(json!({
            "dealName": "Boiler",
            "accountName": "Dale Haulage",
            "postcode": "EH1 1YZ"
        })),
        today(),
    )?;
    assert!(crm.normalize_all(today())?.is_empty());
    Ok(())
}
