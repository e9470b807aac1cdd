use anyhow::Result;
use entity::Stage;
use platform_db::DealStore;
use serde_json::json;
use suite_tests::{deal, file_crm, today};

#[test]
fn created_deals_survive_reopen_with_derived_fields() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("deals.json");

    let id = {
        let crm = file_crm(&path)?;
        let mut raw = deal("Roof array", "Acme Farms", Stage::Proposal, Some(40_000));
        raw.postcode = Some("ls1 4ap".into());
        crm.create_deal(raw, today())?.deal.deal_id
    };

    let crm = file_crm(&path)?;
    let stored = crm
        .get_deal(&id.to_ascii_lowercase())?
        .expect("lookup ignores case");
    assert_eq!(stored.postcode_area.as_deref(), Some("LS"));
    assert_eq!(stored.region.as_deref(), Some("Yorkshire and the Humber"));
    assert_eq!(stored.probability, Stage::Proposal.default_probability());
    assert_eq!(stored.created_date, Some(today()));
    assert!(stored.map_link.is_some());
    Ok(())
}

#[test]
fn updates_and_deletes_are_persisted() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("deals.json");
    let crm = file_crm(&path)?;
    let id = crm
        .create_deal(deal("Heat pump", "Brook Dental", Stage::Lead, None), today())?
        .deal
        .deal_id;
    let keep = crm
        .create_deal(deal("Charger", "Cedar Lodge", Stage::Qualified, Some(3_000)), today())?
        .deal
        .deal_id;

    let fields = json!({"amountGBP": "£8,250", "owner": "Ana"});
    let outcome = crm
        .update_deal(&id, fields.as_object().expect("object"), today())?
        .expect("known id");
    assert!(outcome.rejected.is_empty());
    assert!(path.with_file_name("deals.json.bak").exists());

    let reopened = file_crm(&path)?;
    let stored = reopened.get_deal(&id)?.expect("still there");
    assert_eq!(stored.owner.as_deref(), Some("Ana"));
    assert_eq!(stored.amount_gbp, Some(rust_decimal::Decimal::from(8_250)));

    assert!(reopened.delete_deal(&id)?);
    assert!(!reopened.delete_deal(&id)?);
    let after_delete = file_crm(&path)?;
    assert!(after_delete.get_deal(&id)?.is_none());
    assert!(after_delete.get_deal(&keep)?.is_some());
    Ok(())
}

#[test]
fn backup_and_restore_round_trip() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let crm = file_crm(&dir.path().join("deals.json"))?;
    crm.create_deal(deal("One", "Acme", Stage::Lead, Some(100)), today())?;
    crm.create_deal(deal("Two", "Acme", Stage::Lead, Some(200)), today())?;

    let snapshot = dir.path().join("snapshot.json");
    assert_eq!(crm.store().backup_to(&snapshot)?, 2);

    crm.create_deal(deal("Three", "Acme", Stage::Lead, Some(300)), today())?;
    assert_eq!(crm.store().all()?.len(), 3);

    assert_eq!(crm.store().restore_from(&snapshot)?, 2);
    assert_eq!(crm.stats()?.total_deals, 2);
    Ok(())
}

#[test]
fn duplicate_ids_are_refused() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let crm = file_crm(&dir.path().join("deals.json"))?;
    let mut first = deal("One", "Acme", Stage::Lead, None);
    first.deal_id = "D-1".into();
    crm.create_deal(first.clone(), today())?;

    first.deal_id = "d-1".into();
    assert!(crm.create_deal(first, today()).is_err());
    assert_eq!(crm.store().all()?.len(), 1);
    Ok(())
}

#[test]
fn failed_create_can_be_retried_once_the_disk_is_back() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let data_dir = dir.path().join("data");
    std::fs::create_dir(&data_dir)?;
    let crm = file_crm(&data_dir.join("deals.json"))?;
    std::fs::remove_dir_all(&data_dir)?;

    let mut raw = deal("Battery", "Dale Haulage", Stage::Lead, Some(7_500));
    raw.deal_id = "D-RETRY".into();
    assert!(crm.create_deal(raw.clone(), today()).is_err());
    assert!(crm.get_deal("D-RETRY")?.is_none());

    std::fs::create_dir(&data_dir)?;
    let created = crm.create_deal(raw, today())?;
    assert_eq!(created.deal.deal_id, "D-RETRY");
    assert!(file_crm(&data_dir.join("deals.json"))?.get_deal("d-retry")?.is_some());
    Ok(())
}
