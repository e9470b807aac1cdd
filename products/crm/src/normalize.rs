//! Fills in identity, derived location fields, default probability and
//! timestamps on a raw deal, and reports every field it touched.

use chrono::NaiveDate;
use entity::Deal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::lookup::{LookupTables, extract_postcode_area};

const MAP_SEARCH_URL: &str = "https://www.google.com/maps/search/?api=1&query=";

/// One altered field: wire name plus old and new JSON values.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    pub field: String,
    pub old_value: Value,
    pub new_value: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Normalized {
    pub deal: Deal,
    pub changes: Vec<FieldChange>,
}

impl Normalized {
    pub fn changed(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// Source of fresh deal identifiers.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self, today: NaiveDate) -> String;
}

/// `D-<yyyymmdd>-<12 hex>` identifiers backed by random UUIDs.
#[derive(Clone, Copy, Debug, Default)]
pub struct DatedIdGenerator;

impl IdGenerator for DatedIdGenerator {
    fn next_id(&self, today: NaiveDate) -> String {
        let suffix = Uuid::new_v4().simple().to_string().to_ascii_uppercase();
        format!("D-{}-{}", today.format("%Y%m%d"), &suffix[..12])
    }
}

static DEFAULT_IDS: DatedIdGenerator = DatedIdGenerator;

pub struct Normalizer<'a> {
    lookup: &'a LookupTables,
    ids: &'a dyn IdGenerator,
}

impl<'a> Normalizer<'a> {
    pub fn new(lookup: &'a LookupTables) -> Self {
        Self {
            lookup,
            ids: &DEFAULT_IDS,
        }
    }

    pub fn with_id_generator(mut self, ids: &'a dyn IdGenerator) -> Self {
        self.ids = ids;
        self
    }

    pub fn lookup(&self) -> &LookupTables {
        self.lookup
    }

    /// Pure function of `raw` and `today`: returns a new record and the list
    /// of changes. Running it on its own output yields no changes.
    pub fn normalize(&self, raw: &Deal, today: NaiveDate) -> Normalized {
        let mut deal = raw.clone();

        if deal.deal_id.trim().is_empty() {
            deal.deal_id = self.ids.next_id(today);
        }

        let postcode = deal
            .postcode
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        if let Some(postcode) = &postcode {
            let area = extract_postcode_area(postcode);
            deal.postcode_area = (!area.is_empty()).then_some(area);
        }

        if is_blank(deal.region.as_deref()) {
            if let Some(region) = deal
                .postcode_area
                .as_deref()
                .and_then(|area| self.lookup.region_for_area(area))
            {
                deal.region = Some(region.to_string());
            }
        }

        if let Some(postcode) = &postcode {
            deal.map_link = Some(map_link(postcode));
        }

        if deal.probability == 0 {
            deal.probability = self.lookup.probability_for_stage(deal.stage);
        }

        if deal.created_date.is_none() {
            deal.created_date = Some(today);
        }

        deal.tags = normalize_tags(&deal.tags);

        let changes = diff_deals(raw, &deal);
        Normalized { deal, changes }
    }
}

/// Map-search URL for a postcode.
pub fn map_link(postcode: &str) -> String {
    let query: String = url::form_urlencoded::byte_serialize(postcode.trim().as_bytes()).collect();
    format!("{MAP_SEARCH_URL}{query}")
}

/// Trim, drop empties, dedupe case-insensitively keeping first-seen order.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let trimmed = tag.trim();
        if trimmed.is_empty() || out.iter().any(|t| t.eq_ignore_ascii_case(trimmed)) {
            continue;
        }
        out.push(trimmed.to_string());
    }
    out
}

/// Field-by-field comparison of two deals using their wire names.
pub fn diff_deals(before: &Deal, after: &Deal) -> Vec<FieldChange> {
    let (Ok(Value::Object(old)), Ok(Value::Object(new))) =
        (serde_json::to_value(before), serde_json::to_value(after))
    else {
        return Vec::new();
    };
    new.into_iter()
        .filter_map(|(field, new_value)| {
            let old_value = old.get(&field).cloned().unwrap_or(Value::Null);
            (old_value != new_value).then_some(FieldChange {
                field,
                old_value,
                new_value,
            })
        })
        .collect()
}

fn is_blank(value: Option<&str>) -> bool {
    value.map(|v| v.trim().is_empty()).unwrap_or(true)
}
