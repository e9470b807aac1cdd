//! Field-level patch validation.
//!
//! Each patchable field has an entry in [`PATCHABLE`] pairing its wire name
//! with a parser/setter. Fields are validated independently: a bad value is
//! rejected with a reason and the rest of the batch still applies.

use chrono::NaiveDate;
use entity::{Deal, MAX_AMOUNT_GBP, Stage};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::normalize::{FieldChange, Normalizer, diff_deals};
use crate::parse::{parse_amount, parse_date, parse_percent};

/// Loosely typed incoming value.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PatchValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<PatchValue>),
}

impl PatchValue {
    fn kind(&self) -> &'static str {
        match self {
            PatchValue::Null => "null",
            PatchValue::Bool(_) => "boolean",
            PatchValue::Integer(_) | PatchValue::Float(_) => "number",
            PatchValue::Text(_) => "text",
            PatchValue::List(_) => "list",
        }
    }
}

impl From<&str> for PatchValue {
    fn from(value: &str) -> Self {
        PatchValue::Text(value.to_string())
    }
}

impl TryFrom<Value> for PatchValue {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Ok(match value {
            Value::Null => PatchValue::Null,
            Value::Bool(b) => PatchValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => PatchValue::Integer(i),
                None => PatchValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => PatchValue::Text(s),
            Value::Array(items) => PatchValue::List(
                items
                    .into_iter()
                    .map(PatchValue::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(_) => return Err("nested objects are not supported".to_string()),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct RejectedField {
    pub field: String,
    pub reason: String,
}

impl RejectedField {
    fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Result of a patch batch: the normalized record plus three buckets.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchOutcome {
    pub deal: Deal,
    pub applied: Vec<FieldChange>,
    pub rejected: Vec<RejectedField>,
    pub side_effects: Vec<FieldChange>,
}

type Setter = fn(&mut Deal, &PatchValue) -> Result<(), String>;

struct FieldSpec {
    name: &'static str,
    set: Setter,
}

/// Identity and derived fields: never patchable.
pub const NON_PATCHABLE: &[&str] = &[
    "dealId",
    "postcodeArea",
    "region",
    "mapLink",
    "weightedAmountGBP",
];

const PATCHABLE: &[FieldSpec] = &[
    FieldSpec {
        name: "orderNo",
        set: |d, v| set(&mut d.order_no, optional_text(v)),
    },
    FieldSpec {
        name: "userId",
        set: |d, v| set(&mut d.user_id, optional_text(v)),
    },
    FieldSpec {
        name: "accountName",
        set: |d, v| set(&mut d.account_name, required_text(v)),
    },
    FieldSpec {
        name: "contactName",
        set: |d, v| set(&mut d.contact_name, optional_text(v)),
    },
    FieldSpec {
        name: "email",
        set: |d, v| set(&mut d.email, email(v)),
    },
    FieldSpec {
        name: "phone",
        set: |d, v| set(&mut d.phone, optional_text(v)),
    },
    FieldSpec {
        name: "postcode",
        set: set_postcode,
    },
    FieldSpec {
        name: "installationLocation",
        set: |d, v| set(&mut d.installation_location, optional_text(v)),
    },
    FieldSpec {
        name: "leadSource",
        set: |d, v| set(&mut d.lead_source, optional_text(v)),
    },
    FieldSpec {
        name: "productLine",
        set: |d, v| set(&mut d.product_line, optional_text(v)),
    },
    FieldSpec {
        name: "dealName",
        set: |d, v| set(&mut d.deal_name, required_text(v)),
    },
    FieldSpec {
        name: "stage",
        set: |d, v| set(&mut d.stage, stage(v)),
    },
    FieldSpec {
        name: "probability",
        set: |d, v| set(&mut d.probability, probability(v)),
    },
    FieldSpec {
        name: "amountGBP",
        set: |d, v| set(&mut d.amount_gbp, amount(v)),
    },
    FieldSpec {
        name: "owner",
        set: |d, v| set(&mut d.owner, optional_text(v)),
    },
    FieldSpec {
        name: "createdDate",
        set: |d, v| set(&mut d.created_date, date(v)),
    },
    FieldSpec {
        name: "lastContactedDate",
        set: |d, v| set(&mut d.last_contacted_date, date(v)),
    },
    FieldSpec {
        name: "nextStep",
        set: |d, v| set(&mut d.next_step, optional_text(v)),
    },
    FieldSpec {
        name: "nextStepDueDate",
        set: |d, v| set(&mut d.next_step_due_date, date(v)),
    },
    FieldSpec {
        name: "closeDate",
        set: |d, v| set(&mut d.close_date, date(v)),
    },
    FieldSpec {
        name: "servicePlan",
        set: |d, v| set(&mut d.service_plan, optional_text(v)),
    },
    FieldSpec {
        name: "lastServiceDate",
        set: |d, v| set(&mut d.last_service_date, date(v)),
    },
    FieldSpec {
        name: "nextServiceDueDate",
        set: |d, v| set(&mut d.next_service_due_date, date(v)),
    },
    FieldSpec {
        name: "comments",
        set: |d, v| set(&mut d.comments, optional_text(v)),
    },
    FieldSpec {
        name: "tags",
        set: |d, v| set(&mut d.tags, tags(v)),
    },
    FieldSpec {
        name: "promoterId",
        set: |d, v| set(&mut d.promoter_id, optional_text(v)),
    },
    FieldSpec {
        name: "promoCode",
        set: |d, v| set(&mut d.promo_code, optional_text(v)),
    },
    FieldSpec {
        name: "promoterCommission",
        set: |d, v| set(&mut d.promoter_commission, amount(v)),
    },
    FieldSpec {
        name: "commissionPaid",
        set: |d, v| set(&mut d.commission_paid, boolean(v)),
    },
    FieldSpec {
        name: "commissionPaidDate",
        set: |d, v| set(&mut d.commission_paid_date, date(v)),
    },
];

enum Resolved {
    Field(&'static FieldSpec),
    Locked(&'static str),
    Unknown,
}

/// Match `amountGBP`, `AmountGbp` and `amount_gbp` alike.
fn field_key(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn resolve(name: &str) -> Resolved {
    let key = field_key(name);
    if let Some(locked) = NON_PATCHABLE.iter().find(|n| field_key(n) == key) {
        return Resolved::Locked(locked);
    }
    match PATCHABLE.iter().find(|entry| field_key(entry.name) == key) {
        Some(entry) => Resolved::Field(entry),
        None => Resolved::Unknown,
    }
}

/// Wire names of every patchable field.
pub fn patchable_fields() -> impl Iterator<Item = &'static str> {
    PATCHABLE.iter().map(|entry| entry.name)
}

/// Validate one field/value pair, returning the typed value as JSON.
pub fn validate_field(field: &str, value: &PatchValue) -> Result<Value, String> {
    match resolve(field) {
        Resolved::Locked(name) => Err(locked_reason(name)),
        Resolved::Unknown => Err(unknown_reason(field)),
        Resolved::Field(entry) => {
            let mut scratch = Deal::default();
            (entry.set)(&mut scratch, value)?;
            Ok(field_value(&scratch, entry.name))
        }
    }
}

/// Apply a batch of field updates to `deal`, then re-run normalization.
///
/// `today` is the normalizer's reference date.
pub fn apply_patch<I>(
    normalizer: &Normalizer<'_>,
    deal: &Deal,
    fields: I,
    today: NaiveDate,
) -> PatchOutcome
where
    I: IntoIterator<Item = (String, PatchValue)>,
{
    let mut working = deal.clone();
    let mut applied: Vec<&'static str> = Vec::new();
    let mut rejected = Vec::new();

    for (name, value) in fields {
        match resolve(&name) {
            Resolved::Locked(locked) => {
                rejected.push(RejectedField::new(name, locked_reason(locked)));
            }
            Resolved::Unknown => {
                let reason = unknown_reason(&name);
                rejected.push(RejectedField::new(name, reason));
            }
            Resolved::Field(entry) => match (entry.set)(&mut working, &value) {
                Ok(()) => {
                    if !applied.contains(&entry.name) {
                        applied.push(entry.name);
                    }
                }
                Err(reason) => rejected.push(RejectedField::new(entry.name, reason)),
            },
        }
    }

    let lookup = normalizer.lookup();
    if applied.contains(&"stage")
        && !applied.contains(&"probability")
        && working.stage != deal.stage
        && deal.probability == lookup.probability_for_stage(deal.stage)
    {
        working.probability = 0;
    }

    let normalized = normalizer.normalize(&working, today).deal;
    let applied_changes = applied
        .iter()
        .map(|name| FieldChange {
            field: (*name).to_string(),
            old_value: field_value(deal, name),
            new_value: field_value(&normalized, name),
        })
        .collect();
    let side_effects = diff_deals(deal, &normalized)
        .into_iter()
        .filter(|change| !applied.contains(&change.field.as_str()))
        .collect();

    PatchOutcome {
        deal: normalized,
        applied: applied_changes,
        rejected,
        side_effects,
    }
}

/// [`apply_patch`] over a JSON object, rejecting values of unsupported shape.
pub fn apply_json_patch(
    normalizer: &Normalizer<'_>,
    deal: &Deal,
    fields: &Map<String, Value>,
    today: NaiveDate,
) -> PatchOutcome {
    let mut shape_errors = Vec::new();
    let mut converted = Vec::with_capacity(fields.len());
    for (name, value) in fields {
        match PatchValue::try_from(value.clone()) {
            Ok(value) => converted.push((name.clone(), value)),
            Err(reason) => shape_errors.push(RejectedField::new(name.clone(), reason)),
        }
    }
    let mut outcome = apply_patch(normalizer, deal, converted, today);
    outcome.rejected.extend(shape_errors);
    outcome
}

fn locked_reason(field: &str) -> String {
    format!("{field} is an identity or derived field and cannot be patched")
}

fn unknown_reason(field: &str) -> String {
    format!("unknown field '{field}'")
}

fn field_value(deal: &Deal, field: &str) -> Value {
    serde_json::to_value(deal)
        .ok()
        .and_then(|v| v.get(field).cloned())
        .unwrap_or(Value::Null)
}

fn set<T>(slot: &mut T, parsed: Result<T, String>) -> Result<(), String> {
    *slot = parsed?;
    Ok(())
}

fn set_postcode(deal: &mut Deal, value: &PatchValue) -> Result<(), String> {
    let postcode = optional_text(value)?.map(|p| p.to_ascii_uppercase());
    if postcode != deal.postcode {
        deal.postcode_area = None;
        deal.region = None;
        deal.map_link = None;
    }
    deal.postcode = postcode;
    Ok(())
}

fn optional_text(value: &PatchValue) -> Result<Option<String>, String> {
    match value {
        PatchValue::Null => Ok(None),
        PatchValue::Text(s) => {
            let trimmed = s.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        PatchValue::Integer(i) => Ok(Some(i.to_string())),
        PatchValue::Float(f) => Ok(Some(f.to_string())),
        other => Err(format!("expected text, got {}", other.kind())),
    }
}

fn required_text(value: &PatchValue) -> Result<String, String> {
    optional_text(value)?.ok_or_else(|| "value is required and cannot be empty".to_string())
}

fn email(value: &PatchValue) -> Result<Option<String>, String> {
    match optional_text(value)? {
        Some(address) if !address.contains('@') => {
            Err(format!("'{address}' is not a valid email address"))
        }
        other => Ok(other),
    }
}

fn stage(value: &PatchValue) -> Result<Stage, String> {
    match value {
        PatchValue::Text(s) => s.parse::<Stage>().map_err(|err| {
            let known: Vec<&str> = Stage::ALL.iter().map(|s| s.label()).collect();
            format!("{err}; expected one of {}", known.join(", "))
        }),
        other => Err(format!("expected stage name, got {}", other.kind())),
    }
}

/// Null resets to 0 so normalization re-derives the stage default.
fn probability(value: &PatchValue) -> Result<u8, String> {
    let raw = match value {
        PatchValue::Null => return Ok(0),
        PatchValue::Integer(i) => *i,
        PatchValue::Float(f) if f.is_finite() => f.round() as i64,
        PatchValue::Text(s) => {
            parse_percent(s).ok_or_else(|| format!("'{}' is not a whole percentage", s.trim()))?
        }
        other => return Err(format!("expected a percentage, got {}", other.kind())),
    };
    if !(0..=100).contains(&raw) {
        return Err(format!("probability must be between 0 and 100, got {raw}"));
    }
    Ok(raw as u8)
}

fn amount(value: &PatchValue) -> Result<Option<Decimal>, String> {
    let parsed = match value {
        PatchValue::Null => return Ok(None),
        PatchValue::Integer(i) => Decimal::from(*i),
        PatchValue::Float(f) => {
            Decimal::from_f64(*f).ok_or_else(|| format!("{f} is not a valid amount"))?
        }
        PatchValue::Text(s) if s.trim().is_empty() => return Ok(None),
        PatchValue::Text(s) => {
            parse_amount(s).ok_or_else(|| format!("'{}' is not a valid amount", s.trim()))?
        }
        other => return Err(format!("expected an amount, got {}", other.kind())),
    };
    if parsed.is_sign_negative() && !parsed.is_zero() {
        return Err(format!("amount cannot be negative, got {parsed}"));
    }
    if parsed > MAX_AMOUNT_GBP {
        return Err(format!("amount cannot exceed {MAX_AMOUNT_GBP}, got {parsed}"));
    }
    Ok(Some(parsed))
}

fn date(value: &PatchValue) -> Result<Option<NaiveDate>, String> {
    match value {
        PatchValue::Null => Ok(None),
        PatchValue::Text(s) if s.trim().is_empty() => Ok(None),
        PatchValue::Text(s) => parse_date(s).map(Some).ok_or_else(|| {
            format!("'{}' is not a recognised date (use yyyy-MM-dd or dd/MM/yyyy)", s.trim())
        }),
        other => Err(format!("expected a date, got {}", other.kind())),
    }
}

fn boolean(value: &PatchValue) -> Result<bool, String> {
    match value {
        PatchValue::Null => Ok(false),
        PatchValue::Bool(b) => Ok(*b),
        PatchValue::Integer(0) => Ok(false),
        PatchValue::Integer(1) => Ok(true),
        PatchValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" | "paid" => Ok(true),
            "false" | "no" | "n" | "0" | "" | "unpaid" => Ok(false),
            other => Err(format!("'{other}' is not a yes/no value")),
        },
        other => Err(format!("expected true or false, got {}", other.kind())),
    }
}

fn tags(value: &PatchValue) -> Result<Vec<String>, String> {
    match value {
        PatchValue::Null => Ok(Vec::new()),
        PatchValue::Text(s) => Ok(s.split(',').map(|t| t.trim().to_string()).collect()),
        PatchValue::List(items) => items
            .iter()
            .map(|item| match item {
                PatchValue::Text(s) => Ok(s.clone()),
                other => Err(format!("tags must be text, got {}", other.kind())),
            })
            .collect(),
        other => Err(format!("expected a list of tags, got {}", other.kind())),
    }
}
