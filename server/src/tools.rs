//! Line-delimited JSON-RPC over stdin/stdout. Each input line is one request;
//! each output line is one response.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use entity::{Promoter, PromoterStatus, PromoterTier};
use platform_api::{ApiError, ApiResult, RpcId, RpcRequest, RpcResponse};
use platform_db::DealStore;
use products_crm::{
    CrmError, CrmModule, DealFilter, NON_PATCHABLE, PatchOutcome, patchable_fields,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Method table: name and one-line description.
pub const METHODS: &[(&str, &str)] = &[
    ("list_methods", "List the available methods"),
    ("list_fields", "Patchable and read-only deal fields"),
    ("list_deals", "Deals matching an optional filter"),
    ("get_deal", "One deal by dealId"),
    ("create_deal", "Create a deal from loosely typed fields"),
    ("update_deal", "Patch fields on a deal"),
    ("delete_deal", "Delete a deal by dealId"),
    ("normalize_all", "Re-run normalization over every stored deal"),
    ("daily_brief", "Due, overdue, no-contact and high-value-at-risk deals"),
    ("hygiene_report", "Data quality issues and health score"),
    ("forecast_snapshot", "Pipeline totals grouped by stage, owner, month, region and product"),
    ("promoter_dashboard", "Referral performance for one promoter"),
    ("stats", "Headline pipeline counts"),
];

pub struct ToolDispatcher<S> {
    crm: CrmModule<S>,
    today_override: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DateParams {
    today: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ListParams {
    filter: DealFilter,
    today: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdParams {
    deal_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldParams {
    #[serde(default)]
    deal_id: Option<String>,
    fields: Map<String, Value>,
    #[serde(default)]
    today: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PromoterParams {
    promoter_id: Option<String>,
    promo_code: Option<String>,
    name: Option<String>,
    tier: PromoterTier,
    today: Option<NaiveDate>,
}

impl<S: DealStore> ToolDispatcher<S> {
    pub fn new(crm: CrmModule<S>, today_override: Option<NaiveDate>) -> Self {
        Self {
            crm,
            today_override,
        }
    }

    fn today(&self, requested: Option<NaiveDate>) -> NaiveDate {
        requested
            .or(self.today_override)
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    /// Handle one raw input line. Blank lines produce no response.
    pub fn handle_line(&self, line: &str) -> Option<RpcResponse> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        let response = match serde_json::from_str::<RpcRequest>(trimmed) {
            Ok(request) => self.dispatch(request),
            Err(err) => {
                warn!(error = %err, "unparseable request line");
                RpcResponse::failure(
                    RpcId::Null,
                    "",
                    &ApiError::Parse(err.to_string()),
                    Utc::now(),
                )
            }
        };
        Some(response)
    }

    pub fn dispatch(&self, request: RpcRequest) -> RpcResponse {
        let RpcRequest { id, method, params } = request;
        debug!(method = %method, "tool call");
        match self.call(&method, params) {
            Ok(result) => RpcResponse::success(id, method, result),
            Err(err) => RpcResponse::failure(id, method, &err, Utc::now()),
        }
    }

    fn call(&self, method: &str, params: Value) -> ApiResult<Value> {
        match method {
            "list_methods" => Ok(Value::Array(
                METHODS
                    .iter()
                    .map(|(name, description)| json!({"name": name, "description": description}))
                    .collect(),
            )),
            "list_fields" => Ok(json!({
                "patchable": patchable_fields().collect::<Vec<_>>(),
                "readOnly": NON_PATCHABLE,
            })),
            "list_deals" => {
                let p: ListParams = params_or_default(params)?;
                let deals = self.crm.list_deals(&p.filter, self.today(p.today)).map_err(crm_error)?;
                let views: Vec<_> = deals.iter().map(|d| d.view()).collect();
                Ok(json!({"count": views.len(), "deals": views}))
            }
            "get_deal" => {
                let p: IdParams = params_required(params)?;
                let deal = self
                    .crm
                    .get_deal(&p.deal_id)
                    .map_err(crm_error)?
                    .ok_or_else(|| deal_not_found(&p.deal_id))?;
                to_value(deal.view())
            }
            "create_deal" => {
                let p: FieldParams = params_required(params)?;
                let mut fields = p.fields;
                if let Some(id) = p.deal_id {
                    fields.insert("dealId".into(), Value::String(id));
                }
                let outcome = self
                    .crm
                    .create_from_fields(&fields, self.today(p.today))
                    .map_err(crm_error)?;
                outcome_value(&outcome)
            }
            "update_deal" => {
                let p: FieldParams = params_required(params)?;
                let deal_id = p
                    .deal_id
                    .ok_or_else(|| ApiError::invalid("dealId is required"))?;
                let outcome = self
                    .crm
                    .update_deal(&deal_id, &p.fields, self.today(p.today))
                    .map_err(crm_error)?
                    .ok_or_else(|| deal_not_found(&deal_id))?;
                outcome_value(&outcome)
            }
            "delete_deal" => {
                let p: IdParams = params_required(params)?;
                if !self.crm.delete_deal(&p.deal_id).map_err(crm_error)? {
                    return Err(deal_not_found(&p.deal_id));
                }
                Ok(json!({"dealId": p.deal_id, "deleted": true}))
            }
            "normalize_all" => {
                let p: DateParams = params_or_default(params)?;
                let touched = self.crm.normalize_all(self.today(p.today)).map_err(crm_error)?;
                Ok(json!({"changed": touched.len(), "deals": touched}))
            }
            "daily_brief" => {
                let p: DateParams = params_or_default(params)?;
                to_value(self.crm.daily_brief(self.today(p.today)).map_err(crm_error)?)
            }
            "hygiene_report" => {
                let p: DateParams = params_or_default(params)?;
                to_value(self.crm.hygiene_report(self.today(p.today)).map_err(crm_error)?)
            }
            "forecast_snapshot" => {
                let p: DateParams = params_or_default(params)?;
                to_value(self.crm.forecast_snapshot(self.today(p.today)).map_err(crm_error)?)
            }
            "promoter_dashboard" => {
                let p: PromoterParams = params_or_default(params)?;
                if p.promoter_id.is_none() && p.promo_code.is_none() {
                    return Err(ApiError::invalid("promoterId or promoCode is required"));
                }
                let promoter = Promoter {
                    promoter_id: p.promoter_id,
                    promo_code: p.promo_code,
                    name: p.name,
                    tier: p.tier,
                    status: PromoterStatus::Active,
                };
                let today = self.today(p.today);
                to_value(self.crm.promoter_dashboard(&promoter, today).map_err(crm_error)?)
            }
            "stats" => to_value(self.crm.stats().map_err(crm_error)?),
            other => Err(ApiError::UnknownMethod(other.to_string())),
        }
    }
}

/// Read requests until EOF, writing one response line per request.
pub async fn serve<S, R, W>(
    dispatcher: Arc<ToolDispatcher<S>>,
    reader: R,
    mut writer: W,
) -> Result<()>
where
    S: DealStore,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut handled = 0usize;
    let mut failed = 0usize;
    while let Some(line) = lines.next_line().await.context("reading request")? {
        let Some(response) = dispatcher.handle_line(&line) else {
            continue;
        };
        if response.is_error() {
            failed += 1;
        }
        let mut payload = serde_json::to_vec(&response).context("encoding response")?;
        payload.push(b'\n');
        writer.write_all(&payload).await.context("writing response")?;
        writer.flush().await.context("flushing response")?;
        handled += 1;
    }
    info!(handled, failed, "input closed; tool loop finished");
    Ok(())
}

pub async fn serve_stdio<S: DealStore>(dispatcher: Arc<ToolDispatcher<S>>) -> Result<()> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    serve(dispatcher, stdin, tokio::io::stdout()).await
}

fn params_required<T: DeserializeOwned>(params: Value) -> ApiResult<T> {
    if params.is_null() {
        return Err(ApiError::invalid("params are required"));
    }
    Ok(serde_json::from_value(params)?)
}

fn params_or_default<T: DeserializeOwned + Default>(params: Value) -> ApiResult<T> {
    if params.is_null() {
        return Ok(T::default());
    }
    Ok(serde_json::from_value(params)?)
}

fn to_value<T: serde::Serialize>(value: T) -> ApiResult<Value> {
    serde_json::to_value(value).map_err(|err| ApiError::internal(err.into()))
}

fn outcome_value(outcome: &PatchOutcome) -> ApiResult<Value> {
    Ok(json!({
        "deal": to_value(outcome.deal.view())?,
        "applied": to_value(&outcome.applied)?,
        "rejected": to_value(&outcome.rejected)?,
        "sideEffects": to_value(&outcome.side_effects)?,
    }))
}

fn deal_not_found(deal_id: &str) -> ApiError {
    ApiError::not_found(format!("deal {deal_id}"))
}

fn crm_error(err: CrmError) -> ApiError {
    match err {
        CrmError::Duplicate(_) | CrmError::Invalid(_) => ApiError::invalid(err.to_string()),
        CrmError::Store(inner) => ApiError::internal(anyhow::Error::new(inner)),
    }
}
