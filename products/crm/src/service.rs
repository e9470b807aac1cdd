use std::sync::Arc;

use chrono::NaiveDate;
use entity::{Deal, MAX_AMOUNT_GBP, Promoter};
use platform_db::DealStore;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, info_span};

use crate::error::{CrmError, CrmResult};
use crate::filter::DealFilter;
use crate::lookup::LookupTables;
use crate::normalize::{DatedIdGenerator, FieldChange, IdGenerator, Normalized, Normalizer};
use crate::patch::{PatchOutcome, PatchValue, apply_json_patch, apply_patch};
use crate::reports::{
    DailyBrief, ForecastSnapshot, HygieneReport, PromoterDashboard, daily_brief,
    forecast_snapshot, hygiene_report, promoter_dashboard,
};
use crate::settings::PipelineSettings;
use crate::stats::{PipelineStats, stats};

/// Change log of one deal touched by [`CrmModule::normalize_all`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DealChanges {
    pub deal_id: String,
    pub changes: Vec<FieldChange>,
}

/// Service facade: drives the normalize-then-store round trip over a
/// [`DealStore`] and runs reports over store snapshots.
pub struct CrmModule<S> {
    store: S,
    lookup: LookupTables,
    settings: PipelineSettings,
    ids: Arc<dyn IdGenerator>,
}

impl<S: DealStore> CrmModule<S> {
    pub fn new(store: S, lookup: LookupTables, settings: PipelineSettings) -> Self {
        Self {
            store,
            lookup,
            settings,
            ids: Arc::new(DatedIdGenerator),
        }
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn normalizer(&self) -> Normalizer<'_> {
        Normalizer::new(&self.lookup).with_id_generator(self.ids.as_ref())
    }

    /// Normalize and insert a new deal. A supplied id must not already exist.
    pub fn create_deal(&self, deal: Deal, today: NaiveDate) -> CrmResult<Normalized> {
        let span = info_span!("crm.createDeal");
        let _guard = span.enter();
        require_names(&deal)?;
        require_amounts_in_range(&deal)?;
        if !deal.deal_id.trim().is_empty() && self.store.get(&deal.deal_id)?.is_some() {
            return Err(CrmError::Duplicate(deal.deal_id.trim().to_string()));
        }
        let normalized = self.normalizer().normalize(&deal, today);
        self.store.upsert(normalized.deal.clone())?;
        info!(deal_id = %normalized.deal.deal_id, "deal created");
        Ok(normalized)
    }

    /// Create a deal from loosely typed fields. `dealId` may be supplied
    /// here; every other field goes through patch validation.
    pub fn create_from_fields(
        &self,
        fields: &Map<String, Value>,
        today: NaiveDate,
    ) -> CrmResult<PatchOutcome> {
        let span = info_span!("crm.createDeal", fields = fields.len());
        let _guard = span.enter();
        let mut fields = fields.clone();
        let mut base = Deal::default();
        match fields.remove("dealId") {
            Some(Value::String(id)) => base.deal_id = id.trim().to_string(),
            Some(Value::Null) | None => {}
            Some(other) => {
                return Err(CrmError::Invalid(format!("dealId must be text, got {other}")));
            }
        }
        if !base.deal_id.is_empty() && self.store.get(&base.deal_id)?.is_some() {
            return Err(CrmError::Duplicate(base.deal_id));
        }
        let outcome = apply_json_patch(&self.normalizer(), &base, &fields, today);
        require_names(&outcome.deal)?;
        self.store.upsert(outcome.deal.clone())?;
        info!(
            deal_id = %outcome.deal.deal_id,
            rejected = outcome.rejected.len(),
            "deal created"
        );
        Ok(outcome)
    }

    pub fn get_deal(&self, deal_id: &str) -> CrmResult<Option<Deal>> {
        Ok(self.store.get(deal_id)?)
    }

    /// Apply a JSON field patch. `None` when the id is unknown.
    pub fn update_deal(
        &self,
        deal_id: &str,
        fields: &Map<String, Value>,
        today: NaiveDate,
    ) -> CrmResult<Option<PatchOutcome>> {
        let span = info_span!("crm.updateDeal", deal_id, fields = fields.len());
        let _guard = span.enter();
        let Some(current) = self.store.get(deal_id)? else {
            return Ok(None);
        };
        let outcome = apply_json_patch(&self.normalizer(), &current, fields, today);
        self.persist_patch(outcome).map(Some)
    }

    /// Typed form of [`CrmModule::update_deal`].
    pub fn patch_deal<I>(
        &self,
        deal_id: &str,
        fields: I,
        today: NaiveDate,
    ) -> CrmResult<Option<PatchOutcome>>
    where
        I: IntoIterator<Item = (String, PatchValue)>,
    {
        let span = info_span!("crm.updateDeal", deal_id);
        let _guard = span.enter();
        let Some(current) = self.store.get(deal_id)? else {
            return Ok(None);
        };
        let outcome = apply_patch(&self.normalizer(), &current, fields, today);
        self.persist_patch(outcome).map(Some)
    }

    fn persist_patch(&self, outcome: PatchOutcome) -> CrmResult<PatchOutcome> {
        if !outcome.applied.is_empty() || !outcome.side_effects.is_empty() {
            self.store.upsert(outcome.deal.clone())?;
        }
        info!(
            deal_id = %outcome.deal.deal_id,
            applied = outcome.applied.len(),
            rejected = outcome.rejected.len(),
            side_effects = outcome.side_effects.len(),
            "deal patched"
        );
        Ok(outcome)
    }

    pub fn delete_deal(&self, deal_id: &str) -> CrmResult<bool> {
        let deleted = self.store.delete(deal_id)?;
        if deleted {
            info!(deal_id, "deal deleted");
        }
        Ok(deleted)
    }

    pub fn list_deals(&self, filter: &DealFilter, today: NaiveDate) -> CrmResult<Vec<Deal>> {
        Ok(self.store.query(&|deal| filter.matches(deal, today))?)
    }

    /// Re-run normalization over every stored deal, writing back the ones
    /// that changed.
    pub fn normalize_all(&self, today: NaiveDate) -> CrmResult<Vec<DealChanges>> {
        let span = info_span!("crm.normalizeAll");
        let _guard = span.enter();
        let normalizer = self.normalizer();
        let mut touched = Vec::new();
        for deal in self.store.all()? {
            let normalized = normalizer.normalize(&deal, today);
            if !normalized.changed() {
                continue;
            }
            self.store.upsert(normalized.deal.clone())?;
            touched.push(DealChanges {
                deal_id: normalized.deal.deal_id,
                changes: normalized.changes,
            });
        }
        info!(changed = touched.len(), "normalization pass complete");
        Ok(touched)
    }

    pub fn daily_brief(&self, today: NaiveDate) -> CrmResult<DailyBrief> {
        Ok(daily_brief(&self.store.all()?, today, &self.settings))
    }

    pub fn hygiene_report(&self, today: NaiveDate) -> CrmResult<HygieneReport> {
        Ok(hygiene_report(&self.store.all()?, today, &self.settings, &self.lookup))
    }

    pub fn forecast_snapshot(&self, today: NaiveDate) -> CrmResult<ForecastSnapshot> {
        Ok(forecast_snapshot(&self.store.all()?, today))
    }

    pub fn promoter_dashboard(
        &self,
        promoter: &Promoter,
        today: NaiveDate,
    ) -> CrmResult<PromoterDashboard> {
        Ok(promoter_dashboard(&self.store.all()?, promoter, today, &self.settings))
    }

    pub fn stats(&self) -> CrmResult<PipelineStats> {
        Ok(stats(&self.store.all()?))
    }
}

fn require_names(deal: &Deal) -> CrmResult<()> {
    if deal.account_name.trim().is_empty() {
        return Err(CrmError::Invalid("accountName is required".into()));
    }
    if deal.deal_name.trim().is_empty() {
        return Err(CrmError::Invalid("dealName is required".into()));
    }
    Ok(())
}

fn require_amounts_in_range(deal: &Deal) -> CrmResult<()> {
    let fields = [
        ("amountGBP", deal.amount_gbp),
        ("promoterCommission", deal.promoter_commission),
    ];
    for (field, value) in fields {
        if let Some(value) = value {
            if value.is_sign_negative() && !value.is_zero() {
                return Err(CrmError::Invalid(format!("{field} cannot be negative")));
            }
            if value > MAX_AMOUNT_GBP {
                return Err(CrmError::Invalid(format!("{field} cannot exceed {MAX_AMOUNT_GBP}")));
            }
        }
    }
    Ok(())
}
