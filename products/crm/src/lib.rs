//! Deal normalization and pipeline reporting.
//!
//! Everything outside [`service`] is a pure function over a deal snapshot and
//! a caller-supplied reference date. [`CrmModule`] wires those functions to a
//! [`platform_db::DealStore`].

pub mod error;
pub mod filter;
pub mod lookup;
pub mod normalize;
pub mod parse;
pub mod patch;
pub mod reports;
pub mod service;
pub mod settings;
pub mod stats;

pub use error::{CrmError, CrmResult};
pub use filter::{DealFilter, matches};
pub use lookup::{LookupOverrides, LookupTables, ProbabilityEntry, extract_postcode_area};
pub use normalize::{DatedIdGenerator, FieldChange, IdGenerator, Normalized, Normalizer};
pub use patch::{
    NON_PATCHABLE, PatchOutcome, PatchValue, RejectedField, apply_json_patch, apply_patch,
    patchable_fields, validate_field,
};
pub use reports::{
    DailyBrief, ForecastSnapshot, HygieneReport, PromoterDashboard, daily_brief,
    forecast_snapshot, hygiene_report, promoter_dashboard,
};
pub use service::{CrmModule, DealChanges};
pub use settings::{HygieneSettings, PipelineSettings};
pub use stats::{PipelineStats, stats};
