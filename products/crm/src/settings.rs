use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Thresholds that drive report behaviour. Read-only during a report call.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineSettings {
    pub no_contact_threshold_days: i64,
    pub high_value_top_n: usize,
    #[serde(rename = "highValueThresholdGBP", alias = "highValueThreshold")]
    pub high_value_threshold: Decimal,
    pub stale_contact_warning_days: i64,
    /// Days before the no-contact threshold at which a promoter deal turns
    /// AtRisk.
    pub at_risk_window_days: i64,
    /// Closed deals younger than this get a celebrate/review action on the
    /// promoter dashboard.
    pub recent_close_days: i64,
    pub hygiene: HygieneSettings,

    // Passed through to input layers; the core does not enforce these.
    pub product_lines: Vec<String>,
    pub lead_sources: Vec<String>,
    pub service_plans: Vec<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            no_contact_threshold_days: 10,
            high_value_top_n: 10,
            high_value_threshold: Decimal::from(50_000),
            stale_contact_warning_days: 14,
            at_risk_window_days: 3,
            recent_close_days: 30,
            hygiene: HygieneSettings::default(),
            product_lines: vec![
                "Solar PV".into(),
                "Battery Storage".into(),
                "Heat Pump".into(),
                "EV Charger".into(),
                "Service Contract".into(),
            ],
            lead_sources: vec![
                "Website".into(),
                "Referral".into(),
                "Promoter".into(),
                "Trade Show".into(),
                "Cold Call".into(),
            ],
            service_plans: vec!["None".into(), "Basic".into(), "Premium".into()],
        }
    }
}

/// Stage/probability mismatch tolerance and severity bands, in percentage
/// points of deviation from the stage default.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HygieneSettings {
    pub probability_tolerance: u8,
    pub medium_deviation: u8,
    pub high_deviation: u8,
}

impl Default for HygieneSettings {
    fn default() -> Self {
        Self {
            probability_tolerance: 30,
            medium_deviation: 45,
            high_deviation: 60,
        }
    }
}
