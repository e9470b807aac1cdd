use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use platform_db::StoreSettings;
use products_crm::{LookupOverrides, LookupTables, PipelineSettings};

pub const LOOKUPS_ENV: &str = "DEALDESK_LOOKUPS";
pub const SETTINGS_ENV: &str = "DEALDESK_SETTINGS";
pub const TODAY_ENV: &str = "DEALDESK_TODAY";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub data_path: PathBuf,
    pub lookup: LookupTables,
    pub settings: PipelineSettings,
    /// Fixed reference date; the local calendar date when unset.
    pub today_override: Option<NaiveDate>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_source<F>(env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let data_path = StoreSettings::default().data_path(&env);

        let lookup = match var(LOOKUPS_ENV) {
            Some(path) => {
                let overrides: LookupOverrides = read_json(Path::new(&path))
                    .with_context(|| format!("{LOOKUPS_ENV} points at an unusable file"))?;
                LookupTables::from_overrides(overrides)
            }
            None => LookupTables::uk_defaults(),
        };

        let settings = match var(SETTINGS_ENV) {
            Some(path) => read_json(Path::new(&path))
                .with_context(|| format!("{SETTINGS_ENV} points at an unusable file"))?,
            None => PipelineSettings::default(),
        };

        let today_override = var(TODAY_ENV)
            .map(|raw| {
                NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                    .with_context(|| format!("{TODAY_ENV} must be yyyy-MM-dd, got {raw}"))
            })
            .transpose()?;

        Ok(Self {
            data_path,
            lookup,
            settings,
            today_override,
        })
    }

    pub fn today(&self) -> NaiveDate {
        self.today_override
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use entity::Stage;
    use platform_db::DEFAULT_DATA_FILE;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_source(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.data_path, PathBuf::from(DEFAULT_DATA_FILE));
        assert_eq!(cfg.settings, PipelineSettings::default());
        assert_eq!(cfg.lookup.region_for_postcode("SW1A 1AA"), Some("London"));
        assert!(cfg.today_override.is_none());
    }

    #[test]
    fn reads_files_and_date_override() {
        let dir = tempfile::tempdir().unwrap();
        let lookups = dir.path().join("lookups.json");
        std::fs::write(
            &lookups,
            r#"{"postcodeRegions": {"ZZ": "Test Region"}, "stageProbabilities": {"Lead": 25}}"#,
        )
        .unwrap();
        let settings = dir.path().join("settings.json");
        std::fs::write(&settings, r#"{"noContactThresholdDays": 21}"#).unwrap();

        let cfg = config(&[
            ("DEALDESK_DATA", "/tmp/x.json"),
            (LOOKUPS_ENV, lookups.to_str().unwrap()),
            (SETTINGS_ENV, settings.to_str().unwrap()),
            (TODAY_ENV, "2025-06-02"),
        ])
        .unwrap();
        assert_eq!(cfg.data_path, PathBuf::from("/tmp/x.json"));
        assert_eq!(cfg.lookup.region_for_postcode("zz1 1aa"), Some("Test Region"));
        assert_eq!(cfg.lookup.region_for_postcode("SW1A 1AA"), Some("London"));
        assert_eq!(cfg.lookup.probability_for_stage(Stage::Lead), 25);
        assert_eq!(cfg.settings.no_contact_threshold_days, 21);
        assert_eq!(cfg.today(), NaiveDate::from_ymd_opt(2025, 6, 2).unwrap());
    }

    #[test]
    fn bad_values_are_errors() {
        assert!(config(&[(TODAY_ENV, "02/06/2025")]).is_err());
        assert!(config(&[(SETTINGS_ENV, "/definitely/not/here.json")]).is_err());
    }
}
