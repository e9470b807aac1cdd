//! Postcode-area → region and stage → probability tables.
//!
//! Both tables are configuration: loaded once, read-only while a report runs.
//! Missing entries degrade to "no region" and the built-in stage default.

use std::collections::BTreeMap;

use entity::Stage;
use serde::{Deserialize, Serialize};

use crate::parse::{clamp_probability, parse_probability};

/// Built-in UK postcode-area table: (region, areas).
const UK_REGIONS: &[(&str, &[&str])] = &[
    (
        "London",
        &[
            "E", "EC", "N", "NW", "SE", "SW", "W", "WC", "BR", "CR", "EN", "HA", "IG", "KT",
            "RM", "SM", "TW", "UB",
        ],
    ),
    (
        "South East",
        &[
            "BN", "CT", "DA", "GU", "HP", "ME", "MK", "OX", "PO", "RG", "RH", "SL", "SO", "TN",
        ],
    ),
    (
        "South West",
        &["BA", "BH", "BS", "DT", "EX", "GL", "PL", "SN", "SP", "TA", "TQ", "TR"],
    ),
    (
        "East of England",
        &["AL", "CB", "CM", "CO", "IP", "LU", "NR", "PE", "SG", "SS", "WD"],
    ),
    (
        "West Midlands",
        &["B", "CV", "DY", "HR", "ST", "TF", "WR", "WS", "WV"],
    ),
    ("East Midlands", &["DE", "LE", "LN", "NG", "NN"]),
    (
        "Yorkshire and the Humber",
        &["BD", "DN", "HD", "HG", "HU", "HX", "LS", "S", "WF", "YO"],
    ),
    (
        "North West",
        &[
            "BB", "BL", "CA", "CH", "CW", "FY", "L", "LA", "M", "OL", "PR", "SK", "WA", "WN",
        ],
    ),
    ("North East", &["DH", "DL", "NE", "SR", "TS"]),
    ("Wales", &["CF", "LD", "LL", "NP", "SA", "SY"]),
    (
        "Scotland",
        &[
            "AB", "DD", "DG", "EH", "FK", "G", "HS", "IV", "KA", "KW", "KY", "ML", "PA", "PH",
            "TD", "ZE",
        ],
    ),
    ("Northern Ireland", &["BT"]),
];

/// Leading run of letters of a postcode, uppercased, spaces ignored.
///
/// `"sw1a 1aa"` → `"SW"`, `"M1 1AE"` → `"M"`, `""` → `""`.
pub fn extract_postcode_area(postcode: &str) -> String {
    postcode
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .take_while(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupTables {
    postcode_regions: BTreeMap<String, String>,
    stage_probabilities: BTreeMap<Stage, u8>,
}

/// File/wire shape of [`LookupTables`]. Entries are merged over the built-in
/// UK table unless `replaceDefaults` is set.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LookupOverrides {
    pub replace_defaults: bool,
    pub postcode_regions: BTreeMap<String, String>,
    pub stage_probabilities: BTreeMap<Stage, ProbabilityEntry>,
}

/// Hand-edited probability: `60`, `62.5`, `"60%"` or `" 60 "`. Out-of-range values
/// are clamped to `[0, 100]`; unparseable text leaves the stage default.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ProbabilityEntry {
    Number(f64),
    Text(String),
}

impl ProbabilityEntry {
    pub fn resolve(&self) -> Option<u8> {
        match self {
            ProbabilityEntry::Number(value) => {
                value.is_finite().then(|| clamp_probability(value.round() as i64))
            }
            ProbabilityEntry::Text(text) => parse_probability(text),
        }
    }
}

impl From<u8> for ProbabilityEntry {
    fn from(value: u8) -> Self {
        ProbabilityEntry::Number(f64::from(value))
    }
}

impl Default for LookupTables {
    fn default() -> Self {
        Self::uk_defaults()
    }
}

impl LookupTables {
    /// Tables with no region entries and no probability overrides.
    pub fn empty() -> Self {
        Self {
            postcode_regions: BTreeMap::new(),
            stage_probabilities: BTreeMap::new(),
        }
    }

    pub fn uk_defaults() -> Self {
        let mut tables = Self::empty();
        for (region, areas) in UK_REGIONS {
            for area in areas.iter() {
                tables = tables.with_region(*area, *region);
            }
        }
        tables
    }

    pub fn from_overrides(overrides: LookupOverrides) -> Self {
        let mut tables = if overrides.replace_defaults {
            Self::empty()
        } else {
            Self::uk_defaults()
        };
        for (area, region) in overrides.postcode_regions {
            tables = tables.with_region(&area, &region);
        }
        for (stage, entry) in overrides.stage_probabilities {
            if let Some(probability) = entry.resolve() {
                tables = tables.with_stage_probability(stage, probability);
            }
        }
        tables
    }

    pub fn with_region(mut self, area: &str, region: &str) -> Self {
        let key = extract_postcode_area(area);
        if !key.is_empty() && !region.trim().is_empty() {
            self.postcode_regions.insert(key, region.trim().to_string());
        }
        self
    }

    pub fn with_stage_probability(mut self, stage: Stage, probability: u8) -> Self {
        self.stage_probabilities.insert(stage, probability.min(100));
        self
    }

    pub fn region_for_area(&self, area: &str) -> Option<&str> {
        let key = extract_postcode_area(area);
        if key.is_empty() {
            return None;
        }
        self.postcode_regions.get(&key).map(String::as_str)
    }

    /// Region for a full postcode, absent for blank or unmapped input.
    pub fn region_for_postcode(&self, postcode: &str) -> Option<&str> {
        self.region_for_area(&extract_postcode_area(postcode))
    }

    /// Configured override, else the built-in default for the stage.
    pub fn probability_for_stage(&self, stage: Stage) -> u8 {
        self.stage_probabilities
            .get(&stage)
            .copied()
            .unwrap_or_else(|| stage.default_probability())
    }

    pub fn region_count(&self) -> usize {
        self.postcode_regions
            .values()
            .collect::<std::collections::BTreeSet<_>>()
            .len()
    }

    pub fn area_count(&self) -> usize {
        self.postcode_regions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn area_is_leading_letters() {
        assert_eq!(extract_postcode_area("sw1a 1aa"), "SW");
        assert_eq!(extract_postcode_area("SW1A1AA"), "SW");
        assert_eq!(extract_postcode_area("  m1 1ae "), "M");
        assert_eq!(extract_postcode_area("EC"), "EC");
        assert_eq!(extract_postcode_area(""), "");
        assert_eq!(extract_postcode_area("1AB"), "");
    }

    #[test]
    fn region_lookup_ignores_case_and_spaces() {
        let tables = LookupTables::uk_defaults();
        assert_eq!(tables.region_for_postcode("sw1a 1aa"), Some("London"));
        assert_eq!(tables.region_for_postcode("SW1A1AA"), Some("London"));
        assert_eq!(tables.region_for_postcode("eh1 1yz"), Some("Scotland"));
        assert_eq!(tables.region_for_postcode("BT7 1NN"), Some("Northern Ireland"));
        assert_eq!(tables.region_for_postcode("   "), None);
        assert_eq!(tables.region_for_postcode("QQ1 1QQ"), None);
    }

    #[test]
    fn default_table_covers_twelve_regions() {
        let tables = LookupTables::uk_defaults();
        assert_eq!(tables.region_count(), 12);
        assert!(tables.area_count() >= 70);
    }

    #[test]
    fn stage_probability_uses_override_then_default() {
        let tables = LookupTables::uk_defaults();
        for stage in Stage::ALL {
            assert_eq!(tables.probability_for_stage(stage), stage.default_probability());
        }
        let tuned = tables.with_stage_probability(Stage::Proposal, 55);
        assert_eq!(tuned.probability_for_stage(Stage::Proposal), 55);
        assert_eq!(tuned.probability_for_stage(Stage::Negotiation), 80);
    }

    #[test]
    fn overrides_merge_or_replace() {
        let merged = LookupTables::from_overrides(LookupOverrides {
            postcode_regions: BTreeMap::from([("zz".to_string(), "Test Zone".to_string())]),
            ..LookupOverrides::default()
        });
        assert_eq!(merged.region_for_postcode("ZZ9 9ZZ"), Some("Test Zone"));
        assert_eq!(merged.region_for_postcode("SW1A 1AA"), Some("London"));

        let replaced = LookupTables::from_overrides(LookupOverrides {
            replace_defaults: true,
            postcode_regions: BTreeMap::from([("SW".to_string(), "Custom".to_string())]),
            stage_probabilities: BTreeMap::from([(Stage::Lead, 5.into())]),
        });
        assert_eq!(replaced.region_for_postcode("sw1a"), Some("Custom"));
        assert_eq!(replaced.region_for_postcode("EH1 1YZ"), None);
        assert_eq!(replaced.probability_for_stage(Stage::Lead), 5);
    }

    #[test]
    fn loose_probability_overrides_are_parsed_and_clamped() {
        let overrides: LookupOverrides = serde_json::from_str(
            r#"{"stageProbabilities": {
                "Lead": "25%",
                "Proposal": 150,
                "Negotiation": -3,
                "Qualified": 32.6,
                "Discovery": "lots"
            }}"#,
        )
        .unwrap();
        let tables = LookupTables::from_overrides(overrides);
        assert_eq!(tables.probability_for_stage(Stage::Lead), 25);
        assert_eq!(tables.probability_for_stage(Stage::Proposal), 100);
        assert_eq!(tables.probability_for_stage(Stage::Negotiation), 0);
        assert_eq!(tables.probability_for_stage(Stage::Qualified), 33);
        assert_eq!(tables.probability_for_stage(Stage::Discovery), 40);
    }
}
