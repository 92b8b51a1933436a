//! Calibration tables: country profiles, regime parameters, volatility and
//! reform presets. Loaded once, validated, then shared read-only.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use super::engine::DEBT_CEILING;
use super::error::DsaError;
use super::types::{
    Classification, CountryProfile, NO_REFORM_ID, ReformPreset, RegimeParameters,
    VolatilityProfile,
};

const BUILTIN_TABLES: &str = include_str!("../../data/reference_tables.json");

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceTables {
    countries: Vec<CountryProfile>,
    regimes: Vec<RegimeParameters>,
    volatility: Vec<VolatilityProfile>,
    reforms: Vec<ReformPreset>,
}

impl ReferenceTables {
    pub fn builtin() -> Result<Self, DsaError> {
        Self::from_json_str(BUILTIN_TABLES)
    }

    pub fn from_path(path: &Path) -> Result<Self, DsaError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(json: &str) -> Result<Self, DsaError> {
        let tables: ReferenceTables = serde_json::from_str(json)?;
        tables.validate()?;
        Ok(tables)
    }

    pub fn new(
        countries: Vec<CountryProfile>,
        regimes: Vec<RegimeParameters>,
        volatility: Vec<VolatilityProfile>,
        reforms: Vec<ReformPreset>,
    ) -> Result<Self, DsaError> {
        let tables = Self {
            countries,
            regimes,
            volatility,
            reforms,
        };
        tables.validate()?;
        Ok(tables)
    }

    pub fn countries(&self) -> &[CountryProfile] {
        &self.countries
    }

    pub fn reforms(&self) -> &[ReformPreset] {
        &self.reforms
    }

    pub fn country(&self, id: &str) -> Result<&CountryProfile, DsaError> {
        self.countries
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| DsaError::InvalidCountry(id.to_string()))
    }

    pub fn reform(&self, id: &str) -> Result<&ReformPreset, DsaError> {
        self.reforms
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| DsaError::InvalidScenario(id.to_string()))
    }

    // Validation guarantees an entry for every classification in use, so a
    // miss here means the caller built a profile outside these tables.
    pub fn regime(&self, classification: Classification) -> Result<&RegimeParameters, DsaError> {
        self.regimes
            .iter()
            .find(|r| r.classification == classification)
            .ok_or_else(|| {
                DsaError::InvalidTable(format!("no regime parameters for '{classification}'"))
            })
    }

    pub fn volatility(
        &self,
        classification: Classification,
    ) -> Result<&VolatilityProfile, DsaError> {
        self.volatility
            .iter()
            .find(|v| v.classification == classification)
            .ok_or_else(|| {
                DsaError::InvalidTable(format!("no volatility profile for '{classification}'"))
            })
    }

    pub fn countries_in(&self, classification: Classification) -> Vec<&CountryProfile> {
        self.countries
            .iter()
            .filter(|c| c.classification == classification)
            .collect()
    }

    fn validate(&self) -> Result<(), DsaError> {
        let mut seen = HashSet::new();
        for regime in &self.regimes {
            if !seen.insert(regime.classification) {
                return Err(DsaError::InvalidTable(format!(
                    "duplicate regime parameters for '{}'",
                    regime.classification
                )));
            }
            let finite = regime
                .thresholds
                .iter()
                .chain(&regime.base_rates)
                .chain(&regime.rate_sensitivity)
                .chain(&regime.growth_adjustment)
                .all(|v| v.is_finite());
            if !finite {
                return Err(DsaError::InvalidTable(format!(
                    "regime parameters for '{}' must be finite",
                    regime.classification
                )));
            }
            if regime.thresholds[0] >= regime.thresholds[1] {
                return Err(DsaError::InvalidTable(format!(
                    "thresholds for '{}' must be strictly increasing",
                    regime.classification
                )));
            }
        }

        let mut seen = HashSet::new();
        for vol in &self.volatility {
            if !seen.insert(vol.classification) {
                return Err(DsaError::InvalidTable(format!(
                    "duplicate volatility profile for '{}'",
                    vol.classification
                )));
            }
            let sigmas = [vol.growth, vol.inflation, vol.primary_balance];
            if sigmas.iter().any(|s| !s.is_finite() || *s < 0.0) {
                return Err(DsaError::InvalidTable(format!(
                    "volatility for '{}' must be finite and >= 0",
                    vol.classification
                )));
            }
        }

        let mut seen = HashSet::new();
        for country in &self.countries {
            if !seen.insert(country.id.as_str()) {
                return Err(DsaError::InvalidTable(format!(
                    "duplicate country id '{}'",
                    country.id
                )));
            }
            let values = [
                country.debt,
                country.growth,
                country.inflation,
                country.primary_balance,
            ];
            if values.iter().any(|v| !v.is_finite()) {
                return Err(DsaError::InvalidTable(format!(
                    "baseline values for '{}' must be finite",
                    country.id
                )));
            }
            if !(0.0..=DEBT_CEILING).contains(&country.debt) {
                return Err(DsaError::InvalidTable(format!(
                    "baseline debt for '{}' must lie in [0, {DEBT_CEILING}]",
                    country.id
                )));
            }
            if country.growth <= -100.0 || country.inflation <= -100.0 {
                return Err(DsaError::InvalidTable(format!(
                    "baseline growth and inflation for '{}' must be above -100",
                    country.id
                )));
            }
            self.regime(country.classification)?;
            self.volatility(country.classification)?;
        }

        let mut seen = HashSet::new();
        for reform in &self.reforms {
            if !seen.insert(reform.id.as_str()) {
                return Err(DsaError::InvalidTable(format!(
                    "duplicate reform id '{}'",
                    reform.id
                )));
            }
            let p = &reform.policy;
            if [p.pb_improvement, p.growth_boost, p.rate_reduction]
                .iter()
                .any(|v| !v.is_finite())
            {
                return Err(DsaError::InvalidTable(format!(
                    "reform '{}' must have finite parameters",
                    reform.id
                )));
            }
        }

        match self.reforms.iter().find(|r| r.id == NO_REFORM_ID) {
            Some(none) if none.policy.is_none() => Ok(()),
            Some(_) => Err(DsaError::InvalidTable(format!(
                "reform '{NO_REFORM_ID}' must leave every parameter at zero"
            ))),
            None => Err(DsaError::InvalidTable(format!(
                "reform table must contain '{NO_REFORM_ID}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ReformPolicy;

    fn assert_table_error(json: &str, needle: &str) {
        match ReferenceTables::from_json_str(json) {
            Err(DsaError::InvalidTable(msg)) => {
                assert!(msg.contains(needle), "unexpected message: {msg}")
            }
            other => panic!("expected InvalidTable containing '{needle}', got {other:?}"),
        }
    }

    fn minimal_json(thresholds: &str, none_pb: f64, country_class: &str) -> String {
        format!(
            r#"{{
              "regimes": [{{ "classification": "em_ig", "thresholds": {thresholds},
                "baseRates": [2.5, 3.5, 5.0], "rateSensitivity": [0.0, 0.05, 0.08],
                "growthAdjustment": [0.0, -0.3, -0.8] }}],
              "volatility": [{{ "classification": "em_ig", "growth": 2.5, "inflation": 1.5, "primaryBalance": 1.5 }}],
              "reforms": [{{ "id": "none", "name": "No change", "pbImprovement": {none_pb}, "growthBoost": 0.0, "rateReduction": 0.0 }}],
              "countries": [{{ "id": "x", "name": "X", "classification": "{country_class}",
                "debt": 60.0, "growth": 2.0, "inflation": 3.0, "primaryBalance": -1.0 }}]
            }}"#
        )
    }

    #[test]
    fn builtin_tables_load_and_cover_every_classification() {
        let tables = ReferenceTables::builtin().expect("builtin tables are valid");
        for class in Classification::ALL {
            assert!(tables.regime(class).is_ok());
            assert!(tables.volatility(class).is_ok());
            assert!(!tables.countries_in(class).is_empty());
        }
        let em_ig = tables.regime(Classification::EmIg).expect("em_ig");
        assert_eq!(em_ig.thresholds, [55.0, 70.0]);
    }

    #[test]
    fn builtin_none_reform_is_all_zero() {
        let tables = ReferenceTables::builtin().expect("builtin tables are valid");
        let none = tables.reform("none").expect("none preset");
        assert_eq!(none.policy, ReformPolicy::NONE);
        assert!(none.policy.is_none());
        let ids: Vec<&str> = tables.reforms().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["none", "mild", "moderate", "aggressive"]);
    }

    #[test]
    fn missing_baseline_year_defaults() {
        let tables =
            ReferenceTables::from_json_str(&minimal_json("[55.0, 70.0]", 0.0, "em_ig"))
                .expect("valid");
        assert_eq!(tables.country("x").expect("x").baseline_year, 2024);
    }

    #[test]
    fn lookups_report_the_taxonomy() {
        let tables = ReferenceTables::builtin().expect("builtin tables are valid");
        assert!(matches!(
            tables.country("atlantis"),
            Err(DsaError::InvalidCountry(id)) if id == "atlantis"
        ));
        assert!(matches!(
            tables.reform("austerity"),
            Err(DsaError::InvalidScenario(id)) if id == "austerity"
        ));
    }

    #[test]
    fn rejects_non_increasing_thresholds() {
        assert_table_error(&minimal_json("[70.0, 70.0]", 0.0, "em_ig"), "strictly increasing");
    }

    #[test]
    fn rejects_baseline_debt_above_ceiling() {
        let json = minimal_json("[55.0, 70.0]", 0.0, "em_ig")
            .replace(r#""debt": 60.0"#, r#""debt": 300.1"#);
        assert_table_error(&json, "baseline debt");

        let at_ceiling = minimal_json("[55.0, 70.0]", 0.0, "em_ig")
            .replace(r#""debt": 60.0"#, r#""debt": 300.0"#);
        assert!(ReferenceTables::from_json_str(&at_ceiling).is_ok());
    }

    #[test]
    fn rejects_total_output_collapse_in_baseline() {
        let growth = minimal_json("[55.0, 70.0]", 0.0, "em_ig")
            .replace(r#""growth": 2.0"#, r#""growth": -100.0"#);
        assert_table_error(&growth, "above -100");

        let inflation = minimal_json("[55.0, 70.0]", 0.0, "em_ig")
            .replace(r#""inflation": 3.0"#, r#""inflation": -120.0"#);
        assert_table_error(&inflation, "above -100");
    }

    #[test]
    fn rejects_non_zero_none_reform() {
        assert_table_error(&minimal_json("[55.0, 70.0]", 0.5, "em_ig"), "'none'");
    }

    #[test]
    fn rejects_country_without_regime_parameters() {
        assert_table_error(&minimal_json("[55.0, 70.0]", 0.0, "frontier"), "frontier");
    }

    #[test]
    fn rejects_wrong_regime_array_length() {
        let json = minimal_json("[55.0, 70.0]", 0.0, "em_ig")
            .replace("[2.5, 3.5, 5.0]", "[2.5, 3.5]");
        assert!(matches!(
            ReferenceTables::from_json_str(&json),
            Err(DsaError::Json(_))
        ));
    }
}
