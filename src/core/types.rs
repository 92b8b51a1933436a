use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const DEFAULT_HORIZON_YEARS: u32 = 10;
pub const DEFAULT_TRIALS: u32 = 500;
pub const DEFAULT_BASELINE_YEAR: i32 = 2024;
pub const NO_REFORM_ID: &str = "none";

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Developed,
    JapanSpecial,
    EmIg,
    EmHy,
    Frontier,
}

impl Classification {
    pub const ALL: [Classification; 5] = [
        Classification::Developed,
        Classification::JapanSpecial,
        Classification::EmIg,
        Classification::EmHy,
        Classification::Frontier,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Classification::Developed => "developed",
            Classification::JapanSpecial => "japan_special",
            Classification::EmIg => "em_ig",
            Classification::EmHy => "em_hy",
            Classification::Frontier => "frontier",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Classification {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Classification::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown classification '{s}'"))
    }
}

/// Debt band: 0 below the low threshold, 1 between thresholds, 2 at or above
/// the high threshold.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Regime {
    Low,
    Elevated,
    High,
}

impl Regime {
    pub fn index(self) -> usize {
        match self {
            Regime::Low => 0,
            Regime::Elevated => 1,
            Regime::High => 2,
        }
    }
}

fn default_baseline_year() -> i32 {
    DEFAULT_BASELINE_YEAR
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryProfile {
    pub id: String,
    pub name: String,
    pub classification: Classification,
    #[serde(default = "default_baseline_year")]
    pub baseline_year: i32,
    /// Debt/GDP in percent.
    pub debt: f64,
    /// Real GDP growth in percent.
    pub growth: f64,
    pub inflation: f64,
    /// Primary balance in percent of GDP, positive is a surplus.
    pub primary_balance: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegimeParameters {
    pub classification: Classification,
    pub thresholds: [f64; 2],
    pub base_rates: [f64; 3],
    pub rate_sensitivity: [f64; 3],
    pub growth_adjustment: [f64; 3],
}

impl RegimeParameters {
    pub fn low_threshold(&self) -> f64 {
        self.thresholds[0]
    }

    pub fn high_threshold(&self) -> f64 {
        self.thresholds[1]
    }

    /// Half-open bands: `[0, t0)`, `[t0, t1)`, `[t1, inf)`.
    pub fn classify(&self, debt: f64) -> Regime {
        if debt < self.low_threshold() {
            Regime::Low
        } else if debt < self.high_threshold() {
            Regime::Elevated
        } else {
            Regime::High
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolatilityProfile {
    pub classification: Classification,
    pub growth: f64,
    pub inflation: f64,
    pub primary_balance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReformPolicy {
    /// Percentage points of GDP, reached after the primary-balance phase-in.
    pub pb_improvement: f64,
    /// Percentage points of real growth, effective immediately.
    pub growth_boost: f64,
    /// Percentage points off the base rate, reached after the rate phase-in.
    pub rate_reduction: f64,
}

impl ReformPolicy {
    pub const NONE: ReformPolicy = ReformPolicy {
        pb_improvement: 0.0,
        growth_boost: 0.0,
        rate_reduction: 0.0,
    };

    pub fn is_none(&self) -> bool {
        self.pb_improvement == 0.0 && self.growth_boost == 0.0 && self.rate_reduction == 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReformPreset {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub policy: ReformPolicy,
}

#[derive(Debug, Clone)]
pub struct SimulationRequest {
    pub country_id: String,
    pub scenario_id: String,
    pub horizon_years: u32,
    pub trials: u32,
}

impl SimulationRequest {
    pub fn new(country_id: impl Into<String>, scenario_id: impl Into<String>) -> Self {
        Self {
            country_id: country_id.into(),
            scenario_id: scenario_id.into(),
            ..Self::default()
        }
    }
}

impl Default for SimulationRequest {
    fn default() -> Self {
        Self {
            country_id: String::new(),
            scenario_id: NO_REFORM_ID.to_string(),
            horizon_years: DEFAULT_HORIZON_YEARS,
            trials: DEFAULT_TRIALS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionPoint {
    pub year: i32,
    pub p5: f64,
    pub p10: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
}

impl ProjectionPoint {
    pub fn bands(&self) -> [f64; 7] {
        [
            self.p5,
            self.p10,
            self.p25,
            self.median,
            self.p75,
            self.p90,
            self.p95,
        ]
    }
}

/// Terminal-year exceedance shares, in percent of trials.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskSummary {
    pub prob_above_100: f64,
    pub prob_above_150: f64,
    pub prob_above_high_threshold: f64,
    pub thresholds: [f64; 2],
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    pub country: String,
    pub scenario: String,
    pub points: Vec<ProjectionPoint>,
    pub risk: RiskSummary,
}

impl Projection {
    pub fn terminal(&self) -> Option<&ProjectionPoint> {
        self.points.last()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FiscalGapResult {
    pub regime: Regime,
    /// Decimal fraction, e.g. `0.05` for 5%.
    pub interest_rate: f64,
    pub nominal_growth: f64,
    pub stabilizing_primary_balance: f64,
    pub actual_primary_balance: f64,
    pub fiscal_gap: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReformComparison {
    pub scenario: String,
    pub name: String,
    pub terminal_median: f64,
    pub terminal_p5: f64,
    pub terminal_p95: f64,
    pub prob_above_100: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountrySummary {
    pub country: String,
    pub name: String,
    pub classification: Classification,
    pub baseline_debt: f64,
    pub terminal_median: f64,
    pub prob_above_100: f64,
}
