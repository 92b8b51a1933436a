use super::types::{CountryProfile, FiscalGapResult, RegimeParameters};

/// Point-in-time debt-stabilizing primary balance. Uses the regime of the
/// current debt level and its base rate only: no risk premium, no reform.
pub fn compute(country: &CountryProfile, params: &RegimeParameters) -> FiscalGapResult {
    let nominal_growth = (1.0 + country.growth / 100.0) * (1.0 + country.inflation / 100.0) - 1.0;
    let regime = params.classify(country.debt);
    let rate = params.base_rates[regime.index()] / 100.0;

    let stabilizing =
        (rate - nominal_growth) / (1.0 + nominal_growth) * (country.debt / 100.0) * 100.0;

    FiscalGapResult {
        regime,
        interest_rate: rate,
        nominal_growth,
        stabilizing_primary_balance: stabilizing,
        actual_primary_balance: country.primary_balance,
        fiscal_gap: stabilizing - country.primary_balance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Classification, Regime};

    fn developed() -> RegimeParameters {
        RegimeParameters {
            classification: Classification::Developed,
            thresholds: [90.0, 120.0],
            base_rates: [1.0, 1.5, 2.5],
            rate_sensitivity: [0.0, 0.02, 0.04],
            growth_adjustment: [0.0, -0.2, -0.5],
        }
    }

    fn country(debt: f64, growth: f64, inflation: f64, primary_balance: f64) -> CountryProfile {
        CountryProfile {
            id: "c".to_string(),
            name: "C".to_string(),
            classification: Classification::Developed,
            baseline_year: 2024,
            debt,
            growth,
            inflation,
            primary_balance,
        }
    }

    #[test]
    fn matches_closed_form() {
        let result = compute(&country(100.0, 1.0, 2.0, -1.0), &developed());
        let g = 1.01 * 1.02 - 1.0;
        let expected = (0.015 - g) / (1.0 + g) * 100.0;
        assert_eq!(result.regime, Regime::Elevated);
        assert!((result.stabilizing_primary_balance - expected).abs() < 1e-12);
        assert!((result.fiscal_gap - (expected + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn deficit_above_high_threshold_needs_consolidation() {
        let result = compute(&country(130.0, 0.5, 1.0, -5.0), &developed());
        assert_eq!(result.regime, Regime::High);
        assert!(result.fiscal_gap > 0.0, "gap {}", result.fiscal_gap);
    }

    #[test]
    fn large_surplus_with_low_debt_has_no_gap() {
        let result = compute(&country(30.0, 2.0, 2.0, 4.0), &developed());
        assert_eq!(result.regime, Regime::Low);
        assert!(result.fiscal_gap <= 0.0, "gap {}", result.fiscal_gap);
    }

    #[test]
    fn regime_uses_current_debt_with_half_open_bands() {
        let at_threshold = compute(&country(90.0, 1.0, 2.0, 0.0), &developed());
        assert_eq!(at_threshold.regime, Regime::Elevated);
        assert!((at_threshold.interest_rate - 0.015).abs() < 1e-15);
    }
}
