use tracing::debug;

use super::aggregate::{aggregate, risk_summary};
use super::engine::{TrialContext, run_ensemble};
use super::error::DsaError;
use super::gap;
use super::shocks::ShockSource;
use super::tables::ReferenceTables;
use super::types::{
    Classification, CountrySummary, FiscalGapResult, Projection, ProjectionPoint,
    ReformComparison, SimulationRequest,
};

fn validate_run(horizon_years: u32, trials: u32) -> Result<(), DsaError> {
    if horizon_years == 0 {
        return Err(DsaError::InvalidParameter(
            "horizon years must be > 0".to_string(),
        ));
    }
    if trials == 0 {
        return Err(DsaError::InvalidParameter("trials must be > 0".to_string()));
    }
    Ok(())
}

/// Percentile bands for `horizon_years + 1` years starting at the country's
/// baseline year.
pub fn simulate<S: ShockSource>(
    tables: &ReferenceTables,
    request: &SimulationRequest,
    shocks: &S,
) -> Result<Vec<ProjectionPoint>, DsaError> {
    Ok(project(tables, request, shocks)?.points)
}

/// Like [`simulate`], plus terminal-year exceedance probabilities.
pub fn project<S: ShockSource>(
    tables: &ReferenceTables,
    request: &SimulationRequest,
    shocks: &S,
) -> Result<Projection, DsaError> {
    let country = tables.country(&request.country_id)?;
    let preset = tables.reform(&request.scenario_id)?;
    validate_run(request.horizon_years, request.trials)?;
    let regime = tables.regime(country.classification)?;
    let volatility = tables.volatility(country.classification)?;

    let ctx = TrialContext {
        country,
        regime,
        volatility,
        reform: &preset.policy,
    };
    let ensemble = run_ensemble(&ctx, request.horizon_years, request.trials, shocks);
    let points = aggregate(&ensemble, country.baseline_year);
    let risk = risk_summary(&ensemble, regime.thresholds);
    debug!(
        country = %country.id,
        scenario = %preset.id,
        terminal_median = ?points.last().map(|p| p.median),
        "projection complete"
    );

    Ok(Projection {
        country: country.id.clone(),
        scenario: preset.id.clone(),
        points,
        risk,
    })
}

pub fn fiscal_gap(tables: &ReferenceTables, country_id: &str) -> Result<FiscalGapResult, DsaError> {
    let country = tables.country(country_id)?;
    let regime = tables.regime(country.classification)?;
    Ok(gap::compute(country, regime))
}

/// Runs every reform preset for one country, in table order, with the same
/// shock source so the scenarios differ only in policy.
pub fn compare_reforms<S: ShockSource>(
    tables: &ReferenceTables,
    country_id: &str,
    horizon_years: u32,
    trials: u32,
    shocks: &S,
) -> Result<Vec<ReformComparison>, DsaError> {
    tables.country(country_id)?;
    validate_run(horizon_years, trials)?;

    tables
        .reforms()
        .iter()
        .map(|preset| {
            let request = SimulationRequest {
                country_id: country_id.to_string(),
                scenario_id: preset.id.clone(),
                horizon_years,
                trials,
            };
            let projection = project(tables, &request, shocks)?;
            let terminal = projection
                .terminal()
                .copied()
                .ok_or_else(|| DsaError::InvalidParameter("empty projection".to_string()))?;
            Ok(ReformComparison {
                scenario: preset.id.clone(),
                name: preset.name.clone(),
                terminal_median: terminal.median,
                terminal_p5: terminal.p5,
                terminal_p95: terminal.p95,
                prob_above_100: projection.risk.prob_above_100,
            })
        })
        .collect()
}

/// One row per country (optionally one classification), riskiest first by
/// P(debt > 100) at the horizon.
pub fn category_summary<S: ShockSource>(
    tables: &ReferenceTables,
    category: Option<Classification>,
    scenario_id: &str,
    horizon_years: u32,
    trials: u32,
    shocks: &S,
) -> Result<Vec<CountrySummary>, DsaError> {
    tables.reform(scenario_id)?;
    validate_run(horizon_years, trials)?;

    let mut rows = tables
        .countries()
        .iter()
        .filter(|c| category.is_none_or(|class| c.classification == class))
        .map(|country| {
            let request = SimulationRequest {
                country_id: country.id.clone(),
                scenario_id: scenario_id.to_string(),
                horizon_years,
                trials,
            };
            let projection = project(tables, &request, shocks)?;
            Ok(CountrySummary {
                country: country.id.clone(),
                name: country.name.clone(),
                classification: country.classification,
                baseline_debt: country.debt,
                terminal_median: projection.terminal().map(|p| p.median).unwrap_or(country.debt),
                prob_above_100: projection.risk.prob_above_100,
            })
        })
        .collect::<Result<Vec<_>, DsaError>>()?;

    rows.sort_by(|a, b| {
        b.prob_above_100
            .total_cmp(&a.prob_above_100)
            .then_with(|| a.country.cmp(&b.country))
    });
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shocks::{SeededShocks, ZeroShocks};
    use crate::core::types::{CountryProfile, ReformPreset, RegimeParameters, VolatilityProfile};
    use proptest::prelude::{any, prop_assert, prop_assert_eq, proptest};

    fn builtin() -> ReferenceTables {
        ReferenceTables::builtin().expect("builtin tables are valid")
    }

    fn request(
        country: &str,
        scenario: &str,
        horizon_years: u32,
        trials: u32,
    ) -> SimulationRequest {
        SimulationRequest {
            country_id: country.to_string(),
            scenario_id: scenario.to_string(),
            horizon_years,
            trials,
        }
    }

    fn single_country_tables(debt: f64, primary_balance: f64) -> ReferenceTables {
        let builtin = builtin();
        ReferenceTables::new(
            vec![CountryProfile {
                id: "testland".to_string(),
                name: "Testland".to_string(),
                classification: Classification::EmIg,
                baseline_year: 2030,
                debt,
                growth: 3.4,
                inflation: 4.4,
                primary_balance,
            }],
            vec![RegimeParameters {
                classification: Classification::EmIg,
                thresholds: [55.0, 70.0],
                base_rates: [2.5, 3.5, 5.0],
                rate_sensitivity: [0.0, 0.05, 0.08],
                growth_adjustment: [0.0, -0.3, -0.8],
            }],
            vec![VolatilityProfile {
                classification: Classification::EmIg,
                growth: 2.5,
                inflation: 1.5,
                primary_balance: 1.5,
            }],
            builtin.reforms().to_vec(),
        )
        .expect("valid tables")
    }

    #[test]
    fn defaults_are_ten_years_and_five_hundred_trials() {
        let req = SimulationRequest::new("brazil", "none");
        assert_eq!(req.horizon_years, 10);
        assert_eq!(req.trials, 500);
        let points = simulate(&builtin(), &req, &SeededShocks::new(1)).expect("valid run");
        assert_eq!(points.len(), 11);
        assert_eq!(points[0].year, 2024);
        assert_eq!(points[10].year, 2034);
    }

    #[test]
    fn rejects_unknown_ids_and_empty_runs() {
        let tables = builtin();
        let shocks = ZeroShocks;
        assert!(matches!(
            simulate(&tables, &request("atlantis", "none", 10, 10), &shocks),
            Err(DsaError::InvalidCountry(_))
        ));
        assert!(matches!(
            simulate(&tables, &request("brazil", "default", 10, 10), &shocks),
            Err(DsaError::InvalidScenario(_))
        ));
        assert!(matches!(
            simulate(&tables, &request("brazil", "none", 0, 10), &shocks),
            Err(DsaError::InvalidParameter(_))
        ));
        assert!(matches!(
            simulate(&tables, &request("brazil", "none", 10, 0), &shocks),
            Err(DsaError::InvalidParameter(_))
        ));
        assert!(matches!(
            fiscal_gap(&tables, "atlantis"),
            Err(DsaError::InvalidCountry(_))
        ));
    }

    #[test]
    fn zero_shocks_collapse_every_band_onto_one_path() {
        let tables = builtin();
        let points = simulate(&tables, &request("france", "moderate", 12, 25), &ZeroShocks)
            .expect("valid run");
        for point in &points {
            let bands = point.bands();
            assert!(bands.iter().all(|&v| v == point.median), "{point:?}");
        }
    }

    #[test]
    fn zero_shock_year_one_median_matches_hand_calculation() {
        let tables = single_country_tables(87.6, -0.4);
        let points = simulate(&tables, &request("testland", "none", 10, 50), &ZeroShocks)
            .expect("valid run");

        // Prior-year debt 87.6 >= 70, so regime 2 applies in year one.
        let adj_pb = (-0.4 + 0.3) / 100.0;
        let r = ((5.0 + (87.6 - 55.0) * 0.08) / 100.0_f64).max(0.015);
        let g_real = (3.4 - 0.8 + 0.0) / 100.0;
        let g_nom = (1.0 + g_real) * (1.0 + 4.4 / 100.0) - 1.0;
        let expected = (87.6 / 100.0 * (1.0 + r) / (1.0 + g_nom) - adj_pb) * 100.0;

        assert_eq!(points[0].median, 87.6);
        assert_eq!(points[1].year, 2031);
        assert!(
            (points[1].median - expected).abs() <= 0.05 + 1e-9,
            "engine {} vs hand {expected}",
            points[1].median
        );
        assert_eq!(points[1].median, 88.1);
    }

    #[test]
    fn same_seed_reproduces_projection() {
        let tables = builtin();
        let req = request("south_africa", "mild", 10, 200);
        let a = project(&tables, &req, &SeededShocks::new(2024)).expect("valid run");
        let b = project(&tables, &req, &SeededShocks::new(2024)).expect("valid run");
        assert_eq!(a.points, b.points);
        assert_eq!(a.risk, b.risk);
    }

    #[test]
    fn stronger_reforms_lower_median_debt() {
        let tables = builtin();
        let shocks = SeededShocks::new(42);
        for country in ["brazil", "united_states", "france", "india"] {
            let rows = compare_reforms(&tables, country, 10, 4_000, &shocks).expect("valid run");
            let median = |id: &str| {
                rows.iter()
                    .find(|r| r.scenario == id)
                    .map(|r| r.terminal_median)
                    .expect("preset present")
            };
            assert!(median("aggressive") <= median("moderate"), "{country}: {rows:?}");
            assert!(median("moderate") <= median("mild"), "{country}: {rows:?}");
            assert!(median("mild") <= median("none"), "{country}: {rows:?}");
        }
    }

    #[test]
    fn fiscal_gap_signs_follow_fiscal_position() {
        let tables = builtin();
        let us = fiscal_gap(&tables, "united_states").expect("known country");
        assert!(us.fiscal_gap > 0.0, "{us:?}");

        let surplus = single_country_tables(30.0, 6.0);
        let low = fiscal_gap(&surplus, "testland").expect("known country");
        assert!(low.fiscal_gap < 0.5, "{low:?}");
    }

    #[test]
    fn category_summary_filters_and_sorts_by_risk() {
        let tables = builtin();
        let rows = category_summary(
            &tables,
            Some(Classification::Frontier),
            "none",
            10,
            200,
            &SeededShocks::new(5),
        )
        .expect("valid run");
        assert_eq!(rows.len(), tables.countries_in(Classification::Frontier).len());
        assert!(rows.iter().all(|r| r.classification == Classification::Frontier));
        for pair in rows.windows(2) {
            assert!(pair[0].prob_above_100 >= pair[1].prob_above_100);
        }

        let all = category_summary(&tables, None, "none", 5, 50, &ZeroShocks).expect("valid run");
        assert_eq!(all.len(), tables.countries().len());
        assert!(matches!(
            category_summary(&tables, None, "bogus", 5, 50, &ZeroShocks),
            Err(DsaError::InvalidScenario(_))
        ));
    }

    #[test]
    fn custom_reform_table_is_honoured() {
        let mut reforms = builtin().reforms().to_vec();
        reforms.push(ReformPreset {
            id: "extreme".to_string(),
            name: "Extreme".to_string(),
            policy: crate::core::types::ReformPolicy {
                pb_improvement: 10.0,
                growth_boost: 0.0,
                rate_reduction: 0.0,
            },
        });
        let base = single_country_tables(87.6, -0.4);
        let tables = ReferenceTables::new(
            base.countries().to_vec(),
            vec![base.regime(Classification::EmIg).expect("em_ig").clone()],
            vec![base.volatility(Classification::EmIg).expect("em_ig").clone()],
            reforms,
        )
        .expect("valid tables");
        let rows = compare_reforms(&tables, "testland", 10, 10, &ZeroShocks).expect("valid run");
        assert_eq!(rows.len(), 5);
        assert!(rows[4].terminal_median < rows[0].terminal_median);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(24))]

        #[test]
        fn prop_projection_shape_and_band_order(
            seed in any::<u64>(),
            country_idx in 0usize..19,
            scenario_idx in 0usize..4,
            horizon in 1u32..25,
            trials in 1u32..120
        ) {
            let tables = builtin();
            let country = &tables.countries()[country_idx % tables.countries().len()];
            let scenario = &tables.reforms()[scenario_idx % tables.reforms().len()];
            let req = request(&country.id, &scenario.id, horizon, trials);
            let projection = project(&tables, &req, &SeededShocks::new(seed)).expect("valid run");

            prop_assert_eq!(projection.points.len(), horizon as usize + 1);
            for (t, point) in projection.points.iter().enumerate() {
                prop_assert_eq!(point.year, country.baseline_year + t as i32);
                let bands = point.bands();
                for pair in bands.windows(2) {
                    prop_assert!(pair[0] <= pair[1]);
                }
                prop_assert!(bands.iter().all(|v| (0.0..=300.0).contains(v)));
            }
            let risk = projection.risk;
            prop_assert!((0.0..=100.0).contains(&risk.prob_above_100));
            prop_assert!(risk.prob_above_150 <= risk.prob_above_100);
        }
    }
}
