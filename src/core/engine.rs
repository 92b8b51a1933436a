use rayon::prelude::*;
use tracing::debug;

use super::shocks::{ShockSource, ShockStream};
use super::types::{CountryProfile, ReformPolicy, Regime, RegimeParameters, VolatilityProfile};

pub const DEBT_FLOOR: f64 = 0.0;
pub const DEBT_CEILING: f64 = 300.0;
const MIN_EFFECTIVE_RATE: f64 = 0.015;
const BASELINE_WEIGHT: f64 = 0.7;
const PERSISTENCE: f64 = 0.3;
const PB_PHASE_YEARS: u32 = 7;
const RATE_PHASE_YEARS: u32 = 4;
const HIGH_DEBT_PB_RESPONSE: f64 = 0.3;

/// Everything a trial needs, borrowed from the reference tables.
#[derive(Debug, Clone, Copy)]
pub struct TrialContext<'a> {
    pub country: &'a CountryProfile,
    pub regime: &'a RegimeParameters,
    pub volatility: &'a VolatilityProfile,
    pub reform: &'a ReformPolicy,
}

/// Debt trajectories, one per trial, each `horizon + 1` long.
#[derive(Debug, Clone)]
pub struct Ensemble {
    paths: Vec<Vec<f64>>,
    horizon: u32,
}

impl Ensemble {
    pub fn from_paths(paths: Vec<Vec<f64>>, horizon: u32) -> Self {
        debug_assert!(paths.iter().all(|p| p.len() == horizon as usize + 1));
        Self { paths, horizon }
    }

    pub fn horizon(&self) -> u32 {
        self.horizon
    }

    pub fn trials(&self) -> usize {
        self.paths.len()
    }

    pub fn paths(&self) -> &[Vec<f64>] {
        &self.paths
    }

    pub fn values_at(&self, year_index: usize) -> Vec<f64> {
        self.paths.iter().map(|p| p[year_index]).collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct MacroState {
    growth: f64,
    inflation: f64,
    primary_balance: f64,
}

impl MacroState {
    fn baseline(country: &CountryProfile) -> Self {
        Self {
            growth: country.growth,
            inflation: country.inflation,
            primary_balance: country.primary_balance,
        }
    }

    fn advance(
        self,
        baseline: &MacroState,
        vol: &VolatilityProfile,
        shocks: &mut impl ShockStream,
    ) -> Self {
        let z_growth = shocks.next_normal();
        let z_inflation = shocks.next_normal();
        let z_pb = shocks.next_normal();
        Self {
            growth: revert(baseline.growth, self.growth) + z_growth * vol.growth,
            inflation: (revert(baseline.inflation, self.inflation) + z_inflation * vol.inflation)
                .max(0.0),
            primary_balance: revert(baseline.primary_balance, self.primary_balance)
                + z_pb * vol.primary_balance,
        }
    }
}

fn revert(baseline: f64, previous: f64) -> f64 {
    BASELINE_WEIGHT * baseline + PERSISTENCE * previous
}

fn phase_in(year: u32, years: u32) -> f64 {
    year.min(years) as f64 / years as f64
}

/// One year of the debt recursion. `prior_debt` and the macro values are in
/// percent; the returned debt is in percent of GDP, clamped to the rails.
fn step_debt(
    params: &RegimeParameters,
    reform: &ReformPolicy,
    year: u32,
    prior_debt: f64,
    state: &MacroState,
) -> f64 {
    let regime = params.classify(prior_debt);
    let idx = regime.index();

    let high_debt_response = if regime == Regime::High {
        HIGH_DEBT_PB_RESPONSE
    } else {
        0.0
    };
    let adjusted_pb = (state.primary_balance
        + reform.pb_improvement * phase_in(year, PB_PHASE_YEARS)
        + high_debt_response)
        / 100.0;

    let base_rate =
        params.base_rates[idx] - reform.rate_reduction * phase_in(year, RATE_PHASE_YEARS);
    let risk_premium =
        ((prior_debt - params.low_threshold()) * params.rate_sensitivity[idx]).max(0.0);
    let rate = ((base_rate + risk_premium) / 100.0).max(MIN_EFFECTIVE_RATE);

    let real_growth = (state.growth + params.growth_adjustment[idx] + reform.growth_boost) / 100.0;
    let nominal_growth = (1.0 + real_growth) * (1.0 + state.inflation / 100.0) - 1.0;

    let next = (prior_debt / 100.0 * (1.0 + rate) / (1.0 + nominal_growth) - adjusted_pb) * 100.0;
    if !next.is_finite() {
        return DEBT_CEILING;
    }
    next.clamp(DEBT_FLOOR, DEBT_CEILING)
}

/// Runs one trial and returns its debt path, starting with the baseline debt.
pub fn simulate_trial(
    ctx: &TrialContext<'_>,
    horizon: u32,
    shocks: &mut impl ShockStream,
) -> Vec<f64> {
    let baseline = MacroState::baseline(ctx.country);
    let mut state = baseline;
    let mut debt = ctx.country.debt;
    let mut path = Vec::with_capacity(horizon as usize + 1);
    path.push(debt);

    for year in 1..=horizon {
        state = state.advance(&baseline, ctx.volatility, shocks);
        debt = step_debt(ctx.regime, ctx.reform, year, debt, &state);
        path.push(debt);
    }
    path
}

/// Runs `trials` independent trials in parallel. Trial `i` always consumes
/// `source.stream(i)`, so the ensemble is identical to a sequential run.
pub fn run_ensemble<S: ShockSource>(
    ctx: &TrialContext<'_>,
    horizon: u32,
    trials: u32,
    source: &S,
) -> Ensemble {
    debug!(
        country = %ctx.country.id,
        horizon,
        trials,
        "running debt path ensemble"
    );
    let paths: Vec<Vec<f64>> = (0..trials)
        .into_par_iter()
        .map(|trial| {
            let mut stream = source.stream(trial);
            simulate_trial(ctx, horizon, &mut stream)
        })
        .collect();
    Ensemble::from_paths(paths, horizon)
}
