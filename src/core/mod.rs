mod aggregate;
mod analysis;
mod engine;
mod error;
mod gap;
mod shocks;
mod tables;
mod types;

pub use aggregate::{BANDS, aggregate, exceedance, risk_summary};
pub use analysis::{category_summary, compare_reforms, fiscal_gap, project, simulate};
pub use engine::{DEBT_CEILING, DEBT_FLOOR, Ensemble, TrialContext, run_ensemble, simulate_trial};
pub use error::DsaError;
pub use shocks::{
    BoxMuller, ScriptedShocks, SeededShocks, ShockSource, ShockStream, UniformSource, Xorshift,
    ZeroShocks, clock_seed, derive_seed,
};
pub use tables::ReferenceTables;
pub use types::{
    Classification, CountryProfile, CountrySummary, DEFAULT_BASELINE_YEAR, DEFAULT_HORIZON_YEARS,
    DEFAULT_TRIALS, FiscalGapResult, NO_REFORM_ID, Projection, ProjectionPoint, ReformComparison,
    ReformPolicy, ReformPreset, Regime, RegimeParameters, RiskSummary, SimulationRequest,
    VolatilityProfile,
};
