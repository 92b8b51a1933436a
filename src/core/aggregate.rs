use super::engine::Ensemble;
use super::types::{ProjectionPoint, RiskSummary};

pub const BANDS: [f64; 7] = [5.0, 10.0, 25.0, 50.0, 75.0, 90.0, 95.0];

/// Collapses the ensemble into one point per year. Percentiles use
/// nearest-rank indexing `floor(p/100 * (n-1))` on the sorted values, not
/// interpolation.
pub fn aggregate(ensemble: &Ensemble, baseline_year: i32) -> Vec<ProjectionPoint> {
    (0..=ensemble.horizon() as usize)
        .map(|t| {
            let mut values = ensemble.values_at(t);
            values.sort_by(|a, b| a.total_cmp(b));
            let [p5, p10, p25, median, p75, p90, p95] =
                BANDS.map(|p| round_tenth(nearest_rank(&values, p)));
            ProjectionPoint {
                year: baseline_year + t as i32,
                p5,
                p10,
                p25,
                median,
                p75,
                p90,
                p95,
            }
        })
        .collect()
}

fn nearest_rank(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let index = ((p / 100.0) * (sorted.len() - 1) as f64).floor() as usize;
    sorted[index.min(sorted.len() - 1)]
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Share of trials, in percent, whose terminal debt is strictly above `level`.
pub fn exceedance(ensemble: &Ensemble, level: f64) -> f64 {
    if ensemble.trials() == 0 {
        return 0.0;
    }
    let terminal = ensemble.values_at(ensemble.horizon() as usize);
    let above = terminal.iter().filter(|&&d| d > level).count();
    above as f64 / terminal.len() as f64 * 100.0
}

pub fn risk_summary(ensemble: &Ensemble, thresholds: [f64; 2]) -> RiskSummary {
    RiskSummary {
        prob_above_100: exceedance(ensemble, 100.0),
        prob_above_150: exceedance(ensemble, 150.0),
        prob_above_high_threshold: exceedance(ensemble, thresholds[1]),
        thresholds,
    }
}
