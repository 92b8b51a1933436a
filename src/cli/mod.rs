use std::fmt::Write as _;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;

use crate::api::{RunOptions, run_http_server};
use crate::core::{
    Classification, CountrySummary, DEFAULT_HORIZON_YEARS, DEFAULT_TRIALS, DsaError,
    FiscalGapResult, NO_REFORM_ID, Projection, ReferenceTables, ReformComparison,
    SimulationRequest, category_summary, compare_reforms, fiscal_gap, project,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliClassification {
    #[value(name = "developed")]
    Developed,
    #[value(name = "japan_special")]
    JapanSpecial,
    #[value(name = "em_ig")]
    EmIg,
    #[value(name = "em_hy")]
    EmHy,
    #[value(name = "frontier")]
    Frontier,
}

impl From<CliClassification> for Classification {
    fn from(value: CliClassification) -> Self {
        match value {
            CliClassification::Developed => Classification::Developed,
            CliClassification::JapanSpecial => Classification::JapanSpecial,
            CliClassification::EmIg => Classification::EmIg,
            CliClassification::EmHy => Classification::EmHy,
            CliClassification::Frontier => Classification::Frontier,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "dsa",
    about = "Monte Carlo sovereign debt sustainability analysis (debt fan charts + fiscal gap)"
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        help = "Reference tables JSON file; defaults to the built-in calibration"
    )]
    pub tables: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List countries by classification and the reform presets.
    List,
    /// Project one country's debt path under a reform preset.
    Simulate {
        country: String,
        #[arg(default_value = NO_REFORM_ID)]
        scenario: String,
        #[command(flatten)]
        run: RunArgs,
        #[arg(long)]
        json: bool,
    },
    /// Debt-stabilizing primary balance and fiscal gap.
    Gap {
        country: String,
        #[arg(long)]
        json: bool,
    },
    /// Run every reform preset for one country.
    Compare {
        country: String,
        #[command(flatten)]
        run: RunArgs,
        #[arg(long)]
        json: bool,
    },
    /// Terminal-year risk for every country, riskiest first.
    Summary {
        #[arg(long, value_enum)]
        category: Option<CliClassification>,
        #[arg(long, default_value = NO_REFORM_ID)]
        scenario: String,
        #[command(flatten)]
        run: RunArgs,
        #[arg(long)]
        json: bool,
    },
    /// Serve the JSON HTTP API.
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

#[derive(Args, Debug, Clone, Copy)]
pub struct RunArgs {
    #[arg(long, default_value_t = DEFAULT_HORIZON_YEARS, help = "Projection horizon in years")]
    pub horizon: u32,
    #[arg(long, default_value_t = DEFAULT_TRIALS, help = "Monte Carlo trials")]
    pub trials: u32,
    #[arg(long, help = "Shock seed; drawn from the clock when omitted")]
    pub seed: Option<u64>,
}

impl RunArgs {
    fn resolve(self) -> Result<RunOptions, DsaError> {
        RunOptions::resolve(Some(self.horizon), Some(self.trials), self.seed)
    }
}

pub fn load_tables(path: Option<&PathBuf>) -> Result<ReferenceTables, DsaError> {
    match path {
        Some(path) => ReferenceTables::from_path(path),
        None => ReferenceTables::builtin(),
    }
}

pub async fn run(cli: Cli) -> Result<(), DsaError> {
    let tables = load_tables(cli.tables.as_ref())?;

    match cli.command {
        Command::List => print!("{}", render_listing(&tables)),
        Command::Simulate {
            country,
            scenario,
            run,
            json,
        } => {
            let options = run.resolve()?;
            let request = SimulationRequest {
                country_id: country,
                scenario_id: scenario,
                horizon_years: options.horizon_years,
                trials: options.trials,
            };
            let projection = project(&tables, &request, &options.shocks())?;
            if json {
                print_json(&projection)?;
            } else {
                print!("{}", render_projection(&tables, &projection, &options)?);
            }
        }
        Command::Gap { country, json } => {
            let gap = fiscal_gap(&tables, &country)?;
            if json {
                print_json(&gap)?;
            } else {
                print!("{}", render_gap(&tables, &country, &gap)?);
            }
        }
        Command::Compare { country, run, json } => {
            let options = run.resolve()?;
            let rows = compare_reforms(
                &tables,
                &country,
                options.horizon_years,
                options.trials,
                &options.shocks(),
            )?;
            if json {
                print_json(&rows)?;
            } else {
                print!("{}", render_comparison(&country, &rows, &options));
            }
        }
        Command::Summary {
            category,
            scenario,
            run,
            json,
        } => {
            let options = run.resolve()?;
            let rows = category_summary(
                &tables,
                category.map(Classification::from),
                &scenario,
                options.horizon_years,
                options.trials,
                &options.shocks(),
            )?;
            if json {
                print_json(&rows)?;
            } else {
                print!("{}", render_summary(&rows, &options));
            }
        }
        Command::Serve { port } => run_http_server(port, tables).await?,
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), DsaError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn rule() -> String {
    "=".repeat(50)
}

pub fn render_listing(tables: &ReferenceTables) -> String {
    let mut out = String::from("Available countries:\n");
    for class in Classification::ALL {
        let ids: Vec<&str> = tables
            .countries_in(class)
            .into_iter()
            .map(|c| c.id.as_str())
            .collect();
        if ids.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n  {}:", class.as_str().to_uppercase());
        let _ = writeln!(out, "    {}", ids.join(", "));
    }
    out.push_str("\nReform scenarios:\n");
    for preset in tables.reforms() {
        let p = &preset.policy;
        let _ = writeln!(
            out,
            "  {:<11} {:<13} pb +{:.2}pp  growth {:+.2}pp  rates -{:.2}pp",
            preset.id, preset.name, p.pb_improvement, p.growth_boost, p.rate_reduction
        );
    }
    out
}

pub fn render_projection(
    tables: &ReferenceTables,
    projection: &Projection,
    options: &RunOptions,
) -> Result<String, DsaError> {
    let country = tables.country(&projection.country)?;
    let preset = tables.reform(&projection.scenario)?;
    let risk = &projection.risk;
    let [t_low, t_high] = risk.thresholds;

    let mut out = String::new();
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(out, "{} - {}", country.name.to_uppercase(), preset.name);
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(out, "Initial debt: {:.1}%", country.debt);
    let _ = writeln!(out, "Thresholds: {t_low}% / {t_high}%");
    let _ = writeln!(out, "Trials: {}  Seed: {}", options.trials, options.seed);
    let _ = writeln!(
        out,
        "\n{:>6} {:>7} {:>7} {:>7} {:>7} {:>7} {:>7} {:>7}",
        "Year", "p5", "p10", "p25", "median", "p75", "p90", "p95"
    );
    for point in &projection.points {
        let _ = writeln!(
            out,
            "{:>6} {:>7.1} {:>7.1} {:>7.1} {:>7.1} {:>7.1} {:>7.1} {:>7.1}",
            point.year,
            point.p5,
            point.p10,
            point.p25,
            point.median,
            point.p75,
            point.p90,
            point.p95
        );
    }
    if let Some(last) = projection.terminal() {
        let _ = writeln!(out, "\nAfter {} years:", options.horizon_years);
        let _ = writeln!(out, "  Median: {:.1}%", last.median);
        let _ = writeln!(out, "  90% CI: [{:.1}%, {:.1}%]", last.p5, last.p95);
    }
    let _ = writeln!(out, "\nProbabilities:");
    let _ = writeln!(out, "  P(>{t_high}%): {:.0}%", risk.prob_above_high_threshold);
    let _ = writeln!(out, "  P(>100%): {:.0}%", risk.prob_above_100);
    let _ = writeln!(out, "  P(>150%): {:.0}%", risk.prob_above_150);
    Ok(out)
}

pub fn render_gap(
    tables: &ReferenceTables,
    country_id: &str,
    gap: &FiscalGapResult,
) -> Result<String, DsaError> {
    let country = tables.country(country_id)?;
    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", country.name, country.classification);
    let _ = writeln!(out, "  Debt:                      {:>7.1}% of GDP", country.debt);
    let _ = writeln!(
        out,
        "  Regime:                    {:>7}",
        gap.regime.index()
    );
    let _ = writeln!(
        out,
        "  Interest rate:             {:>7.2}%",
        gap.interest_rate * 100.0
    );
    let _ = writeln!(
        out,
        "  Nominal growth:            {:>7.2}%",
        gap.nominal_growth * 100.0
    );
    let _ = writeln!(
        out,
        "  Debt-stabilizing balance:  {:>7.2}% of GDP",
        gap.stabilizing_primary_balance
    );
    let _ = writeln!(
        out,
        "  Actual primary balance:    {:>7.2}% of GDP",
        gap.actual_primary_balance
    );
    let verdict = if gap.fiscal_gap > 0.0 {
        "consolidation needed"
    } else {
        "debt stabilizing"
    };
    let _ = writeln!(
        out,
        "  Fiscal gap:                {:>7.2}pp ({verdict})",
        gap.fiscal_gap
    );
    Ok(out)
}

pub fn render_comparison(
    country_id: &str,
    rows: &[ReformComparison],
    options: &RunOptions,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(out, "{}: REFORM COMPARISON", country_id.to_uppercase());
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(
        out,
        "{:<14} {:>8} {:>8} {:>8} {:>9}",
        "Scenario", "Median", "p5", "p95", "P(>100%)"
    );
    for row in rows {
        let _ = writeln!(
            out,
            "{:<14} {:>8.0} {:>8.0} {:>8.0} {:>9.0}",
            row.name, row.terminal_median, row.terminal_p5, row.terminal_p95, row.prob_above_100
        );
    }
    let _ = writeln!(
        out,
        "\nHorizon {} years, {} trials, seed {}",
        options.horizon_years, options.trials, options.seed
    );
    out
}

pub fn render_summary(rows: &[CountrySummary], options: &RunOptions) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(out, "SUMMARY");
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(
        out,
        "{:<16} {:<14} {:>6} {:>7} {:>9}",
        "Country", "Category", "Debt0", "Median", "P(>100%)"
    );
    for row in rows {
        let _ = writeln!(
            out,
            "{:<16} {:<14} {:>6.0} {:>7.0} {:>9.0}",
            row.name,
            row.classification.as_str(),
            row.baseline_debt,
            row.terminal_median,
            row.prob_above_100
        );
    }
    let _ = writeln!(
        out,
        "\nHorizon {} years, {} trials, seed {}",
        options.horizon_years, options.trials, options.seed
    );
    out
}
