use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Json, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::core::{
    Classification, CountryProfile, CountrySummary, DEFAULT_HORIZON_YEARS, DEFAULT_TRIALS,
    DsaError, FiscalGapResult, NO_REFORM_ID, Projection, ReferenceTables, ReformComparison,
    ReformPreset, SeededShocks, SimulationRequest, category_summary, clock_seed, compare_reforms,
    fiscal_gap, project,
};

pub const MAX_HORIZON_YEARS: u32 = 50;
pub const MAX_TRIALS: u32 = 100_000;

/// Run-size options shared by the HTTP and command-line hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub horizon_years: u32,
    pub trials: u32,
    pub seed: u64,
}

impl RunOptions {
    /// Applies defaults and host-level bounds. A missing seed is drawn from the
    /// clock and reported back so the run can be replayed.
    pub fn resolve(
        horizon_years: Option<u32>,
        trials: Option<u32>,
        seed: Option<u64>,
    ) -> Result<Self, DsaError> {
        let horizon_years = horizon_years.unwrap_or(DEFAULT_HORIZON_YEARS);
        let trials = trials.unwrap_or(DEFAULT_TRIALS);
        if horizon_years == 0 || horizon_years > MAX_HORIZON_YEARS {
            return Err(DsaError::InvalidParameter(format!(
                "horizonYears must be between 1 and {MAX_HORIZON_YEARS}"
            )));
        }
        if trials == 0 || trials > MAX_TRIALS {
            return Err(DsaError::InvalidParameter(format!(
                "trials must be between 1 and {MAX_TRIALS}"
            )));
        }
        Ok(Self {
            horizon_years,
            trials,
            seed: seed.unwrap_or_else(clock_seed),
        })
    }

    pub fn shocks(&self) -> SeededShocks {
        SeededShocks::new(self.seed)
    }
}

#[derive(Clone)]
struct AppState {
    tables: Arc<ReferenceTables>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    country: Option<String>,
    scenario: Option<String>,
    horizon_years: Option<u32>,
    trials: Option<u32>,
    seed: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct FiscalGapQuery {
    country: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ComparePayload {
    country: Option<String>,
    horizon_years: Option<u32>,
    trials: Option<u32>,
    seed: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SummaryPayload {
    category: Option<Classification>,
    scenario: Option<String>,
    horizon_years: Option<u32>,
    trials: Option<u32>,
    seed: Option<u64>,
}

#[derive(Debug)]
struct SimulateApiRequest {
    request: SimulationRequest,
    options: RunOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CategoryListing {
    classification: Classification,
    countries: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CountriesResponse<'a> {
    countries: &'a [CountryProfile],
    categories: Vec<CategoryListing>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScenariosResponse<'a> {
    scenarios: &'a [ReformPreset],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    country_name: String,
    scenario_name: String,
    horizon_years: u32,
    trials: u32,
    seed: u64,
    #[serde(flatten)]
    projection: Projection,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FiscalGapResponse {
    country: String,
    country_name: String,
    classification: Classification,
    #[serde(flatten)]
    gap: FiscalGapResult,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompareResponse {
    country: String,
    horizon_years: u32,
    trials: u32,
    seed: u64,
    scenarios: Vec<ReformComparison>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResponse {
    category: Option<Classification>,
    scenario: String,
    horizon_years: u32,
    trials: u32,
    seed: u64,
    countries: Vec<CountrySummary>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn router(tables: Arc<ReferenceTables>) -> Router {
    Router::new()
        .route("/api/countries", get(countries_handler))
        .route("/api/scenarios", get(scenarios_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route("/api/fiscal-gap", get(fiscal_gap_handler))
        .route("/api/compare", get(compare_handler))
        .route("/api/summary", get(summary_handler))
        .fallback(not_found_handler)
        .with_state(AppState { tables })
}

pub async fn run_http_server(port: u16, tables: ReferenceTables) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(Arc::new(tables));

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "DSA HTTP API listening");
    info!("local access: http://127.0.0.1:{port}/api/countries");

    axum::serve(listener, app).await
}

async fn countries_handler(State(state): State<AppState>) -> Response {
    let tables = &state.tables;
    let categories = Classification::ALL
        .into_iter()
        .map(|classification| CategoryListing {
            classification,
            countries: tables
                .countries_in(classification)
                .into_iter()
                .map(|c| c.id.clone())
                .collect(),
        })
        .filter(|listing| !listing.countries.is_empty())
        .collect();
    json_response(
        StatusCode::OK,
        CountriesResponse {
            countries: tables.countries(),
            categories,
        },
    )
}

async fn scenarios_handler(State(state): State<AppState>) -> Response {
    json_response(
        StatusCode::OK,
        ScenariosResponse {
            scenarios: state.tables.reforms(),
        },
    )
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(
    State(state): State<AppState>,
    Query(payload): Query<SimulatePayload>,
) -> Response {
    simulate_handler_impl(state, payload).await
}

async fn simulate_post_handler(
    State(state): State<AppState>,
    Json(payload): Json<SimulatePayload>,
) -> Response {
    simulate_handler_impl(state, payload).await
}

async fn simulate_handler_impl(state: AppState, payload: SimulatePayload) -> Response {
    let api_request = match simulate_request_from_payload(payload) {
        Ok(request) => request,
        Err(err) => return dsa_error_response(&err),
    };
    run_blocking(move || build_simulate_response(&state.tables, &api_request)).await
}

async fn fiscal_gap_handler(
    State(state): State<AppState>,
    Query(query): Query<FiscalGapQuery>,
) -> Response {
    let Some(country_id) = query.country else {
        return error_response(StatusCode::BAD_REQUEST, "country is required");
    };
    match build_fiscal_gap_response(&state.tables, &country_id) {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(err) => dsa_error_response(&err),
    }
}

async fn compare_handler(
    State(state): State<AppState>,
    Query(payload): Query<ComparePayload>,
) -> Response {
    let Some(country_id) = payload.country else {
        return error_response(StatusCode::BAD_REQUEST, "country is required");
    };
    let options = match RunOptions::resolve(payload.horizon_years, payload.trials, payload.seed) {
        Ok(options) => options,
        Err(err) => return dsa_error_response(&err),
    };
    run_blocking(move || {
        let scenarios = compare_reforms(
            &state.tables,
            &country_id,
            options.horizon_years,
            options.trials,
            &options.shocks(),
        )?;
        Ok(CompareResponse {
            country: country_id,
            horizon_years: options.horizon_years,
            trials: options.trials,
            seed: options.seed,
            scenarios,
        })
    })
    .await
}

async fn summary_handler(
    State(state): State<AppState>,
    Query(payload): Query<SummaryPayload>,
) -> Response {
    let options = match RunOptions::resolve(payload.horizon_years, payload.trials, payload.seed) {
        Ok(options) => options,
        Err(err) => return dsa_error_response(&err),
    };
    let scenario = payload
        .scenario
        .unwrap_or_else(|| NO_REFORM_ID.to_string());
    let category = payload.category;
    run_blocking(move || {
        let countries = category_summary(
            &state.tables,
            category,
            &scenario,
            options.horizon_years,
            options.trials,
            &options.shocks(),
        )?;
        Ok(SummaryResponse {
            category,
            scenario,
            horizon_years: options.horizon_years,
            trials: options.trials,
            seed: options.seed,
            countries,
        })
    })
    .await
}

/// Simulations are CPU-bound, so they run off the async workers. A client that
/// disconnects just drops the result.
async fn run_blocking<T, F>(job: F) -> Response
where
    F: FnOnce() -> Result<T, DsaError> + Send + 'static,
    T: Serialize + Send + 'static,
{
    match tokio::task::spawn_blocking(job).await {
        Ok(Ok(body)) => json_response(StatusCode::OK, body),
        Ok(Err(err)) => dsa_error_response(&err),
        Err(err) => {
            error!(%err, "simulation task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "simulation task failed")
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

fn error_status(err: &DsaError) -> StatusCode {
    match err {
        DsaError::InvalidCountry(_) | DsaError::InvalidScenario(_) => StatusCode::NOT_FOUND,
        DsaError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
        DsaError::InvalidTable(_) | DsaError::Io(_) | DsaError::Json(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn dsa_error_response(err: &DsaError) -> Response {
    error_response(error_status(err), &err.to_string())
}

#[cfg(test)]
fn simulate_request_from_json(json: &str) -> Result<SimulateApiRequest, DsaError> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| DsaError::InvalidParameter(format!("invalid API JSON payload: {e}")))?;
    simulate_request_from_payload(payload)
}

fn simulate_request_from_payload(payload: SimulatePayload) -> Result<SimulateApiRequest, DsaError> {
    let Some(country_id) = payload.country else {
        return Err(DsaError::InvalidParameter("country is required".to_string()));
    };
    let options = RunOptions::resolve(payload.horizon_years, payload.trials, payload.seed)?;
    let request = SimulationRequest {
        country_id,
        scenario_id: payload
            .scenario
            .unwrap_or_else(|| NO_REFORM_ID.to_string()),
        horizon_years: options.horizon_years,
        trials: options.trials,
    };
    Ok(SimulateApiRequest { request, options })
}

fn build_simulate_response(
    tables: &ReferenceTables,
    api_request: &SimulateApiRequest,
) -> Result<SimulateResponse, DsaError> {
    let request = &api_request.request;
    let country = tables.country(&request.country_id)?;
    let preset = tables.reform(&request.scenario_id)?;
    let projection = project(tables, request, &api_request.options.shocks())?;
    info!(
        country = %country.id,
        scenario = %preset.id,
        trials = request.trials,
        seed = api_request.options.seed,
        "simulation served"
    );
    Ok(SimulateResponse {
        country_name: country.name.clone(),
        scenario_name: preset.name.clone(),
        horizon_years: request.horizon_years,
        trials: request.trials,
        seed: api_request.options.seed,
        projection,
    })
}

fn build_fiscal_gap_response(
    tables: &ReferenceTables,
    country_id: &str,
) -> Result<FiscalGapResponse, DsaError> {
    let country = tables.country(country_id)?;
    let gap = fiscal_gap(tables, country_id)?;
    Ok(FiscalGapResponse {
        country: country.id.clone(),
        country_name: country.name.clone(),
        classification: country.classification,
        gap,
    })
}
