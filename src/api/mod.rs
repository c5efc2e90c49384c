use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{
    Compounding, DelayComparison, EngineError, GoalPlan, GoalResult, ProjectionResult,
    ScenarioInput, SimulationSummary, SolveConfig, SolveResult, TaxResult, apply_ltcg,
    compare_delays, goal_gap, project, simulate, solve_required_contribution, validate,
};

const INDEX_HTML: &str = include_str!("../../web/index.html");
const STYLES_CSS: &str = include_str!("../../web/styles.css");
const APP_JS: &str = include_str!("../../web/app.js");

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliCompounding {
    Nominal,
    Geometric,
}

impl From<CliCompounding> for Compounding {
    fn from(value: CliCompounding) -> Self {
        match value {
            CliCompounding::Nominal => Compounding::Nominal,
            CliCompounding::Geometric => Compounding::Geometric,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiCompounding {
    #[serde(alias = "annual-over-12", alias = "simple")]
    Nominal,
    #[serde(alias = "monthly-root")]
    Geometric,
}

impl From<ApiCompounding> for CliCompounding {
    fn from(value: ApiCompounding) -> Self {
        match value {
            ApiCompounding::Nominal => CliCompounding::Nominal,
            ApiCompounding::Geometric => CliCompounding::Geometric,
        }
    }
}

/// Dashboard parameters in user-facing units: rates in percent,
/// horizons in months, amounts in rupees. The struct doubles as the
/// default set the JSON payload overlays.
#[derive(Parser, Debug)]
#[command(
    name = "wealthsim",
    about = "SIP projection, Monte Carlo risk bands, cost-of-delay and goal planning"
)]
struct Cli {
    #[arg(long, default_value_t = 25_000.0, help = "Monthly SIP contribution")]
    monthly_investment: f64,
    #[arg(long, default_value_t = 12.0, help = "Expected annual return in percent")]
    annual_return: f64,
    #[arg(
        long,
        default_value_t = 15.0,
        help = "Annual return volatility in percent"
    )]
    annual_volatility: f64,
    #[arg(long, default_value_t = 180, help = "Investing horizon in months")]
    horizon_months: u32,
    #[arg(long, default_value_t = 6.0, help = "Annual inflation in percent")]
    inflation_rate: f64,
    #[arg(
        long,
        default_value_t = 125_000.0,
        help = "LTCG exemption threshold on gains"
    )]
    ltcg_exemption: f64,
    #[arg(
        long,
        default_value_t = 12.5,
        help = "LTCG tax rate in percent on gains above the exemption"
    )]
    ltcg_rate: f64,
    #[arg(
        long,
        value_enum,
        default_value_t = CliCompounding::Nominal,
        help = "Monthly-rate convention: nominal (annual/12) or geometric ((1+r)^(1/12)-1)"
    )]
    compounding: CliCompounding,
    #[arg(long, default_value_t = 50, help = "Monte Carlo ensemble size")]
    simulations: u32,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    #[arg(
        long,
        value_delimiter = ',',
        default_values_t = vec![12, 24, 36, 60],
        help = "Delay offsets in months for the cost-of-delay comparison"
    )]
    delay_months: Vec<u32>,
    #[arg(
        long,
        default_value_t = 4_000_000.0,
        help = "Present-day cost of the goal purchase"
    )]
    goal_cost: f64,
    #[arg(
        long,
        default_value_t = 5.0,
        help = "Goal-specific annual inflation in percent"
    )]
    goal_inflation: f64,
    #[arg(
        long,
        help = "Months until the goal purchase; defaults to the investing horizon"
    )]
    goal_horizon_months: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    monthly_investment: Option<f64>,
    annual_return: Option<f64>,
    annual_volatility: Option<f64>,
    horizon_months: Option<u32>,
    inflation_rate: Option<f64>,
    ltcg_exemption: Option<f64>,
    ltcg_rate: Option<f64>,
    compounding: Option<ApiCompounding>,
    simulations: Option<u32>,
    seed: Option<u64>,
    delay_months: Option<Vec<u32>>,
    goal_cost: Option<f64>,
    goal_inflation: Option<f64>,
    goal_horizon_months: Option<u32>,
}

#[derive(Debug)]
struct DashboardRequest {
    scenario: ScenarioInput,
    delays: Vec<u32>,
    goal: GoalPlan,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    projection: ProjectionResult,
    tax: TaxResult,
    simulation: SimulationSummary,
    delay: DelayComparison,
    goal: GoalResult,
    required_contribution: SolveResult,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_inputs(cli: Cli) -> Result<DashboardRequest, String> {
    let scenario = ScenarioInput {
        monthly_contribution: cli.monthly_investment,
        annual_return: cli.annual_return / 100.0,
        annual_volatility: cli.annual_volatility / 100.0,
        horizon_months: cli.horizon_months,
        inflation_rate: cli.inflation_rate / 100.0,
        ltcg_exemption: cli.ltcg_exemption,
        ltcg_rate: cli.ltcg_rate / 100.0,
        compounding: cli.compounding.into(),
        simulations: cli.simulations,
        seed: cli.seed,
    };
    validate(&scenario).map_err(|e| e.to_string())?;

    if !cli.goal_cost.is_finite() || cli.goal_cost < 0.0 {
        return Err("goalCost must be a non-negative amount".to_string());
    }

    if !cli.goal_inflation.is_finite() || cli.goal_inflation <= -100.0 {
        return Err("goalInflation must be a finite percentage above -100".to_string());
    }

    let goal_horizon = cli.goal_horizon_months.unwrap_or(cli.horizon_months);
    if goal_horizon == 0 {
        return Err("goalHorizonMonths must be at least 1".to_string());
    }

    Ok(DashboardRequest {
        scenario,
        delays: cli.delay_months,
        goal: GoalPlan {
            present_cost: cli.goal_cost,
            goal_inflation: cli.goal_inflation / 100.0,
            horizon_months: goal_horizon,
        },
    })
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wealthsim=info,axum=warn".into()),
        )
        .init();

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .route("/styles.css", get(styles_handler))
        .route("/app.js", get(app_js_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("wealth dashboard listening on http://{addr}");

    axum::serve(listener, app).await
}

async fn index_handler() -> impl IntoResponse {
    with_cache_control(Html(INDEX_HTML))
}

async fn styles_handler() -> impl IntoResponse {
    with_cache_control((
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        STYLES_CSS,
    ))
}

async fn app_js_handler() -> impl IntoResponse {
    with_cache_control((
        [(
            header::CONTENT_TYPE,
            "application/javascript; charset=utf-8",
        )],
        APP_JS,
    ))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let request = match dashboard_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => {
            tracing::warn!(error = %msg, "rejected simulate request");
            return error_response(StatusCode::BAD_REQUEST, &msg);
        }
    };

    match evaluate_dashboard(&request) {
        Ok(response) => {
            tracing::info!(
                horizon_months = request.scenario.horizon_months,
                simulations = request.scenario.simulations,
                "evaluated dashboard request"
            );
            json_response(StatusCode::OK, response)
        }
        Err(e) => {
            tracing::warn!(error = %e, "simulate request failed");
            error_response(StatusCode::BAD_REQUEST, &e.to_string())
        }
    }
}

fn evaluate_dashboard(request: &DashboardRequest) -> Result<SimulateResponse, EngineError> {
    let scenario = &request.scenario;
    let projection = project(scenario)?;
    let tax = apply_ltcg(
        projection.total_invested,
        projection.total_gain,
        scenario.ltcg_exemption,
        scenario.ltcg_rate,
    );
    let simulation = simulate(scenario)?;
    let delay = compare_delays(scenario, &request.delays)?;

    // The goal corpus is projected over the goal's own horizon, which
    // may be shorter than the main investing horizon.
    let goal_scenario = ScenarioInput {
        horizon_months: request.goal.horizon_months,
        ..scenario.clone()
    };
    let goal_projection = project(&goal_scenario)?;
    let goal_tax = apply_ltcg(
        goal_projection.total_invested,
        goal_projection.total_gain,
        scenario.ltcg_exemption,
        scenario.ltcg_rate,
    );
    let goal = goal_gap(&request.goal, goal_tax.net_corpus)?;
    let required_contribution =
        solve_required_contribution(&goal_scenario, goal.future_cost, SolveConfig::default())?;

    Ok(SimulateResponse {
        projection,
        tax,
        simulation,
        delay,
        goal,
        required_contribution,
    })
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
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

#[cfg(test)]
fn dashboard_request_from_json(json: &str) -> Result<DashboardRequest, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    dashboard_request_from_payload(payload)
}

fn dashboard_request_from_payload(payload: SimulatePayload) -> Result<DashboardRequest, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.monthly_investment {
        cli.monthly_investment = v;
    }
    if let Some(v) = payload.annual_return {
        cli.annual_return = v;
    }
    if let Some(v) = payload.annual_volatility {
        cli.annual_volatility = v;
    }
    if let Some(v) = payload.horizon_months {
        cli.horizon_months = v;
    }
    if let Some(v) = payload.inflation_rate {
        cli.inflation_rate = v;
    }
    if let Some(v) = payload.ltcg_exemption {
        cli.ltcg_exemption = v;
    }
    if let Some(v) = payload.ltcg_rate {
        cli.ltcg_rate = v;
    }
    if let Some(v) = payload.compounding {
        cli.compounding = v.into();
    }
    if let Some(v) = payload.simulations {
        cli.simulations = v;
    }
    if let Some(v) = payload.seed {
        cli.seed = v;
    }
    if let Some(v) = payload.delay_months {
        cli.delay_months = v;
    }
    if let Some(v) = payload.goal_cost {
        cli.goal_cost = v;
    }
    if let Some(v) = payload.goal_inflation {
        cli.goal_inflation = v;
    }
    if let Some(v) = payload.goal_horizon_months {
        cli.goal_horizon_months = Some(v);
    }

    build_inputs(cli)
}

fn default_cli_for_api() -> Cli {
    Cli {
        monthly_investment: 25_000.0,
        annual_return: 12.0,
        annual_volatility: 15.0,
        horizon_months: 180,
        inflation_rate: 6.0,
        ltcg_exemption: 125_000.0,
        ltcg_rate: 12.5,
        compounding: CliCompounding::Nominal,
        simulations: 50,
        seed: 42,
        delay_months: vec![12, 24, 36, 60],
        goal_cost: 4_000_000.0,
        goal_inflation: 5.0,
        goal_horizon_months: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_cli() -> Cli {
        default_cli_for_api()
    }

    #[test]
    fn build_inputs_converts_percent_rates_to_fractions() {
        let request = build_inputs(sample_cli()).expect("valid inputs");
        assert_approx(request.scenario.annual_return, 0.12);
        assert_approx(request.scenario.annual_volatility, 0.15);
        assert_approx(request.scenario.inflation_rate, 0.06);
        assert_approx(request.scenario.ltcg_rate, 0.125);
        assert_approx(request.goal.goal_inflation, 0.05);
    }

    #[test]
    fn build_inputs_defaults_goal_horizon_to_investing_horizon() {
        let request = build_inputs(sample_cli()).expect("valid inputs");
        assert_eq!(request.goal.horizon_months, 180);

        let mut cli = sample_cli();
        cli.goal_horizon_months = Some(60);
        let request = build_inputs(cli).expect("valid inputs");
        assert_eq!(request.goal.horizon_months, 60);
    }

    #[test]
    fn build_inputs_rejects_non_positive_contribution() {
        let mut cli = sample_cli();
        cli.monthly_investment = 0.0;
        let err = build_inputs(cli).expect_err("must reject");
        assert!(err.contains("monthlyContribution"));
    }

    #[test]
    fn build_inputs_rejects_negative_goal_cost() {
        let mut cli = sample_cli();
        cli.goal_cost = -5.0;
        let err = build_inputs(cli).expect_err("must reject");
        assert!(err.contains("goalCost"));
    }

    #[test]
    fn build_inputs_rejects_zero_goal_horizon() {
        let mut cli = sample_cli();
        cli.goal_horizon_months = Some(0);
        let err = build_inputs(cli).expect_err("must reject");
        assert!(err.contains("goalHorizonMonths"));
    }

    #[test]
    fn dashboard_request_parses_camel_case_payload() {
        let json = r#"{
          "monthlyInvestment": 10000,
          "annualReturn": 10.5,
          "annualVolatility": 18,
          "horizonMonths": 240,
          "inflationRate": 5,
          "ltcgExemption": 100000,
          "ltcgRate": 10,
          "compounding": "geometric",
          "simulations": 30,
          "seed": 7,
          "delayMonths": [6, 18],
          "goalCost": 2500000,
          "goalInflation": 4,
          "goalHorizonMonths": 72
        }"#;
        let request = dashboard_request_from_json(json).expect("json should parse");

        assert_approx(request.scenario.monthly_contribution, 10_000.0);
        assert_approx(request.scenario.annual_return, 0.105);
        assert_approx(request.scenario.annual_volatility, 0.18);
        assert_eq!(request.scenario.horizon_months, 240);
        assert_approx(request.scenario.inflation_rate, 0.05);
        assert_approx(request.scenario.ltcg_exemption, 100_000.0);
        assert_approx(request.scenario.ltcg_rate, 0.10);
        assert_eq!(request.scenario.compounding, Compounding::Geometric);
        assert_eq!(request.scenario.simulations, 30);
        assert_eq!(request.scenario.seed, 7);
        assert_eq!(request.delays, vec![6, 18]);
        assert_approx(request.goal.present_cost, 2_500_000.0);
        assert_approx(request.goal.goal_inflation, 0.04);
        assert_eq!(request.goal.horizon_months, 72);
    }

    #[test]
    fn empty_payload_uses_documented_defaults() {
        let request = dashboard_request_from_json("{}").expect("defaults are valid");
        assert_approx(request.scenario.monthly_contribution, 25_000.0);
        assert_eq!(request.scenario.horizon_months, 180);
        assert_eq!(request.scenario.simulations, 50);
        assert_eq!(request.delays, vec![12, 24, 36, 60]);
        assert_approx(request.goal.present_cost, 4_000_000.0);
    }

    #[test]
    fn payload_rejects_invalid_volatility() {
        let err = dashboard_request_from_json(r#"{"annualVolatility": -3}"#)
            .expect_err("must reject");
        assert!(err.contains("annualVolatility"));
    }

    #[test]
    fn evaluate_dashboard_is_consistent_across_sections() {
        let mut cli = sample_cli();
        cli.horizon_months = 24;
        cli.simulations = 10;
        cli.annual_volatility = 0.0;
        cli.delay_months = vec![0, 12];
        let request = build_inputs(cli).expect("valid inputs");
        let response = evaluate_dashboard(&request).expect("evaluates");

        assert_eq!(response.projection.series.len(), 24);
        assert_approx(
            response.tax.net_corpus,
            response.projection.total_invested + response.tax.post_tax_gain,
        );
        // zero volatility: the median path is the deterministic one
        assert!(
            (response.simulation.median_final - response.projection.final_value).abs()
                <= response.projection.final_value * 1e-9
        );
        assert_approx(response.delay.points[0].shortfall, 0.0);
        // goal horizon defaulted to the scenario horizon, so the gap is
        // measured against the same net corpus
        assert_approx(response.goal.projected_corpus, response.tax.net_corpus);
        assert_approx(
            response.goal.gap,
            response.goal.projected_corpus - response.goal.future_cost,
        );
    }

    #[test]
    fn evaluate_dashboard_solves_the_goal_contribution() {
        let mut cli = sample_cli();
        cli.horizon_months = 60;
        cli.simulations = 5;
        let request = build_inputs(cli).expect("valid inputs");
        let response = evaluate_dashboard(&request).expect("evaluates");

        assert!(response.required_contribution.feasible);
        let solved = response
            .required_contribution
            .solved_value
            .expect("solvable goal");
        assert!(solved > 0.0);
        let achieved = response
            .required_contribution
            .achieved_net_corpus
            .expect("achieved corpus");
        assert!(achieved + 1e-6 >= response.goal.future_cost);
    }

    #[test]
    fn simulate_response_serialization_contains_expected_fields() {
        let mut cli = sample_cli();
        cli.horizon_months = 12;
        cli.simulations = 5;
        let request = build_inputs(cli).expect("valid inputs");
        let response = evaluate_dashboard(&request).expect("evaluates");
        let json = serde_json::to_string(&response).expect("response should serialize");

        assert!(json.contains("\"projection\""));
        assert!(json.contains("\"nominalValue\""));
        assert!(json.contains("\"realValue\""));
        assert!(json.contains("\"netCorpus\""));
        assert!(json.contains("\"medianFinal\""));
        assert!(json.contains("\"bestFinal\""));
        assert!(json.contains("\"worstFinal\""));
        assert!(json.contains("\"band\""));
        assert!(json.contains("\"baselineFinal\""));
        assert!(json.contains("\"futureCost\""));
        assert!(json.contains("\"gap\""));
        assert!(json.contains("\"requiredContribution\""));
    }
}
