use serde::Serialize;

/// Monthly-rate convention applied to the annual expected return.
///
/// `Nominal` divides the annual rate by 12; `Geometric` takes the
/// twelfth root of (1 + annual). The two produce different numbers for
/// every projection, so the choice is an explicit policy input rather
/// than an implementation detail.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Compounding {
    Nominal,
    Geometric,
}

/// Everything a single dashboard evaluation needs. Rates are fractions,
/// not percents; currency amounts are rupees.
#[derive(Debug, Clone)]
pub struct ScenarioInput {
    pub monthly_contribution: f64,
    pub annual_return: f64,
    pub annual_volatility: f64,
    pub horizon_months: u32,
    pub inflation_rate: f64,
    pub ltcg_exemption: f64,
    pub ltcg_rate: f64,
    pub compounding: Compounding,
    pub simulations: u32,
    pub seed: u64,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthPoint {
    pub month: u32,
    pub invested: f64,
    pub nominal_value: f64,
    pub real_value: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionResult {
    pub series: Vec<MonthPoint>,
    pub final_value: f64,
    pub total_invested: f64,
    pub total_gain: f64,
}

/// Flat-bracket LTCG outcome: a single rate on the gain above the
/// exemption, never a progressive schedule.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxResult {
    pub taxable_gain: f64,
    pub tax_due: f64,
    pub post_tax_gain: f64,
    pub net_corpus: f64,
}

/// One simulated trajectory; `values[t - 1]` is the portfolio value at
/// the end of month `t`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRun {
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BandPoint {
    pub month: u32,
    pub min: f64,
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSummary {
    pub runs: Vec<SimulationRun>,
    pub band: Vec<BandPoint>,
    pub worst_final: f64,
    pub median_final: f64,
    pub best_final: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayPoint {
    pub delay_months: u32,
    pub invested_months: u32,
    pub final_value: f64,
    pub shortfall: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayComparison {
    pub baseline_final: f64,
    pub points: Vec<DelayPoint>,
}

#[derive(Debug, Clone, Copy)]
pub struct GoalPlan {
    pub present_cost: f64,
    pub goal_inflation: f64,
    pub horizon_months: u32,
}

/// Signed gap: positive means the projected corpus covers the goal.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalResult {
    pub future_cost: f64,
    pub projected_corpus: f64,
    pub gap: f64,
}
