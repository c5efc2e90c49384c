use rand::Rng as _;
use rand::SeedableRng;
use rand::rngs::StdRng;
use statrs::distribution::Normal;

use super::error::EngineError;
use super::types::{
    BandPoint, Compounding, DelayComparison, DelayPoint, GoalPlan, GoalResult, MonthPoint,
    ProjectionResult, ScenarioInput, SimulationRun, SimulationSummary, TaxResult,
};

/// Upper bound on projection horizons; beyond this the arithmetic stops
/// being meaningful long before it overflows.
pub(crate) const MAX_HORIZON_MONTHS: u32 = 1200;

const MIN_MONTHLY_RETURN: f64 = -0.95;
const MAX_MONTHLY_RETURN: f64 = 2.5;

pub fn validate(input: &ScenarioInput) -> Result<(), EngineError> {
    if !input.monthly_contribution.is_finite() || input.monthly_contribution <= 0.0 {
        return Err(EngineError::invalid(
            "monthlyContribution",
            "must be a positive amount",
        ));
    }

    if !input.annual_return.is_finite() || input.annual_return <= -1.0 {
        return Err(EngineError::invalid(
            "annualReturn",
            "must be a finite rate above -100%",
        ));
    }

    if !input.annual_volatility.is_finite() || input.annual_volatility < 0.0 {
        return Err(EngineError::invalid(
            "annualVolatility",
            "must be a finite non-negative rate",
        ));
    }

    if input.horizon_months == 0 {
        return Err(EngineError::invalid("horizonMonths", "must be at least 1"));
    }

    if input.horizon_months > MAX_HORIZON_MONTHS {
        return Err(EngineError::invalid(
            "horizonMonths",
            format!("must be at most {MAX_HORIZON_MONTHS}"),
        ));
    }

    if !input.inflation_rate.is_finite() || input.inflation_rate < 0.0 {
        return Err(EngineError::invalid(
            "inflationRate",
            "must be a finite non-negative rate",
        ));
    }

    if !input.ltcg_exemption.is_finite() || input.ltcg_exemption < 0.0 {
        return Err(EngineError::invalid(
            "ltcgExemption",
            "must be a non-negative amount",
        ));
    }

    if !input.ltcg_rate.is_finite() || !(0.0..=1.0).contains(&input.ltcg_rate) {
        return Err(EngineError::invalid("ltcgRate", "must be between 0 and 1"));
    }

    if input.simulations == 0 {
        return Err(EngineError::invalid("simulations", "must be at least 1"));
    }

    Ok(())
}

pub fn monthly_rate(annual_return: f64, compounding: Compounding) -> f64 {
    match compounding {
        Compounding::Nominal => annual_return / 12.0,
        Compounding::Geometric => (1.0 + annual_return).powf(1.0 / 12.0) - 1.0,
    }
}

/// Fixed-rate SIP projection. The recurrence is an ordinary annuity:
/// the contribution lands at the end of each month and earns nothing
/// within it, so `v_t = v_{t-1} * (1 + r) + c` with `v_0 = 0`.
pub fn project(input: &ScenarioInput) -> Result<ProjectionResult, EngineError> {
    validate(input)?;

    let rate = monthly_rate(input.annual_return, input.compounding);
    let mut series = Vec::with_capacity(input.horizon_months as usize);
    let mut value = 0.0;
    let mut invested = 0.0;

    for month in 1..=input.horizon_months {
        value = value * (1.0 + rate) + input.monthly_contribution;
        invested += input.monthly_contribution;
        if !value.is_finite() {
            return Err(EngineError::NumericOverflow {
                context: "projecting portfolio value",
            });
        }

        let deflator = (1.0 + input.inflation_rate).powf(month as f64 / 12.0);
        series.push(MonthPoint {
            month,
            invested,
            nominal_value: value,
            real_value: value / deflator,
        });
    }

    Ok(ProjectionResult {
        final_value: value,
        total_invested: invested,
        total_gain: value - invested,
        series,
    })
}

/// Flat LTCG rule: a single rate applied to the gain above the
/// exemption threshold.
pub fn apply_ltcg(principal: f64, gain: f64, exemption: f64, rate: f64) -> TaxResult {
    let taxable_gain = (gain - exemption).max(0.0);
    let tax_due = taxable_gain * rate;
    TaxResult {
        taxable_gain,
        tax_due,
        post_tax_gain: gain - tax_due,
        net_corpus: principal + gain - tax_due,
    }
}

/// Runs the Monte Carlo ensemble. Each run draws its own independent
/// sequence of monthly returns from N(monthly mean, sigma / sqrt(12))
/// with a per-run seed derived from the base seed, then applies the
/// same recurrence as `project`. Zero volatility degenerates to the
/// fixed monthly mean, so every run reproduces the deterministic
/// projection.
pub fn simulate(input: &ScenarioInput) -> Result<SimulationSummary, EngineError> {
    validate(input)?;

    let horizon = input.horizon_months as usize;
    let mean = monthly_rate(input.annual_return, input.compounding);
    let monthly_std = input.annual_volatility / 12.0_f64.sqrt();
    let normal = if monthly_std > 0.0 {
        Some(Normal::new(mean, monthly_std).map_err(|e| {
            EngineError::invalid("annualVolatility", format!("invalid distribution: {e}"))
        })?)
    } else {
        None
    };

    let mut runs = Vec::with_capacity(input.simulations as usize);
    for run_id in 0..input.simulations {
        let mut rng = StdRng::seed_from_u64(derive_seed(input.seed, run_id));
        let mut values = Vec::with_capacity(horizon);
        let mut value = 0.0;

        for _ in 0..horizon {
            let sampled = match normal {
                Some(dist) => rng
                    .sample(dist)
                    .clamp(MIN_MONTHLY_RETURN, MAX_MONTHLY_RETURN),
                None => mean,
            };
            value = value * (1.0 + sampled) + input.monthly_contribution;
            if !value.is_finite() {
                return Err(EngineError::NumericOverflow {
                    context: "simulating portfolio value",
                });
            }
            values.push(value);
        }

        runs.push(SimulationRun { values });
    }

    let mut band = Vec::with_capacity(horizon);
    for idx in 0..horizon {
        let mut month_values: Vec<f64> = runs.iter().map(|run| run.values[idx]).collect();
        month_values.sort_by(|a, b| a.total_cmp(b));
        band.push(BandPoint {
            month: idx as u32 + 1,
            min: month_values.first().copied().unwrap_or(0.0),
            p10: percentile(&mut month_values, 10.0),
            p50: percentile(&mut month_values, 50.0),
            p90: percentile(&mut month_values, 90.0),
            max: month_values.last().copied().unwrap_or(0.0),
        });
    }

    let mut finals: Vec<f64> = runs
        .iter()
        .map(|run| run.values.last().copied().unwrap_or(0.0))
        .collect();
    finals.sort_by(|a, b| a.total_cmp(b));

    Ok(SimulationSummary {
        worst_final: finals.first().copied().unwrap_or(0.0),
        median_final: percentile(&mut finals, 50.0),
        best_final: finals.last().copied().unwrap_or(0.0),
        runs,
        band,
    })
}

/// Re-runs the fixed-rate projection with the investing horizon cut by
/// each delay offset. A delay at or beyond the horizon clamps the
/// remaining months to zero instead of failing, so a sweep over offsets
/// always completes.
pub fn compare_delays(
    input: &ScenarioInput,
    offsets: &[u32],
) -> Result<DelayComparison, EngineError> {
    validate(input)?;

    let rate = monthly_rate(input.annual_return, input.compounding);
    let baseline_final = final_corpus(input.monthly_contribution, rate, input.horizon_months)?;

    let mut points = Vec::with_capacity(offsets.len());
    for &offset in offsets {
        let invested_months = input.horizon_months.saturating_sub(offset);
        let final_value = final_corpus(input.monthly_contribution, rate, invested_months)?;
        points.push(DelayPoint {
            delay_months: offset,
            invested_months,
            final_value,
            shortfall: baseline_final - final_value,
        });
    }

    Ok(DelayComparison {
        baseline_final,
        points,
    })
}

/// Future goal cost under goal-specific inflation, and the signed gap
/// against an already-projected net corpus.
pub fn goal_gap(plan: &GoalPlan, projected_corpus: f64) -> Result<GoalResult, EngineError> {
    if !plan.present_cost.is_finite() || plan.present_cost < 0.0 {
        return Err(EngineError::invalid(
            "goalCost",
            "must be a non-negative amount",
        ));
    }

    if !plan.goal_inflation.is_finite() || plan.goal_inflation <= -1.0 {
        return Err(EngineError::invalid(
            "goalInflation",
            "must be a finite rate above -100%",
        ));
    }

    if plan.horizon_months > MAX_HORIZON_MONTHS {
        return Err(EngineError::invalid(
            "goalHorizonMonths",
            format!("must be at most {MAX_HORIZON_MONTHS}"),
        ));
    }

    let years = plan.horizon_months as f64 / 12.0;
    let future_cost = plan.present_cost * (1.0 + plan.goal_inflation).powf(years);
    Ok(GoalResult {
        future_cost,
        projected_corpus,
        gap: projected_corpus - future_cost,
    })
}

/// Final corpus of the recurrence without the per-month trace. Zero
/// months yields zero, which is what a fully-delayed scenario reports.
pub(crate) fn final_corpus(contribution: f64, rate: f64, months: u32) -> Result<f64, EngineError> {
    let mut value = 0.0;
    for _ in 0..months {
        value = value * (1.0 + rate) + contribution;
        if !value.is_finite() {
            return Err(EngineError::NumericOverflow {
                context: "projecting portfolio value",
            });
        }
    }
    Ok(value)
}

fn derive_seed(base_seed: u64, run_id: u32) -> u64 {
    splitmix64(base_seed ^ ((run_id as u64) << 32) ^ run_id as u64)
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

fn percentile(values: &mut [f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    values.sort_by(|a, b| a.total_cmp(b));

    let n = values.len();
    if n == 1 {
        return values[0];
    }

    let rank = (p / 100.0) * (n as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    if lower == upper {
        values[lower]
    } else {
        let w = rank - lower as f64;
        values[lower] * (1.0 - w) + values[upper] * w
    }
}
