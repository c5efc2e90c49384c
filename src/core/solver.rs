use serde::Serialize;

use super::engine::{MAX_HORIZON_MONTHS, apply_ltcg, final_corpus, monthly_rate};
use super::error::EngineError;
use super::types::ScenarioInput;

/// Search settings for the required-contribution solve. Bounds are
/// monthly contribution amounts; tolerance is in the same currency.
#[derive(Debug, Clone, Copy)]
pub struct SolveConfig {
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
}

impl Default for SolveConfig {
    fn default() -> Self {
        Self {
            search_min: 0.0,
            search_max: 10_000_000.0,
            tolerance: 1.0,
            max_iterations: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_value: f64,
    pub net_corpus: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveResult {
    pub target_corpus: f64,
    pub solved_value: Option<f64>,
    pub achieved_net_corpus: Option<f64>,
    pub iterations: Vec<SolveIteration>,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

/// Finds the monthly contribution whose post-tax net corpus meets
/// `target_corpus` over the scenario's horizon, rate convention, and
/// LTCG parameters. Net corpus is monotone in the contribution but the
/// exemption threshold makes it piecewise linear, hence bisection
/// rather than inverting the annuity closed form.
pub fn solve_required_contribution(
    input: &ScenarioInput,
    target_corpus: f64,
    config: SolveConfig,
) -> Result<SolveResult, EngineError> {
    validate_solve(input, target_corpus, config)?;

    let mut iterations = Vec::with_capacity(config.max_iterations as usize);
    let low_corpus = net_corpus_for(input, config.search_min)?;
    let high_corpus = net_corpus_for(input, config.search_max)?;

    let mut solved_value = None;
    let mut converged = false;
    let feasible;
    let message;

    if low_corpus + 1e-9 >= target_corpus {
        solved_value = Some(config.search_min);
        converged = true;
        feasible = true;
        message = "Already meets the target at the lower contribution bound.".to_string();
    } else if high_corpus + 1e-9 < target_corpus {
        feasible = false;
        message = "No feasible contribution within the search bounds.".to_string();
    } else {
        let mut lo = config.search_min;
        let mut hi = config.search_max;
        let mut it = 0;
        while it < config.max_iterations {
            it += 1;
            let mid = (lo + hi) * 0.5;
            let corpus = net_corpus_for(input, mid)?;
            iterations.push(SolveIteration {
                iteration: it,
                lower_bound: lo,
                upper_bound: hi,
                candidate_value: mid,
                net_corpus: corpus,
            });

            if corpus + 1e-9 >= target_corpus {
                hi = mid;
            } else {
                lo = mid;
            }

            if (hi - lo).abs() <= config.tolerance {
                converged = true;
                solved_value = Some(hi);
                break;
            }
        }
        if solved_value.is_none() {
            solved_value = Some(hi);
        }
        feasible = true;
        message = if converged {
            "Solved required contribution.".to_string()
        } else {
            "Reached max iterations before tolerance was met; returning best estimate."
                .to_string()
        };
    }

    let achieved_net_corpus = match solved_value {
        Some(value) => Some(net_corpus_for(input, value)?),
        None => None,
    };

    Ok(SolveResult {
        target_corpus,
        solved_value,
        achieved_net_corpus,
        iterations,
        converged,
        feasible,
        message,
    })
}

fn net_corpus_for(input: &ScenarioInput, contribution: f64) -> Result<f64, EngineError> {
    let rate = monthly_rate(input.annual_return, input.compounding);
    let final_value = final_corpus(contribution, rate, input.horizon_months)?;
    let principal = contribution * input.horizon_months as f64;
    let tax = apply_ltcg(
        principal,
        final_value - principal,
        input.ltcg_exemption,
        input.ltcg_rate,
    );
    Ok(tax.net_corpus)
}

fn validate_solve(
    input: &ScenarioInput,
    target_corpus: f64,
    config: SolveConfig,
) -> Result<(), EngineError> {
    if !target_corpus.is_finite() || target_corpus < 0.0 {
        return Err(EngineError::invalid(
            "targetCorpus",
            "must be a non-negative amount",
        ));
    }

    if input.horizon_months == 0 || input.horizon_months > MAX_HORIZON_MONTHS {
        return Err(EngineError::invalid(
            "horizonMonths",
            format!("must be between 1 and {MAX_HORIZON_MONTHS}"),
        ));
    }

    if !input.annual_return.is_finite() || input.annual_return <= -1.0 {
        return Err(EngineError::invalid(
            "annualReturn",
            "must be a finite rate above -100%",
        ));
    }

    if !config.search_min.is_finite() || config.search_min < 0.0 {
        return Err(EngineError::invalid(
            "searchMin",
            "must be a non-negative amount",
        ));
    }

    if !config.search_max.is_finite() || config.search_max <= config.search_min {
        return Err(EngineError::invalid(
            "searchMax",
            "must be greater than searchMin",
        ));
    }

    if !config.tolerance.is_finite() || config.tolerance <= 0.0 {
        return Err(EngineError::invalid("tolerance", "must be positive"));
    }

    if config.max_iterations == 0 {
        return Err(EngineError::invalid("maxIterations", "must be at least 1"));
    }

    Ok(())
}
