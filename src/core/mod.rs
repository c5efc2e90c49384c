mod engine;
mod error;
mod solver;
mod types;

pub use engine::{apply_ltcg, compare_delays, goal_gap, monthly_rate, project, simulate, validate};
pub use error::EngineError;
pub use solver::{SolveConfig, SolveIteration, SolveResult, solve_required_contribution};
pub use types::{
    BandPoint, Compounding, DelayComparison, DelayPoint, GoalPlan, GoalResult, MonthPoint,
    ProjectionResult, ScenarioInput, SimulationRun, SimulationSummary, TaxResult,
};
