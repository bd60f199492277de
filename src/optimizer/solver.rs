//! LP solver seam
//!
//! The dispatch model is handed to an external LP backend through
//! [`LpSolver`]. The default backend drives `good_lp` with its pure-Rust
//! simplex solver, so no native CBC/HiGHS install is required. The adapter
//! only assembles coefficients and interprets the result; it never trusts a
//! returned point without checking it against the model.

#[cfg(feature = "optimization")]
use good_lp::*;

use super::model::LinearProgramModel;
use super::{SolverError, SolverOutput, SolverSettings};
#[cfg(feature = "optimization")]
use super::model::Relation;
#[cfg(feature = "optimization")]
use crate::domain::SolverStatus;

/// Anything that can solve a dispatch LP
#[cfg_attr(test, mockall::automock)]
pub trait LpSolver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Solve `model`, reporting infeasibility or numerical trouble through
    /// the output status. `Err` is reserved for a backend that cannot run.
    fn solve(
        &self,
        model: &LinearProgramModel,
        settings: &SolverSettings,
    ) -> Result<SolverOutput, SolverError>;
}

/// `good_lp` backend using the default solver compiled into the crate
#[derive(Debug, Clone, Copy, Default)]
pub struct GoodLpSolver;

impl GoodLpSolver {
    pub fn new() -> Self {
        Self
    }

    #[cfg(feature = "optimization")]
    fn solve_raw(model: &LinearProgramModel) -> SolverOutput {
        let mut problem = ProblemVariables::new();

        let vars: Vec<Variable> = model
            .bounds()
            .iter()
            .map(|b| problem.add(variable().min(b.lower).max(b.upper)))
            .collect();

        let objective = vars
            .iter()
            .zip(model.objective())
            .filter(|(_, c)| **c != 0.0)
            .map(|(&x, &c)| c * x)
            .sum::<Expression>();

        let mut problem_builder = problem.maximise(objective).using(default_solver);

        for row in model.constraints() {
            let lhs = row
                .terms
                .iter()
                .map(|&(i, c)| c * vars[i])
                .sum::<Expression>();
            let rhs = row.rhs;
            problem_builder = problem_builder.with(match row.relation {
                Relation::Eq => constraint!(lhs == rhs),
                Relation::Le => constraint!(lhs <= rhs),
                Relation::Ge => constraint!(lhs >= rhs),
            });
        }

        match problem_builder.solve() {
            Ok(solution) => SolverOutput::optimal(vars.iter().map(|&v| solution.value(v)).collect()),
            Err(ResolutionError::Infeasible) => {
                SolverOutput::failed(SolverStatus::Infeasible, "constraints admit no solution")
            }
            Err(ResolutionError::Unbounded) => {
                SolverOutput::failed(SolverStatus::Unbounded, "objective is unbounded")
            }
            Err(e) => SolverOutput::failed(SolverStatus::NumericalError, e.to_string()),
        }
    }
}

impl LpSolver for GoodLpSolver {
    fn name(&self) -> &'static str {
        "good_lp"
    }

    #[cfg(feature = "optimization")]
    fn solve(
        &self,
        model: &LinearProgramModel,
        settings: &SolverSettings,
    ) -> Result<SolverOutput, SolverError> {
        let n_steps = model.num_steps();
        if n_steps > 8760 {
            tracing::warn!(
                steps = n_steps,
                "very long horizon; solve time grows with the number of steps"
            );
        }

        let output = if settings.equilibrate {
            Self::solve_raw(&model.equilibrated())
        } else {
            Self::solve_raw(model)
        };

        if output.status != SolverStatus::Optimal {
            return Ok(output);
        }

        let tolerance = model.input().params.tolerance(settings.tolerance_fraction);
        let violation = model.max_violation(&output.values);
        if violation > tolerance {
            tracing::warn!(
                violation,
                tolerance,
                equilibrated = settings.equilibrate,
                "solver point violates the model"
            );
            return Ok(SolverOutput::failed(
                SolverStatus::NumericalError,
                format!(
                    "solution violates constraints by {:.3e} (tolerance {:.3e})",
                    violation, tolerance
                ),
            ));
        }

        Ok(output)
    }

    #[cfg(not(feature = "optimization"))]
    fn solve(
        &self,
        _model: &LinearProgramModel,
        _settings: &SolverSettings,
    ) -> Result<SolverOutput, SolverError> {
        Err(SolverError::Unavailable)
    }
}
