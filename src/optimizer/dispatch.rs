use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::extract::{extract, ExtractedSchedule};
use super::model::{build, LinearProgramModel};
use super::solver::{GoodLpSolver, LpSolver};
use super::validation::validate_with_costs;
use super::{
    DispatchError, InfeasibleError, SolverError, SolverOutput, SolverSettings,
};
use crate::domain::{
    BatteryParameters, DispatchCosts, OptimizationResult, PriceSeries, SolverStatus,
};

/// Entry point for dispatch optimization.
///
/// Runs validation, model building, solving and extraction in sequence and
/// stops at the first failure. Holds only immutable configuration, so one
/// instance can serve any number of concurrent calls.
#[derive(Clone)]
pub struct DispatchOptimizer {
    solver: Arc<dyn LpSolver>,
    settings: SolverSettings,
    costs: DispatchCosts,
}

impl Default for DispatchOptimizer {
    fn default() -> Self {
        Self::new(Arc::new(GoodLpSolver::new()), SolverSettings::default())
    }
}

impl std::fmt::Debug for DispatchOptimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchOptimizer")
            .field("solver", &self.solver.name())
            .field("settings", &self.settings)
            .field("costs", &self.costs)
            .finish()
    }
}

impl DispatchOptimizer {
    pub fn new(solver: Arc<dyn LpSolver>, settings: SolverSettings) -> Self {
        Self {
            solver,
            settings,
            costs: DispatchCosts::default(),
        }
    }

    pub fn with_costs(mut self, costs: DispatchCosts) -> Self {
        self.costs = costs;
        self
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    pub fn costs(&self) -> &DispatchCosts {
        &self.costs
    }

    #[tracing::instrument(skip_all, fields(steps = prices.len()))]
    pub async fn optimize(
        &self,
        prices: &PriceSeries,
        params: &BatteryParameters,
    ) -> Result<OptimizationResult, DispatchError> {
        let input = validate_with_costs(params, prices, &self.costs).map_err(|e| {
            debug!(field = %e.field, reason = %e.reason, "dispatch input rejected");
            e
        })?;

        let model = Arc::new(build(&input, &self.settings));

        let extracted = match self.attempt(&model, self.settings).await {
            Err(DispatchError::Solver(SolverError::Numerical(message))) => {
                warn!(%message, "numerical failure, retrying with equilibrated model");
                self.attempt(&model, self.settings.for_retry())
                    .await
                    .map_err(|e| {
                        if let DispatchError::Solver(SolverError::Numerical(message)) = &e {
                            error!(%message, "numerical failure persisted after retry");
                        }
                        e
                    })?
            }
            other => other?,
        };

        info!(
            total_revenue = extracted.total_revenue,
            energy_discharged = extracted.summary.energy_discharged,
            cycles = extracted.summary.equivalent_full_cycles,
            "dispatch optimized"
        );

        Ok(OptimizationResult::new(
            extracted.schedule,
            extracted.total_revenue,
            SolverStatus::Optimal,
            extracted.summary,
        ))
    }

    /// One solve plus extraction. A point the solver calls optimal but whose
    /// recomputed schedule breaks an invariant counts as a numerical failure.
    async fn attempt(
        &self,
        model: &Arc<LinearProgramModel>,
        settings: SolverSettings,
    ) -> Result<ExtractedSchedule, DispatchError> {
        let output = self.run_solver(Arc::clone(model), settings).await?;

        let message = || output.message.clone().unwrap_or_default();
        match output.status {
            SolverStatus::Optimal => Ok(extract(model, &output, settings.tolerance_fraction)?),
            SolverStatus::Infeasible => {
                info!(message = %message(), "dispatch problem infeasible");
                Err(InfeasibleError { message: message() }.into())
            }
            SolverStatus::Unbounded => {
                error!(message = %message(), "dispatch LP unbounded");
                Err(SolverError::Unbounded(message()).into())
            }
            SolverStatus::NumericalError => Err(SolverError::Numerical(message()).into()),
        }
    }

    /// Solve on the blocking pool under the configured time limit. On timeout
    /// the worker is abandoned and its result dropped.
    async fn run_solver(
        &self,
        model: Arc<LinearProgramModel>,
        settings: SolverSettings,
    ) -> Result<SolverOutput, SolverError> {
        let solver = Arc::clone(&self.solver);
        let task = tokio::task::spawn_blocking(move || solver.solve(&model, &settings));

        match tokio::time::timeout(settings.time_limit, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => {
                error!(error = %join_error, "solver worker failed");
                Err(SolverError::Worker(join_error.to_string()))
            }
            Err(_) => {
                error!(limit = ?settings.time_limit, "solver timed out");
                Err(SolverError::Timeout(settings.time_limit))
            }
        }
    }
}

/// Optimize with the default backend, settings and zero throughput costs
pub async fn optimize_dispatch(
    prices: &PriceSeries,
    params: &BatteryParameters,
) -> Result<OptimizationResult, DispatchError> {
    DispatchOptimizer::default().optimize(prices, params).await
}
