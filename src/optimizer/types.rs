use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::domain::SolverStatus;

/// First physical or structural inconsistency found in the input
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Well-formed input whose constraints admit no schedule
#[derive(Debug, Clone, PartialEq, Error)]
#[error("no feasible dispatch schedule: {message}")]
pub struct InfeasibleError {
    pub message: String,
}

/// Failures inside the solving step
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    #[error("numerical failure in LP solver: {0}")]
    Numerical(String),
    #[error("LP is unbounded: {0}")]
    Unbounded(String),
    #[error("LP solver exceeded time limit of {0:?}")]
    Timeout(Duration),
    #[error("no LP backend compiled in (enable the `optimization` feature)")]
    Unavailable,
    #[error("solver worker failed: {0}")]
    Worker(String),
}

/// Discriminated failure of a dispatch run
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Infeasible(#[from] InfeasibleError),
    #[error(transparent)]
    Solver(#[from] SolverError),
}

impl DispatchError {
    /// Status code matching the failure, `None` for validation errors
    pub fn solver_status(&self) -> Option<SolverStatus> {
        match self {
            DispatchError::Validation(_) => None,
            DispatchError::Infeasible(_) => Some(SolverStatus::Infeasible),
            DispatchError::Solver(SolverError::Unbounded(_)) => Some(SolverStatus::Unbounded),
            DispatchError::Solver(_) => Some(SolverStatus::NumericalError),
        }
    }
}

/// Knobs for one solver attempt
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverSettings {
    /// Wall-clock budget for a single solve
    pub time_limit: Duration,
    /// Residual tolerance as a fraction of battery capacity
    pub tolerance_fraction: f64,
    /// Objective penalty per energy unit of throughput, relative to
    /// `max(1, max |price|)`; breaks ties in favour of idling
    pub throughput_penalty: f64,
    /// Scale constraint rows and objective to unit max coefficient before solving
    pub equilibrate: bool,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            time_limit: Duration::from_secs(30),
            tolerance_fraction: 1e-6,
            throughput_penalty: 1e-7,
            equilibrate: false,
        }
    }
}

impl SolverSettings {
    /// Settings for the single retry after a numerical failure
    pub fn for_retry(&self) -> Self {
        Self {
            equilibrate: true,
            ..*self
        }
    }
}

/// Raw answer from a solver backend
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutput {
    pub status: SolverStatus,
    /// Variable values in model order, empty unless `status` is optimal
    pub values: Vec<f64>,
    /// Backend message for non-optimal outcomes
    pub message: Option<String>,
}

impl SolverOutput {
    pub fn optimal(values: Vec<f64>) -> Self {
        Self {
            status: SolverStatus::Optimal,
            values,
            message: None,
        }
    }

    pub fn failed(status: SolverStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            values: Vec::new(),
            message: Some(message.into()),
        }
    }
}
