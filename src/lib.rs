//! Price-driven battery dispatch optimization.
//!
//! Turns a market price curve and battery limits into the revenue-maximising
//! charge/discharge/SoC schedule by solving a linear program.

pub mod config;
pub mod domain;
pub mod optimizer;
pub mod prices;
pub mod telemetry;

pub use domain::{
    BatteryParameters, DispatchCosts, DispatchSchedule, OptimizationResult, PricePoint,
    PriceSeries, ScheduleEntry, SolverStatus, StepDurations,
};
pub use optimizer::{optimize_dispatch, DispatchError, DispatchOptimizer};
