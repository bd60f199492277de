use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Outcome reported by the LP solver
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SolverStatus {
    Optimal,
    Infeasible,
    Unbounded,
    NumericalError,
}

/// Dominant battery action in a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Charge,
    Discharge,
    Idle,
}

/// Dispatch decision for a single step.
///
/// `charge`/`discharge` are grid-side powers (energy units per hour);
/// `soc` is the stored energy at the *end* of the step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub t: usize,
    pub time_start: DateTime<FixedOffset>,
    pub time_end: DateTime<FixedOffset>,
    pub price: f64,
    pub charge: f64,
    pub discharge: f64,
    pub soc: f64,
    pub soc_fraction: f64,
}

impl ScheduleEntry {
    /// Positive when charging, negative when discharging
    pub fn net_power(&self) -> f64 {
        self.charge - self.discharge
    }

    pub fn action(&self) -> Action {
        let net = self.net_power();
        if net > 0.0 {
            Action::Charge
        } else if net < 0.0 {
            Action::Discharge
        } else {
            Action::Idle
        }
    }

    pub fn duration_hours(&self) -> f64 {
        (self.time_end - self.time_start).num_milliseconds() as f64 / 3_600_000.0
    }
}

/// Per-step plan in horizon order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DispatchSchedule {
    entries: Vec<ScheduleEntry>,
}

impl DispatchSchedule {
    pub fn new(entries: Vec<ScheduleEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScheduleEntry> {
        self.entries.iter()
    }

    /// Grid energy drawn for charging over the horizon
    pub fn total_charged(&self) -> f64 {
        self.entries.iter().map(|e| e.charge * e.duration_hours()).sum()
    }

    /// Grid energy delivered by discharging over the horizon
    pub fn total_discharged(&self) -> f64 {
        self.entries.iter().map(|e| e.discharge * e.duration_hours()).sum()
    }

    pub fn final_soc(&self) -> Option<f64> {
        self.entries.last().map(|e| e.soc)
    }

    pub fn power_at(&self, t: DateTime<FixedOffset>) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| t >= e.time_start && t < e.time_end)
            .map(ScheduleEntry::net_power)
    }
}

impl<'a> IntoIterator for &'a DispatchSchedule {
    type Item = &'a ScheduleEntry;
    type IntoIter = std::slice::Iter<'a, ScheduleEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Revenue and utilization figures derived from a schedule
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchSummary {
    /// Income from discharged energy
    pub gross_sales: f64,
    /// Spend on charging energy (negative prices make this negative)
    pub purchase_cost: f64,
    /// Charge and discharge throughput costs from `DispatchCosts`
    pub operating_cost: f64,
    /// Strike price charged on discharged energy
    pub strike_cost: f64,
    pub energy_charged: f64,
    pub energy_discharged: f64,
    /// Discharged energy divided by capacity
    pub equivalent_full_cycles: f64,
    /// Throughput relative to running at full power every step, 0.0-1.0
    pub utilization: f64,
    pub min_soc: f64,
    pub max_soc: f64,
}

/// Final product of one optimization run. Read-only once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    id: Uuid,
    created_at: DateTime<FixedOffset>,
    schedule: DispatchSchedule,
    total_revenue: f64,
    solver_status: SolverStatus,
    summary: DispatchSummary,
}

impl OptimizationResult {
    pub fn new(
        schedule: DispatchSchedule,
        total_revenue: f64,
        solver_status: SolverStatus,
        summary: DispatchSummary,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: chrono::Utc::now().fixed_offset(),
            schedule,
            total_revenue,
            solver_status,
            summary,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<FixedOffset> {
        self.created_at
    }

    pub fn schedule(&self) -> &DispatchSchedule {
        &self.schedule
    }

    pub fn total_revenue(&self) -> f64 {
        self.total_revenue
    }

    pub fn solver_status(&self) -> SolverStatus {
        self.solver_status
    }

    pub fn summary(&self) -> &DispatchSummary {
        &self.summary
    }
}
