//! Linear program for price-driven battery dispatch
//!
//! Variables, for every step `t` of a horizon with `T` steps:
//! - `charge[t]`    grid-side charging power, `0 <= charge[t] <= max_charge_power`
//! - `discharge[t]` grid-side discharging power, `0 <= discharge[t] <= max_discharge_power`
//! - `soc[t]`       stored energy at the end of step `t`
//!
//! Objective (maximised):
//!   sum_t dt * (price[t] * (discharge[t] - charge[t])
//!               - charge_cost * charge[t]
//!               - (discharge_cost + strike_price) * discharge[t])
//!   - tie_break * sum_t dt * (charge[t] + discharge[t])
//!
//! Charge and discharge stay continuous. With efficiencies <= 1 charging and
//! discharging in the same step never beats idling at a non-negative price,
//! and the small throughput tie-break removes zero-gain cycling from the
//! optimum. No complementarity constraint is added.

use serde::{Deserialize, Serialize};

use super::{SolverSettings, ValidatedInput};

/// Index of a variable in model order
pub type VarIndex = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relation {
    Eq,
    Le,
    Ge,
}

/// What a constraint row enforces, used for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintKind {
    SocBalance(usize),
    SocLower(usize),
    SocUpper(usize),
    TerminalSoc,
    CycleLimit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearConstraint {
    pub kind: ConstraintKind,
    pub terms: Vec<(VarIndex, f64)>,
    pub relation: Relation,
    pub rhs: f64,
}

impl LinearConstraint {
    fn new(kind: ConstraintKind, terms: Vec<(VarIndex, f64)>, relation: Relation, rhs: f64) -> Self {
        Self {
            kind,
            terms,
            relation,
            rhs,
        }
    }

    pub fn lhs(&self, values: &[f64]) -> f64 {
        self.terms.iter().map(|&(i, c)| c * values[i]).sum()
    }

    /// Amount by which `values` violate this row, 0.0 when satisfied
    pub fn violation(&self, values: &[f64]) -> f64 {
        let lhs = self.lhs(values);
        match self.relation {
            Relation::Eq => (lhs - self.rhs).abs(),
            Relation::Le => (lhs - self.rhs).max(0.0),
            Relation::Ge => (self.rhs - lhs).max(0.0),
        }
    }

    fn max_abs_coefficient(&self) -> f64 {
        self.terms.iter().map(|(_, c)| c.abs()).fold(0.0, f64::max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VariableBounds {
    pub lower: f64,
    pub upper: f64,
}

/// Solver-independent LP assembled from validated input
#[derive(Debug, Clone, PartialEq)]
pub struct LinearProgramModel {
    input: ValidatedInput,
    objective: Vec<f64>,
    bounds: Vec<VariableBounds>,
    constraints: Vec<LinearConstraint>,
    tie_break: f64,
}

/// Build the dispatch LP. Infallible: every input has already been validated.
pub fn build(input: &ValidatedInput, settings: &SolverSettings) -> LinearProgramModel {
    let n = input.len();
    let params = &input.params;
    let costs = &input.costs;

    let price_scale = input
        .horizon
        .iter()
        .map(|s| s.price.abs())
        .fold(1.0, f64::max);
    let tie_break = settings.throughput_penalty * price_scale;

    let mut objective = vec![0.0; 3 * n];
    let mut bounds = Vec::with_capacity(3 * n);
    bounds.extend((0..n).map(|_| VariableBounds {
        lower: 0.0,
        upper: params.max_charge_power,
    }));
    bounds.extend((0..n).map(|_| VariableBounds {
        lower: 0.0,
        upper: params.max_discharge_power,
    }));
    bounds.extend((0..n).map(|_| VariableBounds {
        lower: 0.0,
        upper: params.capacity,
    }));

    let mut constraints = Vec::with_capacity(3 * n + 2);

    for step in &input.horizon {
        let t = step.index;
        let (charge, discharge, soc) = (t, n + t, 2 * n + t);

        objective[charge] = -step.dt * (step.price + costs.charge_cost + tie_break);
        objective[discharge] = step.dt * (step.price - costs.discharge_total() - tie_break);

        // soc[t] - soc[t-1] - eta_c*dt*charge[t] + dt/eta_d*discharge[t] = 0
        let mut terms = vec![
            (soc, 1.0),
            (charge, -params.charge_efficiency * step.dt),
            (discharge, step.dt / params.discharge_efficiency),
        ];
        let rhs = if t == 0 {
            params.initial_soc
        } else {
            terms.push((soc - 1, -1.0));
            0.0
        };
        constraints.push(LinearConstraint::new(
            ConstraintKind::SocBalance(t),
            terms,
            Relation::Eq,
            rhs,
        ));

        constraints.push(LinearConstraint::new(
            ConstraintKind::SocLower(t),
            vec![(soc, 1.0)],
            Relation::Ge,
            params.min_soc,
        ));
        constraints.push(LinearConstraint::new(
            ConstraintKind::SocUpper(t),
            vec![(soc, 1.0)],
            Relation::Le,
            params.max_soc,
        ));
    }

    if let Some(target) = params.terminal_target() {
        constraints.push(LinearConstraint::new(
            ConstraintKind::TerminalSoc,
            vec![(3 * n - 1, 1.0)],
            Relation::Eq,
            target,
        ));
    }

    if let Some(cap) = params.discharge_energy_cap() {
        let terms = input
            .horizon
            .iter()
            .map(|step| (n + step.index, step.dt))
            .collect();
        constraints.push(LinearConstraint::new(
            ConstraintKind::CycleLimit,
            terms,
            Relation::Le,
            cap,
        ));
    }

    tracing::debug!(
        steps = n,
        variables = objective.len(),
        constraints = constraints.len(),
        tie_break,
        "built dispatch LP"
    );

    LinearProgramModel {
        input: input.clone(),
        objective,
        bounds,
        constraints,
        tie_break,
    }
}

impl LinearProgramModel {
    pub fn input(&self) -> &ValidatedInput {
        &self.input
    }

    pub fn num_steps(&self) -> usize {
        self.input.len()
    }

    pub fn num_variables(&self) -> usize {
        self.objective.len()
    }

    pub fn charge_var(&self, t: usize) -> VarIndex {
        t
    }

    pub fn discharge_var(&self, t: usize) -> VarIndex {
        self.num_steps() + t
    }

    pub fn soc_var(&self, t: usize) -> VarIndex {
        2 * self.num_steps() + t
    }

    /// Objective coefficients, maximisation sense
    pub fn objective(&self) -> &[f64] {
        &self.objective
    }

    pub fn bounds(&self) -> &[VariableBounds] {
        &self.bounds
    }

    pub fn constraints(&self) -> &[LinearConstraint] {
        &self.constraints
    }

    /// Throughput penalty per energy unit included in the objective
    pub fn tie_break(&self) -> f64 {
        self.tie_break
    }

    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.objective.iter().zip(values).map(|(c, x)| c * x).sum()
    }

    /// Largest bound or row violation of `values`; infinite on a length mismatch
    /// or a non-finite value
    pub fn max_violation(&self, values: &[f64]) -> f64 {
        if values.len() != self.num_variables() || values.iter().any(|v| !v.is_finite()) {
            return f64::INFINITY;
        }

        let bound_violation = self
            .bounds
            .iter()
            .zip(values)
            .map(|(b, &x)| (b.lower - x).max(x - b.upper).max(0.0))
            .fold(0.0, f64::max);

        self.constraints
            .iter()
            .map(|c| c.violation(values))
            .fold(bound_violation, f64::max)
    }

    /// Same feasible set and optimum with every row and the objective scaled
    /// to a unit largest coefficient
    pub fn equilibrated(&self) -> Self {
        let mut scaled = self.clone();

        for row in &mut scaled.constraints {
            let scale = row.max_abs_coefficient();
            if scale > 0.0 {
                for (_, c) in &mut row.terms {
                    *c /= scale;
                }
                row.rhs /= scale;
            }
        }

        let scale = scaled.objective.iter().map(|c| c.abs()).fold(0.0, f64::max);
        if scale > 0.0 {
            for c in &mut scaled.objective {
                *c /= scale;
            }
        }

        scaled
    }
}
