use super::model::LinearProgramModel;
use super::{SolverError, SolverOutput};
use crate::domain::{DispatchSchedule, DispatchSummary, ScheduleEntry};

/// Schedule plus the figures recomputed from it
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedSchedule {
    pub schedule: DispatchSchedule,
    pub total_revenue: f64,
    pub summary: DispatchSummary,
}

/// Map raw solver values back onto the horizon.
///
/// Powers that overshoot their bounds by less than the tolerance are clamped
/// onto them; larger overshoots are a numerical error. SoC is re-derived from
/// the balance recursion instead of read from the solver and must stay inside
/// the SoC band, and on the terminal target, within the same tolerance.
/// Revenue is re-evaluated from the extracted powers without the tie-break
/// term.
pub fn extract(
    model: &LinearProgramModel,
    output: &SolverOutput,
    tolerance_fraction: f64,
) -> Result<ExtractedSchedule, SolverError> {
    if output.values.len() != model.num_variables() {
        return Err(SolverError::Numerical(format!(
            "solver returned {} values for {} variables",
            output.values.len(),
            model.num_variables()
        )));
    }

    let input = model.input();
    let params = &input.params;
    let costs = &input.costs;
    let tolerance = params.tolerance(tolerance_fraction);

    let bounded = |value: f64, upper: f64, what: &str, t: usize| -> Result<f64, SolverError> {
        if !(-tolerance..=upper + tolerance).contains(&value) {
            return Err(SolverError::Numerical(format!(
                "{}[{}] = {} outside [0, {}]",
                what, t, value, upper
            )));
        }
        Ok(value.clamp(0.0, upper))
    };

    let mut entries = Vec::with_capacity(input.len());
    let mut summary = DispatchSummary {
        min_soc: f64::INFINITY,
        max_soc: f64::NEG_INFINITY,
        ..DispatchSummary::default()
    };
    let mut total_revenue = 0.0;
    let mut max_throughput = 0.0;
    let mut soc = params.initial_soc;

    for step in &input.horizon {
        let t = step.index;
        let charge = bounded(
            output.values[model.charge_var(t)],
            params.max_charge_power,
            "charge",
            t,
        )?;
        let discharge = bounded(
            output.values[model.discharge_var(t)],
            params.max_discharge_power,
            "discharge",
            t,
        )?;

        soc += charge * params.charge_efficiency * step.dt
            - discharge / params.discharge_efficiency * step.dt;
        if soc < params.min_soc - tolerance || soc > params.max_soc + tolerance {
            return Err(SolverError::Numerical(format!(
                "soc[{}] = {} outside [{}, {}]",
                t, soc, params.min_soc, params.max_soc
            )));
        }

        let charged = charge * step.dt;
        let discharged = discharge * step.dt;

        summary.gross_sales += step.price * discharged;
        summary.purchase_cost += step.price * charged;
        summary.operating_cost += costs.charge_cost * charged + costs.discharge_cost * discharged;
        summary.strike_cost += costs.strike_price * discharged;
        summary.energy_charged += charged;
        summary.energy_discharged += discharged;
        summary.min_soc = summary.min_soc.min(soc);
        summary.max_soc = summary.max_soc.max(soc);

        total_revenue += step.dt
            * (step.price * (discharge - charge)
                - costs.charge_cost * charge
                - costs.discharge_total() * discharge);
        max_throughput += (params.max_charge_power + params.max_discharge_power) * step.dt;

        entries.push(ScheduleEntry {
            t,
            time_start: step.timestamp,
            time_end: step.time_end(),
            price: step.price,
            charge,
            discharge,
            soc,
            soc_fraction: soc / params.capacity,
        });
    }

    if let Some(target) = params.terminal_target() {
        if (soc - target).abs() > tolerance {
            return Err(SolverError::Numerical(format!(
                "final soc {} misses terminal target {}",
                soc, target
            )));
        }
    }

    summary.equivalent_full_cycles = summary.energy_discharged / params.capacity;
    summary.utilization = if max_throughput > 0.0 {
        (summary.energy_charged + summary.energy_discharged) / max_throughput
    } else {
        0.0
    };

    Ok(ExtractedSchedule {
        schedule: DispatchSchedule::new(entries),
        total_revenue,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BatteryParameters, DispatchCosts, PriceSeries};
    use crate::optimizer::model::build;
    use crate::optimizer::validation::validate_with_costs;
    use crate::optimizer::SolverSettings;
    use chrono::{FixedOffset, TimeZone};

    fn model_with(prices: &[f64], params: BatteryParameters, costs: DispatchCosts) -> LinearProgramModel {
        let start = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 1, 0, 0, 0)
            .unwrap();
        let series = PriceSeries::uniform(start, 1.0, prices);
        let input = validate_with_costs(&params, &series, &costs).unwrap();
        build(&input, &SolverSettings::default())
    }

    fn battery() -> BatteryParameters {
        BatteryParameters::from_soc_fractions(10.0, 5.0, 5.0, 0.9, 0.9, 0.0, 1.0, 0.0)
    }

    #[test]
    fn test_soc_recomputed_from_powers() {
        let model = model_with(&[10.0, 50.0], battery(), DispatchCosts::default());
        // solver-reported SoC deliberately off
        let output = SolverOutput::optimal(vec![5.0, 0.0, 0.0, 4.0, 99.0, 99.0]);
        let extracted = extract(&model, &output, 1e-6).unwrap();

        let entries = extracted.schedule.entries();
        assert!((entries[0].soc - 4.5).abs() < 1e-12);
        assert!((entries[1].soc - (4.5 - 4.0 / 0.9)).abs() < 1e-12);
        assert!((entries[0].soc_fraction - 0.45).abs() < 1e-12);
    }

    #[test]
    fn test_revenue_reevaluated_from_schedule() {
        let costs = DispatchCosts::new(1.0, 2.0);
        let model = model_with(&[10.0, 50.0], battery(), costs);
        let output = SolverOutput::optimal(vec![5.0, 0.0, 0.0, 4.0, 4.5, 0.0556]);
        let extracted = extract(&model, &output, 1e-6).unwrap();

        // sales 200 - purchase 50 - costs (5*1 + 4*2)
        assert!((extracted.total_revenue - 137.0).abs() < 1e-9);
        assert!((extracted.summary.gross_sales - 200.0).abs() < 1e-9);
        assert!((extracted.summary.purchase_cost - 50.0).abs() < 1e-9);
        assert!((extracted.summary.operating_cost - 13.0).abs() < 1e-9);
        assert!((extracted.summary.equivalent_full_cycles - 0.4).abs() < 1e-12);
        assert!((extracted.summary.utilization - 9.0 / 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_strike_price_reduces_revenue() {
        let costs = DispatchCosts::new(0.0, 0.0).with_strike_price(15.0);
        let model = model_with(&[10.0, 50.0], battery(), costs);
        let output = SolverOutput::optimal(vec![5.0, 0.0, 0.0, 4.0, 4.5, 0.0556]);
        let extracted = extract(&model, &output, 1e-6).unwrap();

        // sales 200 - purchase 50 - strike 4*15
        assert!((extracted.total_revenue - 90.0).abs() < 1e-9);
        assert!((extracted.summary.strike_cost - 60.0).abs() < 1e-9);
        assert_eq!(extracted.summary.operating_cost, 0.0);
    }

    #[test]
    fn test_soc_drift_below_band_rejected() {
        // every discharge passes the bound check, but SoC accumulates below zero
        let model = model_with(&[10.0; 100], battery(), DispatchCosts::default());
        let tolerance = 1e-6 * 10.0;
        let mut values = vec![0.0; model.num_variables()];
        for t in 0..100 {
            values[model.discharge_var(t)] = 0.9 * tolerance;
        }

        let err = extract(&model, &SolverOutput::optimal(values), 1e-6).unwrap_err();
        assert!(matches!(err, SolverError::Numerical(msg) if msg.starts_with("soc[")));
    }

    #[test]
    fn test_missed_terminal_target_rejected() {
        let params = battery().with_terminal_soc_equals_initial();
        let model = model_with(&[10.0, 50.0], params, DispatchCosts::default());
        let output = SolverOutput::optimal(vec![5.0, 0.0, 0.0, 0.0, 4.5, 4.5]);

        let err = extract(&model, &output, 1e-6).unwrap_err();
        assert!(matches!(err, SolverError::Numerical(msg) if msg.contains("terminal")));
    }

    #[test]
    fn test_bound_overshoot_clamped() {
        let half_full = BatteryParameters::from_soc_fractions(10.0, 5.0, 5.0, 0.9, 0.9, 0.0, 1.0, 0.5);
        let model = model_with(&[10.0, 50.0], half_full, DispatchCosts::default());
        let output = SolverOutput::optimal(vec![5.0 + 1e-9, -1e-9, 1e-10, 5.0 - 1e-9, 0.0, 0.0]);
        let extracted = extract(&model, &output, 1e-6).unwrap();

        let entries = extracted.schedule.entries();
        assert_eq!(entries[0].charge, 5.0);
        assert_eq!(entries[1].charge, 0.0);
        // interior values are kept as returned
        assert_eq!(entries[0].discharge, 1e-10);
        assert_eq!(entries[1].discharge, 5.0 - 1e-9);
    }

    #[test]
    fn test_large_negative_power_rejected() {
        let model = model_with(&[10.0], battery(), DispatchCosts::default());
        let output = SolverOutput::optimal(vec![-0.5, 0.0, 0.0]);
        let err = extract(&model, &output, 1e-6).unwrap_err();
        assert!(matches!(err, SolverError::Numerical(msg) if msg.starts_with("charge[0]")));
    }

    #[test]
    fn test_length_mismatch_is_numerical_error() {
        let model = model_with(&[10.0], battery(), DispatchCosts::default());
        let err = extract(&model, &SolverOutput::optimal(vec![1.0]), 1e-6).unwrap_err();
        assert!(matches!(err, SolverError::Numerical(_)));
    }

    #[test]
    fn test_timestamps_follow_horizon() {
        let model = model_with(&[10.0, 20.0, 30.0], battery(), DispatchCosts::default());
        let output = SolverOutput::optimal(vec![0.0; 9]);
        let extracted = extract(&model, &output, 1e-6).unwrap();

        let entries = extracted.schedule.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].time_start, model.input().horizon[1].timestamp);
        assert_eq!(entries[0].time_end, entries[1].time_start);
        assert_eq!(extracted.total_revenue, 0.0);
        assert_eq!(extracted.summary.utilization, 0.0);
    }
}
