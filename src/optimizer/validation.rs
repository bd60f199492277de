//! Input checks run before any LP is assembled.
//!
//! Validation stops at the first violation and never patches values.

use itertools::Itertools;

use super::ValidationError;
use crate::domain::{BatteryParameters, DispatchCosts, PriceSeries, StepDurations, TimeStep};

/// Input that passed every check, ready for the problem builder
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedInput {
    pub horizon: Vec<TimeStep>,
    pub params: BatteryParameters,
    pub costs: DispatchCosts,
}

impl ValidatedInput {
    pub fn len(&self) -> usize {
        self.horizon.len()
    }

    pub fn is_empty(&self) -> bool {
        self.horizon.is_empty()
    }
}

type Check = Result<(), ValidationError>;

/// Validate battery parameters against a price series with zero throughput costs
pub fn validate(
    params: &BatteryParameters,
    prices: &PriceSeries,
) -> Result<ValidatedInput, ValidationError> {
    validate_with_costs(params, prices, &DispatchCosts::default())
}

pub fn validate_with_costs(
    params: &BatteryParameters,
    prices: &PriceSeries,
    costs: &DispatchCosts,
) -> Result<ValidatedInput, ValidationError> {
    let horizon = validate_horizon(prices)?;
    validate_battery(params)?;
    validate_costs(costs)?;

    if params.initial_soc < params.min_soc || params.initial_soc > params.max_soc {
        tracing::warn!(
            initial_soc = params.initial_soc,
            min_soc = params.min_soc,
            max_soc = params.max_soc,
            "initial SoC outside SoC band; first step must restore it"
        );
    }

    Ok(ValidatedInput {
        horizon,
        params: params.clone(),
        costs: *costs,
    })
}

fn validate_horizon(prices: &PriceSeries) -> Result<Vec<TimeStep>, ValidationError> {
    if prices.is_empty() {
        return Err(ValidationError::new("prices", "horizon must contain at least one step"));
    }

    if let StepDurations::PerStep(dts) = &prices.step_hours {
        if dts.len() != prices.len() {
            return Err(ValidationError::new(
                "step_hours",
                format!(
                    "{} step durations given for {} price points",
                    dts.len(),
                    prices.len()
                ),
            ));
        }
    }

    let mut horizon = Vec::with_capacity(prices.len());
    for (t, point) in prices.points.iter().enumerate() {
        let dt = prices.step_hours.hours_at(t).unwrap_or(f64::NAN);
        if !dt.is_finite() || dt <= 0.0 {
            return Err(ValidationError::new(
                format!("step_hours[{}]", t),
                format!("duration must be a positive number of hours, got {}", dt),
            ));
        }
        if !point.price.is_finite() {
            return Err(ValidationError::new(
                format!("prices[{}].price", t),
                format!("price must be finite, got {}", point.price),
            ));
        }
        horizon.push(TimeStep {
            index: t,
            timestamp: point.timestamp,
            dt,
            price: point.price,
        });
    }

    if let Some((prev, next)) = horizon
        .iter()
        .tuple_windows()
        .find(|(a, b)| b.timestamp <= a.timestamp)
    {
        return Err(ValidationError::new(
            format!("prices[{}].timestamp", next.index),
            format!(
                "timestamps must be strictly increasing ({} follows {})",
                next.timestamp, prev.timestamp
            ),
        ));
    }

    Ok(horizon)
}

fn positive(field: &str, value: f64) -> Check {
    if !value.is_finite() || value <= 0.0 {
        return Err(ValidationError::new(
            field,
            format!("must be a positive finite number, got {}", value),
        ));
    }
    Ok(())
}

fn efficiency(field: &str, value: f64) -> Check {
    if !value.is_finite() || value <= 0.0 || value > 1.0 {
        return Err(ValidationError::new(
            field,
            format!("must lie in (0, 1], got {}", value),
        ));
    }
    Ok(())
}

fn within(field: &str, value: f64, lo: f64, hi: f64) -> Check {
    if !value.is_finite() || value < lo || value > hi {
        return Err(ValidationError::new(
            field,
            format!("must lie in [{}, {}], got {}", lo, hi, value),
        ));
    }
    Ok(())
}

fn non_negative(field: &str, value: f64) -> Check {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::new(
            field,
            format!("must be a non-negative finite number, got {}", value),
        ));
    }
    Ok(())
}

fn validate_battery(params: &BatteryParameters) -> Check {
    positive("capacity", params.capacity)?;
    positive("max_charge_power", params.max_charge_power)?;
    positive("max_discharge_power", params.max_discharge_power)?;
    efficiency("charge_efficiency", params.charge_efficiency)?;
    efficiency("discharge_efficiency", params.discharge_efficiency)?;
    within("min_soc", params.min_soc, 0.0, params.capacity)?;
    within("max_soc", params.max_soc, 0.0, params.capacity)?;

    if params.min_soc > params.max_soc {
        return Err(ValidationError::new(
            "min_soc",
            format!(
                "min_soc ({}) must not exceed max_soc ({})",
                params.min_soc, params.max_soc
            ),
        ));
    }

    within("initial_soc", params.initial_soc, 0.0, params.capacity)?;

    if let Some(target) = params.terminal_soc {
        within("terminal_soc", target, params.min_soc, params.max_soc)?;
        if params.terminal_soc_equals_initial && target != params.initial_soc {
            return Err(ValidationError::new(
                "terminal_soc",
                format!(
                    "target {} conflicts with terminal_soc_equals_initial (initial_soc {})",
                    target, params.initial_soc
                ),
            ));
        }
    }

    if let Some(cycles) = params.max_cycles_per_horizon {
        non_negative("max_cycles_per_horizon", cycles)?;
    }

    Ok(())
}

fn validate_costs(costs: &DispatchCosts) -> Check {
    non_negative("charge_cost", costs.charge_cost)?;
    non_negative("discharge_cost", costs.discharge_cost)?;
    non_negative("strike_price", costs.strike_price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use rstest::rstest;

    fn prices(values: &[f64]) -> PriceSeries {
        let start = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 1, 0, 0, 0)
            .unwrap();
        PriceSeries::uniform(start, 1.0, values)
    }

    fn battery() -> BatteryParameters {
        BatteryParameters::from_soc_fractions(10.0, 5.0, 5.0, 1.0, 1.0, 0.0, 1.0, 0.0)
    }

    #[test]
    fn test_valid_input_builds_horizon() {
        let input = validate(&battery(), &prices(&[10.0, 50.0, 10.0])).unwrap();
        assert_eq!(input.len(), 3);
        assert_eq!(input.horizon[1].index, 1);
        assert_eq!(input.horizon[1].price, 50.0);
        assert_eq!(input.horizon[1].dt, 1.0);
        assert!(input.costs.is_zero());
    }

    #[test]
    fn test_empty_horizon_rejected() {
        let err = validate(&battery(), &prices(&[])).unwrap_err();
        assert_eq!(err.field, "prices");
    }

    #[test]
    fn test_per_step_length_mismatch_rejected() {
        let mut series = prices(&[1.0, 2.0, 3.0]);
        series.step_hours = StepDurations::PerStep(vec![1.0, 1.0]);
        let err = validate(&battery(), &series).unwrap_err();
        assert_eq!(err.field, "step_hours");
    }

    #[test]
    fn test_non_positive_step_rejected() {
        let mut series = prices(&[1.0, 2.0, 3.0]);
        series.step_hours = StepDurations::PerStep(vec![1.0, 0.0, 1.0]);
        let err = validate(&battery(), &series).unwrap_err();
        assert_eq!(err.field, "step_hours[1]");
    }

    #[test]
    fn test_nan_price_rejected() {
        let err = validate(&battery(), &prices(&[1.0, f64::NAN])).unwrap_err();
        assert_eq!(err.field, "prices[1].price");
    }

    #[test]
    fn test_negative_price_accepted() {
        assert!(validate(&battery(), &prices(&[-25.0, 40.0])).is_ok());
    }

    #[test]
    fn test_unordered_timestamps_rejected() {
        let mut series = prices(&[1.0, 2.0, 3.0]);
        series.points.swap(1, 2);
        let err = validate(&battery(), &series).unwrap_err();
        assert_eq!(err.field, "prices[2].timestamp");
    }

    #[rstest]
    #[case::zero_capacity(|p: &mut BatteryParameters| p.capacity = 0.0, "capacity")]
    #[case::negative_charge_power(|p: &mut BatteryParameters| p.max_charge_power = -1.0, "max_charge_power")]
    #[case::zero_discharge_power(|p: &mut BatteryParameters| p.max_discharge_power = 0.0, "max_discharge_power")]
    #[case::charge_efficiency_above_one(|p: &mut BatteryParameters| p.charge_efficiency = 1.2, "charge_efficiency")]
    #[case::zero_discharge_efficiency(|p: &mut BatteryParameters| p.discharge_efficiency = 0.0, "discharge_efficiency")]
    #[case::negative_min_soc(|p: &mut BatteryParameters| p.min_soc = -0.5, "min_soc")]
    #[case::max_soc_above_capacity(|p: &mut BatteryParameters| p.max_soc = 11.0, "max_soc")]
    #[case::inverted_band(|p: &mut BatteryParameters| { p.min_soc = 8.0; p.max_soc = 4.0; }, "min_soc")]
    #[case::initial_above_capacity(|p: &mut BatteryParameters| p.initial_soc = 12.0, "initial_soc")]
    #[case::terminal_outside_band(|p: &mut BatteryParameters| { p.max_soc = 8.0; p.terminal_soc = Some(9.0); }, "terminal_soc")]
    #[case::terminal_conflict(|p: &mut BatteryParameters| { p.terminal_soc = Some(4.0); p.terminal_soc_equals_initial = true; }, "terminal_soc")]
    #[case::negative_cycles(|p: &mut BatteryParameters| p.max_cycles_per_horizon = Some(-1.0), "max_cycles_per_horizon")]
    #[case::infinite_capacity(|p: &mut BatteryParameters| p.capacity = f64::INFINITY, "capacity")]
    fn test_battery_bounds(#[case] mutate: fn(&mut BatteryParameters), #[case] field: &str) {
        let mut params = battery();
        mutate(&mut params);
        let err = validate(&params, &prices(&[10.0, 20.0])).unwrap_err();
        assert_eq!(err.field, field, "unexpected error: {}", err);
    }

    #[test]
    fn test_first_violation_wins() {
        let mut params = battery();
        params.capacity = -1.0;
        params.charge_efficiency = 2.0;
        let err = validate(&params, &prices(&[1.0])).unwrap_err();
        assert_eq!(err.field, "capacity");
    }

    #[test]
    fn test_pinned_soc_band_accepted() {
        let params = BatteryParameters::from_soc_fractions(10.0, 5.0, 5.0, 1.0, 1.0, 0.5, 0.5, 0.5);
        assert!(validate(&params, &prices(&[1.0, 2.0])).is_ok());
    }

    #[test]
    fn test_initial_below_band_left_to_solver() {
        let params = BatteryParameters::from_soc_fractions(10.0, 1.0, 1.0, 1.0, 1.0, 0.9, 1.0, 0.0);
        assert!(validate(&params, &prices(&[1.0, 2.0])).is_ok());
    }

    #[test]
    fn test_negative_costs_rejected() {
        let err = validate_with_costs(
            &battery(),
            &prices(&[1.0]),
            &DispatchCosts::new(0.0, -2.0),
        )
        .unwrap_err();
        assert_eq!(err.field, "discharge_cost");
    }

    #[test]
    fn test_negative_strike_price_rejected() {
        let costs = DispatchCosts::default().with_strike_price(-1.0);
        let err = validate_with_costs(&battery(), &prices(&[1.0]), &costs).unwrap_err();
        assert_eq!(err.field, "strike_price");
    }
}
