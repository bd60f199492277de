use serde::{Deserialize, Serialize};

/// Physical limits of the storage device.
///
/// All energies (`capacity`, SoC bounds, `initial_soc`) are absolute energy
/// units; powers are energy units per hour. Every physically meaningful
/// bound must be supplied explicitly, only the optional constraints default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryParameters {
    pub capacity: f64,
    pub max_charge_power: f64,
    pub max_discharge_power: f64,
    pub charge_efficiency: f64,
    pub discharge_efficiency: f64,
    pub min_soc: f64,
    pub max_soc: f64,
    pub initial_soc: f64,
    /// Force the SoC at the end of the horizon back to `initial_soc`
    #[serde(default)]
    pub terminal_soc_equals_initial: bool,
    /// Explicit SoC target at the end of the horizon
    #[serde(default)]
    pub terminal_soc: Option<f64>,
    /// Cap on discharged energy, in multiples of `capacity`
    #[serde(default)]
    pub max_cycles_per_horizon: Option<f64>,
}

impl BatteryParameters {
    /// Build parameters with SoC bounds given as fractions of capacity (0.0-1.0)
    #[allow(clippy::too_many_arguments)]
    pub fn from_soc_fractions(
        capacity: f64,
        max_charge_power: f64,
        max_discharge_power: f64,
        charge_efficiency: f64,
        discharge_efficiency: f64,
        min_soc_fraction: f64,
        max_soc_fraction: f64,
        initial_soc_fraction: f64,
    ) -> Self {
        Self {
            capacity,
            max_charge_power,
            max_discharge_power,
            charge_efficiency,
            discharge_efficiency,
            min_soc: min_soc_fraction * capacity,
            max_soc: max_soc_fraction * capacity,
            initial_soc: initial_soc_fraction * capacity,
            terminal_soc_equals_initial: false,
            terminal_soc: None,
            max_cycles_per_horizon: None,
        }
    }

    /// Split a round-trip efficiency evenly over charging and discharging
    pub fn with_round_trip_efficiency(mut self, round_trip: f64) -> Self {
        let one_way = split_round_trip_efficiency(round_trip);
        self.charge_efficiency = one_way;
        self.discharge_efficiency = one_way;
        self
    }

    pub fn with_terminal_soc_equals_initial(mut self) -> Self {
        self.terminal_soc_equals_initial = true;
        self
    }

    pub fn with_terminal_soc(mut self, soc: f64) -> Self {
        self.terminal_soc = Some(soc);
        self
    }

    pub fn with_max_cycles(mut self, cycles: f64) -> Self {
        self.max_cycles_per_horizon = Some(cycles);
        self
    }

    pub fn round_trip_efficiency(&self) -> f64 {
        self.charge_efficiency * self.discharge_efficiency
    }

    /// SoC the horizon must end at, if any
    pub fn terminal_target(&self) -> Option<f64> {
        if self.terminal_soc_equals_initial {
            Some(self.initial_soc)
        } else {
            self.terminal_soc
        }
    }

    /// Energy cap on total discharge over the horizon, if a cycle limit is set
    pub fn discharge_energy_cap(&self) -> Option<f64> {
        self.max_cycles_per_horizon.map(|cycles| cycles * self.capacity)
    }

    /// Absolute numerical tolerance used when checking schedule invariants
    pub fn tolerance(&self, fraction: f64) -> f64 {
        fraction * self.capacity
    }
}

/// One-way efficiency for a symmetric split of `round_trip`
pub fn split_round_trip_efficiency(round_trip: f64) -> f64 {
    round_trip.max(0.0).sqrt()
}

/// Per-energy-unit operating costs charged on battery throughput.
///
/// Models wear or fees; all default to zero so the objective reduces to
/// pure price arbitrage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchCosts {
    /// Cost per energy unit drawn from the grid for charging
    #[serde(default)]
    pub charge_cost: f64,
    /// Cost per energy unit delivered to the grid when discharging
    #[serde(default)]
    pub discharge_cost: f64,
    /// Minimum margin per discharged energy unit before the battery is
    /// activated; acts as an extra discharge cost
    #[serde(default)]
    pub strike_price: f64,
}

impl DispatchCosts {
    pub fn new(charge_cost: f64, discharge_cost: f64) -> Self {
        Self {
            charge_cost,
            discharge_cost,
            strike_price: 0.0,
        }
    }

    pub fn with_strike_price(mut self, strike_price: f64) -> Self {
        self.strike_price = strike_price;
        self
    }

    /// Everything subtracted per discharged energy unit
    pub fn discharge_total(&self) -> f64 {
        self.discharge_cost + self.strike_price
    }

    pub fn is_zero(&self) -> bool {
        self.charge_cost == 0.0 && self.discharge_cost == 0.0 && self.strike_price == 0.0
    }
}
