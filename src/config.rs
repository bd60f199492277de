use anyhow::{bail, Result};
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::{split_round_trip_efficiency, BatteryParameters, DispatchCosts};
use crate::optimizer::SolverSettings;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub battery: BatteryConfig,
    #[serde(default)]
    pub costs: CostsConfig,
    #[serde(default)]
    pub solver: SolverConfig,
    pub prices: PricesConfig,
}

/// Battery limits; SoC values are percent of capacity
#[derive(Debug, Clone, Deserialize)]
pub struct BatteryConfig {
    pub capacity: f64,
    pub max_charge_power: f64,
    pub max_discharge_power: f64,
    pub charge_efficiency: Option<f64>,
    pub discharge_efficiency: Option<f64>,
    pub round_trip_efficiency: Option<f64>,
    pub min_soc_percent: f64,
    pub max_soc_percent: f64,
    pub initial_soc_percent: f64,
    #[serde(default)]
    pub terminal_soc_equals_initial: bool,
    pub terminal_soc_percent: Option<f64>,
    pub max_cycles_per_horizon: Option<f64>,
}

impl BatteryConfig {
    pub fn parameters(&self) -> Result<BatteryParameters> {
        let (charge_efficiency, discharge_efficiency) = match (
            self.charge_efficiency,
            self.discharge_efficiency,
            self.round_trip_efficiency,
        ) {
            (Some(c), Some(d), None) => (c, d),
            (None, None, Some(rt)) => {
                let one_way = split_round_trip_efficiency(rt);
                (one_way, one_way)
            }
            (None, None, None) => bail!(
                "battery efficiency missing: set charge_efficiency and discharge_efficiency, or round_trip_efficiency"
            ),
            _ => bail!(
                "battery efficiency ambiguous: set either both one-way efficiencies or round_trip_efficiency"
            ),
        };

        let percent = |p: f64| p / 100.0 * self.capacity;

        Ok(BatteryParameters {
            capacity: self.capacity,
            max_charge_power: self.max_charge_power,
            max_discharge_power: self.max_discharge_power,
            charge_efficiency,
            discharge_efficiency,
            min_soc: percent(self.min_soc_percent),
            max_soc: percent(self.max_soc_percent),
            initial_soc: percent(self.initial_soc_percent),
            terminal_soc_equals_initial: self.terminal_soc_equals_initial,
            terminal_soc: self.terminal_soc_percent.map(percent),
            max_cycles_per_horizon: self.max_cycles_per_horizon,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct CostsConfig {
    #[serde(default)]
    pub charge_cost: f64,
    #[serde(default)]
    pub discharge_cost: f64,
    /// Required margin per discharged energy unit
    #[serde(default)]
    pub strike_price: f64,
}

impl From<CostsConfig> for DispatchCosts {
    fn from(c: CostsConfig) -> Self {
        DispatchCosts::new(c.charge_cost, c.discharge_cost).with_strike_price(c.strike_price)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub time_limit_seconds: u64,
    pub tolerance_fraction: f64,
    pub throughput_penalty: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        let defaults = SolverSettings::default();
        Self {
            time_limit_seconds: defaults.time_limit.as_secs(),
            tolerance_fraction: defaults.tolerance_fraction,
            throughput_penalty: defaults.throughput_penalty,
        }
    }
}

impl SolverConfig {
    pub fn settings(&self) -> SolverSettings {
        SolverSettings {
            time_limit: Duration::from_secs(self.time_limit_seconds),
            tolerance_fraction: self.tolerance_fraction,
            throughput_penalty: self.throughput_penalty,
            equilibrate: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PricesConfig {
    pub path: PathBuf,
    /// Step length when the price file does not carry one
    pub step_minutes: Option<u32>,
}

impl PricesConfig {
    pub fn step_hours(&self) -> Option<f64> {
        self.step_minutes.map(|m| m as f64 / 60.0)
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file("config/default.toml"))
                .merge(Env::prefixed("DISPATCH__").split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        Ok(figment.extract()?)
    }
}
