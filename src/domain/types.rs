use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};

// ============================================================================
// Price Input
// ============================================================================

/// One market price observation at the start of a dispatch step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<FixedOffset>,
    /// Currency per energy unit
    pub price: f64,
}

impl PricePoint {
    pub fn new(timestamp: DateTime<FixedOffset>, price: f64) -> Self {
        Self { timestamp, price }
    }
}

/// Step lengths in hours, either one value for every step or one per step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepDurations {
    Uniform(f64),
    PerStep(Vec<f64>),
}

impl StepDurations {
    /// Duration of step `t` in hours, `None` when a per-step list is too short
    pub fn hours_at(&self, t: usize) -> Option<f64> {
        match self {
            StepDurations::Uniform(dt) => Some(*dt),
            StepDurations::PerStep(dts) => dts.get(t).copied(),
        }
    }
}

impl Default for StepDurations {
    fn default() -> Self {
        StepDurations::Uniform(1.0)
    }
}

/// Ordered price curve the battery is dispatched against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub points: Vec<PricePoint>,
    #[serde(default)]
    pub step_hours: StepDurations,
}

impl PriceSeries {
    pub fn new(points: Vec<PricePoint>, step_hours: StepDurations) -> Self {
        Self { points, step_hours }
    }

    /// Evenly spaced series starting at `start`
    pub fn uniform(start: DateTime<FixedOffset>, step_hours: f64, prices: &[f64]) -> Self {
        let step = Duration::milliseconds((step_hours * 3_600_000.0).round() as i64);
        let points = prices
            .iter()
            .enumerate()
            .map(|(i, &price)| PricePoint::new(start + step * i as i32, price))
            .collect();

        Self {
            points,
            step_hours: StepDurations::Uniform(step_hours),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

// ============================================================================
// Horizon
// ============================================================================

/// A validated step of the optimization horizon
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeStep {
    pub index: usize,
    pub timestamp: DateTime<FixedOffset>,
    /// Step length in hours
    pub dt: f64,
    pub price: f64,
}

impl TimeStep {
    pub fn time_end(&self) -> DateTime<FixedOffset> {
        self.timestamp + Duration::milliseconds((self.dt * 3_600_000.0).round() as i64)
    }
}
