//! Price file loading for the command-line runner.
//!
//! Two formats are accepted:
//! - CSV with `timestamp,price` columns (RFC 3339 timestamps; `day_ahead` is
//!   accepted for the price column) and an optional `step_hours` column
//! - JSON holding a full `PriceSeries`

use anyhow::{bail, Context, Result};
use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

use crate::domain::{PricePoint, PriceSeries, StepDurations};

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: DateTime<FixedOffset>,
    #[serde(alias = "day_ahead")]
    price: f64,
    #[serde(default)]
    step_hours: Option<f64>,
}

pub fn load_price_series(path: &Path, default_step_hours: Option<f64>) -> Result<PriceSeries> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open price file {}", path.display()))?;

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let series = if is_json {
        serde_json::from_reader(file)
            .with_context(|| format!("failed to parse price series {}", path.display()))?
    } else {
        read_csv(file, default_step_hours)
            .with_context(|| format!("failed to read price CSV {}", path.display()))?
    };

    tracing::info!(path = %path.display(), steps = series.len(), "loaded price series");
    Ok(series)
}

pub fn read_csv<R: Read>(reader: R, default_step_hours: Option<f64>) -> Result<PriceSeries> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let mut points = Vec::new();
    let mut steps = Vec::new();
    for record in rdr.deserialize() {
        let row: CsvRow = record?;
        points.push(PricePoint::new(row.timestamp, row.price));
        steps.push(row.step_hours);
    }

    let step_hours = if !steps.is_empty() && steps.iter().all(Option::is_some) {
        StepDurations::PerStep(steps.into_iter().flatten().collect())
    } else if steps.iter().any(Option::is_some) {
        bail!("step_hours column must be filled for every row or for none");
    } else if let Some(dt) = default_step_hours {
        StepDurations::Uniform(dt)
    } else {
        StepDurations::Uniform(infer_step_hours(&points)?)
    };

    Ok(PriceSeries::new(points, step_hours))
}

/// Spacing of the first two timestamps, in hours
fn infer_step_hours(points: &[PricePoint]) -> Result<f64> {
    match points {
        [first, second, ..] => {
            Ok((second.timestamp - first.timestamp).num_milliseconds() as f64 / 3_600_000.0)
        }
        _ => bail!("cannot infer step length from fewer than two prices; configure prices.step_minutes"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_csv_infers_uniform_step() {
        let data = "timestamp,price\n\
                    2024-01-01T00:00:00+00:00,42.5\n\
                    2024-01-01T00:30:00+00:00,-3.0\n";
        let series = read_csv(data.as_bytes(), None).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.points[1].price, -3.0);
        assert_eq!(series.step_hours, StepDurations::Uniform(0.5));
    }

    #[test]
    fn test_csv_day_ahead_column_and_configured_step() {
        let data = "timestamp, day_ahead\n2024-01-01T00:00:00+01:00, 61.2\n";
        let series = read_csv(data.as_bytes(), Some(1.0)).unwrap();
        assert_eq!(series.points[0].price, 61.2);
        assert_eq!(series.step_hours, StepDurations::Uniform(1.0));
    }

    #[test]
    fn test_csv_per_step_durations() {
        let data = "timestamp,price,step_hours\n\
                    2024-01-01T00:00:00Z,10,1.0\n\
                    2024-01-01T01:00:00Z,20,0.25\n";
        let series = read_csv(data.as_bytes(), None).unwrap();
        assert_eq!(series.step_hours, StepDurations::PerStep(vec![1.0, 0.25]));
    }

    #[test]
    fn test_csv_single_row_without_step_fails() {
        let data = "timestamp,price\n2024-01-01T00:00:00Z,10\n";
        assert!(read_csv(data.as_bytes(), None).is_err());
    }

    #[test]
    fn test_load_json_series() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"points": [{{"timestamp": "2024-01-01T00:00:00Z", "price": 5.0}}], "step_hours": 0.25}}"#
        )
        .unwrap();

        let series = load_price_series(file.path(), None).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.step_hours, StepDurations::Uniform(0.25));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = load_price_series(Path::new("does/not/exist.csv"), None).unwrap_err();
        assert!(err.to_string().contains("does/not/exist.csv"));
    }
}
