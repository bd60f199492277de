use anyhow::{Context, Result};
use battery_dispatch::optimizer::{DispatchOptimizer, GoodLpSolver, LpSolver};
use battery_dispatch::{config, prices, telemetry};
use config::Config;
use std::path::PathBuf;
use std::sync::Arc;
use telemetry::init_tracing;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cfg = Config::load()?;

    let price_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| cfg.prices.path.clone());
    let series = prices::load_price_series(&price_path, cfg.prices.step_hours())?;
    let params = cfg.battery.parameters()?;

    let solver = Arc::new(GoodLpSolver::new());
    info!(
        solver = solver.name(),
        steps = series.len(),
        capacity = params.capacity,
        "starting dispatch optimization"
    );

    let optimizer =
        DispatchOptimizer::new(solver, cfg.solver.settings()).with_costs(cfg.costs.into());
    let result = optimizer
        .optimize(&series, &params)
        .await
        .context("dispatch optimization failed")?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
