use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use setpoint_optimizer::config::Config;
use setpoint_optimizer::controller::{HomeSettings, NightlyScheduler, OptimizationService};
use setpoint_optimizer::forecast::NoForecast;
use setpoint_optimizer::telemetry::{init_tracing, shutdown_signal};
use tracing::{info, warn};

#[derive(Debug, Default, Deserialize)]
struct HomesFile {
    #[serde(default)]
    homes: Vec<HomeSettings>,
}

fn load_homes(path: &Path) -> Result<Vec<HomeSettings>> {
    if !path.exists() {
        warn!(path = %path.display(), "No homes file found, starting with no registered homes");
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let file: HomesFile = toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    Ok(file.homes)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cfg = Config::load()?;
    init_tracing(&cfg.logging);

    let homes_path = std::env::var("SETPOINT_HOMES_FILE").unwrap_or_else(|_| "config/homes.toml".to_string());

    let service = OptimizationService::new(cfg, Arc::new(NoForecast))?;
    for home in load_homes(Path::new(&homes_path))? {
        let id = home.home_id.clone();
        service
            .register_home(home)
            .with_context(|| format!("registering home {id}"))?;
    }
    let service = Arc::new(service);
    info!(homes = service.home_ids().len(), "starting setpoint optimizer");

    let scheduler = Arc::new(NightlyScheduler::new(service.clone())?);
    scheduler.clone().start();

    shutdown_signal().await;

    let status = scheduler.status().await;
    warn!(
        nightly_runs = status.run_count,
        nightly_failures = status.error_count,
        "shutdown complete"
    );
    Ok(())
}
