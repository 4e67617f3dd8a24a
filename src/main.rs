use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use railtrace::services::{CrowdStore, DataStore};
use railtrace::structures::Config;
use railtrace::tracking::{DelaySimulator, TimelineGenerator};
use railtrace::web::app::server;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config_path = std::env::args().nth(1).unwrap_or("config.yml".to_string());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {config_path}: {e}");
            return;
        }
    };

    let data = Arc::new(DataStore::new(config.data.clone()));
    let crowd = Arc::new(CrowdStore::new(config.crowd.clone()));
    let delays = Arc::new(DelaySimulator::new(config.delay.clone()));
    let timeline = Arc::new(TimelineGenerator::new(
        data.clone(),
        crowd.clone(),
        delays.clone(),
    ));

    // A failed initial load is not fatal; queries report Unavailable until
    // a later refresh succeeds.
    match data.load() {
        Ok(counts) => info!(?counts, "reference data loaded"),
        Err(e) => warn!(error = %e, "initial data load failed, starting without a snapshot"),
    }

    {
        let data = data.clone();
        let crowd = crowd.clone();
        let period = Duration::from_secs(config.data.cache_seconds.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = data.refresh(false) {
                    error!(error = %e, "background refresh failed");
                }
                crowd.sweep(Local::now().naive_local());
            }
        });
    }

    if let Err(e) = server(&config.server.bind, data, crowd, timeline).await {
        eprintln!("Server error: {e}");
    }
}
