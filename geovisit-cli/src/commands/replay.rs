//! Replay command - run recorded location events through the pipeline.
//!
//! Zones come from a JSON array of zone definitions; events come from a file
//! with one JSON payload per line. Every line is published as-is, so
//! malformed lines exercise the drop path just as they would from a broker.

use std::path::PathBuf;
use std::sync::Arc;

use geovisit::config::ConfigFile;
use geovisit::store::{MemoryStore, Stores, VisitFilter, ZoneStore};
use geovisit::transport::{MemoryQueue, Publisher};
use geovisit::{AppConfig, GeoVisitApp, NewZone, Visit};
use tracing::{info, warn};

use super::common::{read_json, runtime};
use crate::error::CliError;

/// Arguments for the replay command.
pub struct ReplayArgs {
    pub zones: PathBuf,
    pub events: PathBuf,
    pub workers: Option<usize>,
}

/// Replays the events and returns every visit, closed and active.
pub fn run(args: ReplayArgs, config: &ConfigFile) -> Result<Vec<Visit>, CliError> {
    let zones: Vec<NewZone> = read_json(&args.zones)?;
    let events = std::fs::read_to_string(&args.events).map_err(|source| CliError::Read {
        path: args.events.clone(),
        source,
    })?;

    let mut app_config = AppConfig::from_config_file(config);
    if let Some(workers) = args.workers {
        app_config = app_config.with_workers(workers);
    }

    runtime()?.block_on(async move {
        let store = Arc::new(MemoryStore::new());
        for zone in zones {
            store.create_zone(zone).await?;
        }

        let queue = Arc::new(MemoryQueue::new(config.queue.name.clone()));
        let mut published = 0usize;
        for line in events.lines().map(str::trim).filter(|l| !l.is_empty()) {
            queue
                .publish(line.as_bytes().to_vec())
                .await
                .map_err(|e| CliError::Input(e.to_string()))?;
            published += 1;
        }
        // Workers exit once the queue is drained.
        queue.close();
        info!(events = published, queue = queue.name(), "Events queued for replay");

        let app = GeoVisitApp::start(app_config, Stores::shared(store.clone()), queue).await?;
        let service = app.service();

        let token = app.shutdown_token();
        if let Err(e) = ctrlc::set_handler(move || {
            eprintln!();
            eprintln!("Received shutdown signal, stopping...");
            token.cancel();
        }) {
            warn!(error = %e, "Failed to set signal handler");
        }

        app.wait().await?;

        let visits = service
            .list_visits(VisitFilter::all())
            .await
            .map_err(|e| CliError::Input(e.to_string()))?;
        Ok::<_, CliError>(visits)
    })
}
