mod config;
mod cycle;
mod housekeeping;
mod logging;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Local;
use tokio::time::MissedTickBehavior;
use watch_logging::watch_info;
use wikiwatch_engine::{
    DedupStore, DispatchSettings, FetchSettings, StatusPublisher, WikiClient, WikiEndpoints,
    WkhtmltoimageRenderer,
};

use crate::config::AppConfig;
use crate::cycle::{CycleDriver, CycleState};

const CONFIG_PATH: &str = "wikiwatch.ron";

// One worker: scan, generate and publish run to completion before the
// next tick, and the weekly cleanup can never interleave with them.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    logging::initialize(logging::LogDestination::Both);

    let config = match AppConfig::load(Path::new(CONFIG_PATH)) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    let cleanup_weekday = match config.cleanup_weekday() {
        Ok(weekday) => weekday,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let store = match DedupStore::load(&config.store_path) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("cannot open dedup store: {err}");
            return ExitCode::FAILURE;
        }
    };
    let endpoints = WikiEndpoints {
        feed_endpoint: config.feed_endpoint.clone(),
        plugin_key: config.plugin_key.clone(),
        feed_rows: config.feed_rows,
        diff_url_template: config.diff_url_template.clone(),
    };
    let client = match WikiClient::new(FetchSettings::default(), endpoints) {
        Ok(client) => client,
        Err(err) => {
            eprintln!("cannot build wiki client: {err}");
            return ExitCode::FAILURE;
        }
    };

    let renderer = Arc::new(WkhtmltoimageRenderer::new(config.renderer_binary.clone()));
    let publisher = Arc::new(StatusPublisher::new(
        config.publish_endpoint.clone(),
        config.access_token.clone(),
    ));
    let mut driver = CycleDriver::new(
        Arc::new(client),
        renderer,
        publisher,
        store,
        DispatchSettings::default(),
        config.pics_dir.clone(),
    );
    let mut state = CycleState::default();

    watch_info!(
        "wikiwatch started: cycle every {:?}, cleanup {} at {:02}:00",
        config.cycle_interval(),
        config.cleanup_weekday,
        config.cleanup_hour
    );

    let mut ticker = tokio::time::interval(config.cycle_interval());
    // A tick delayed by the throttle cooldown should not be followed by a
    // burst of catch-up cycles.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut cycle_number = 0u64;
    loop {
        let cleanup_in = housekeeping::time_until_cleanup(
            Local::now().naive_local(),
            cleanup_weekday,
            config.cleanup_hour,
        );
        tokio::select! {
            _ = ticker.tick() => {
                cycle_number += 1;
                watch_logging::set_cycle(cycle_number);
                watch_info!("cycle {cycle_number} started");
                driver.run_cycle(&mut state).await;
            }
            _ = tokio::time::sleep(cleanup_in) => {
                housekeeping::cleanup_pictures(&config.pics_dir);
            }
        }
    }
}
