mod client;
mod config;
mod wiring;

use std::error::Error;
use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use api::{AppState, EventHub};
use runtime::{
    ActivityCsvWriter, CsvJournalLogWriter, FanOutLogWriter, SimulationController, TokioScheduler,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use traffic_core::{RandomSource, SeededRandom};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    let config = config::Config::from_env()?;
    let journal = initialize_activity_log(&config.activity_log_path)?;
    let store = client::HttpStoreClient::new(config.target_url.clone(), config.request_timeout)?;
    let rng: Box<dyn RandomSource> = match config.seed {
        Some(seed) => Box::new(SeededRandom::new(seed)),
        None => Box::new(SeededRandom::from_entropy()),
    };

    let events = Arc::new(EventHub::new());
    let log = FanOutLogWriter::new()
        .with_writer(events.clone())
        .with_writer(Arc::new(journal));
    let controller = SimulationController::new(
        Arc::new(store),
        Arc::new(TokioScheduler::current()),
        rng,
        Arc::new(log),
    );

    if !controller.probe_health().await {
        tracing::warn!(
            target_url = %config.target_url,
            "storefront is not healthy; simulated requests will fail until it is"
        );
    }

    let app = wiring::build_app(AppState::new(controller, events, config.mode_policy));
    let listener = TcpListener::bind(config.listen_addr).await?;
    tracing::info!(
        addr = %config.listen_addr,
        target_url = %config.target_url,
        mode_policy = config.mode_policy.as_str(),
        activity_log = %config.activity_log_path,
        "traffic lab listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn initialize_activity_log(path: &str) -> Result<CsvJournalLogWriter<File>, std::io::Error> {
    let log_path = Path::new(path);

    if let Some(parent) = log_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
    {
        fs::create_dir_all(parent)?;
    }

    let log_file = File::create(log_path)?;
    let mut csv = ActivityCsvWriter::new(log_file);
    csv.write_header()?;
    Ok(CsvJournalLogWriter::new(csv))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
