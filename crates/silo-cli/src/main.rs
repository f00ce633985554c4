use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use silo_client::{FileSink, HttpFetcher, SearchIndexSink};
use silo_core::runner::JobRunner;
use silo_core::scheduler::Scheduler;
use silo_core::stats::JobStatusReport;
use silo_core::store::DataStore;
use silo_core::transform::TransformerRegistry;
use silo_server::{AppState, router};

mod project;

#[derive(Parser)]
#[command(name = "silo", version, about = "Periodic API fetcher, transformer and cache server")]
struct Cli {
    /// Project directory holding settings.json, job files and .ask queries
    #[arg(short, long, default_value = ".", env = "SILO_DIR")]
    dir: PathBuf,

    /// Override the port from settings.json
    #[arg(short, long, env = "SILO_PORT")]
    port: Option<u16>,

    /// More verbose logging
    #[arg(long, default_value_t = false)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let default_filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    let project = project::read(&cli.dir)
        .with_context(|| format!("failed to load project from {}", cli.dir.display()))?;
    let port = cli.port.unwrap_or(project.settings.port);

    let registry = TransformerRegistry::with_builtins();
    let store = DataStore::new();
    let fetcher = HttpFetcher::new()?;
    let search_sink = SearchIndexSink::new()?;
    let file_sink = project
        .settings
        .file_dir
        .clone()
        .map(|dir| FileSink::new(dir, project.settings.pretty_json));

    let mut scheduler = Scheduler::new();
    for job in project.jobs {
        let checked = job.validate().and_then(|()| registry.validate(&job));
        if let Err(error) = checked {
            tracing::error!(job = %job.id, %error, "Invalid job configuration, not scheduling");
            store.init_job(&job.id);
            store.publish_status(JobStatusReport::invalid(&job.id, &error.to_string()));
            continue;
        }

        tracing::info!(
            job = %job.id,
            interval_secs = job.interval_secs,
            "Added job"
        );
        let runner = JobRunner::new(
            job,
            store.clone(),
            registry.clone(),
            fetcher.clone(),
            Some(search_sink.clone()),
            file_sink.clone(),
        );
        scheduler.spawn(runner);
    }

    let state = Arc::new(AppState {
        store: store.clone(),
        pretty_json: project.settings.pretty_json,
    });
    let app = router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{port}");
    tracing::info!("Serving cached APIs on {addr}");
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("could not bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    tracing::info!("Shutdown signal received");
}
