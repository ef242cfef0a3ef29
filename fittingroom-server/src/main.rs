//! HTTP front end for the fitting room.
//!
//! Serves the try-on, generation status, cancel and designer endpoints on
//! top of the Vertex AI and Cloud Storage bindings.

mod server;

use anyhow::Context;
use clap::Parser;
use fittingroom::collaborators::BlobStore;
use fittingroom::designer::ApparelDesigner;
use fittingroom::events::{EventSink, LoggingEventSink};
use fittingroom::observability::init_tracing;
use fittingroom::orchestrator::GenerationOrchestrator;
use fittingroom::vertex::{GcsBlobStore, GeminiRewriter, ImagenGenerator, VertexClient, VertexTryOn, VertexVideo};
use server::config::{CliArgs, ServerConfig};
use server::routes::{router, AppState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    init_tracing(config.log_format).context("failed to install tracing subscriber")?;

    let state = build_state(&config)?;
    let sweeper = config
        .sweep_interval()
        .map(|every| tokio::spawn(run_sweeper(Arc::clone(&state.orchestrator), every)));

    let listener = TcpListener::bind(&config.server_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server_addr))?;
    log_startup_info(&config);

    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    let remaining = state.orchestrator.shutdown().await;
    if remaining > 0 {
        tracing::warn!(remaining, "Video jobs still running at exit");
    }
    tracing::info!("Service shut down successfully");
    Ok(())
}

fn build_state(config: &ServerConfig) -> anyhow::Result<AppState> {
    let client = VertexClient::new(config.vertex.clone());
    let blobs: Arc<dyn BlobStore> = Arc::new(GcsBlobStore::new(client.clone(), config.bucket.clone()));
    let events: Arc<dyn EventSink> = Arc::new(LoggingEventSink::default());

    let orchestrator = GenerationOrchestrator::builder()
        .compositor(Arc::new(VertexTryOn::new(client.clone())))
        .blob_store(Arc::clone(&blobs))
        .video_generator(Arc::new(VertexVideo::new(client.clone())))
        .event_sink(Arc::clone(&events))
        .config(config.orchestrator.clone())
        .build()?;

    let designer = ApparelDesigner::new(
        Arc::new(GeminiRewriter::new(client.clone())),
        Arc::new(ImagenGenerator::new(client)),
        blobs,
    )
    .with_event_sink(events);

    Ok(AppState {
        orchestrator: Arc::new(orchestrator),
        designer: Arc::new(designer),
    })
}

async fn run_sweeper(orchestrator: Arc<GenerationOrchestrator>, every: std::time::Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let removed = orchestrator.sweep_expired();
        if removed > 0 {
            tracing::debug!(removed, "Swept expired generations");
        }
    }
}

fn log_startup_info(config: &ServerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting fitting room on {} with full config: {:#?}",
            config.server_addr,
            config
        );
    } else {
        tracing::info!(
            addr = %config.server_addr,
            bucket = %config.bucket,
            max_concurrent_jobs = config.orchestrator.max_concurrent_jobs,
            "Starting fitting room"
        );
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }

    tracing::info!("Shutdown signal received, terminating gracefully...");
}
