use std::fs;
use std::path::Path;

use kube_events_exporter::events_routes;
use kube_events_exporter::exporter_routes;
use kube_events_exporter::register_exporter_collectors;
use kube_events_exporter::serve;
use kube_events_exporter::utils::async_task::spawn_task;
use kube_events_exporter::ApiServerListWatcher;
use kube_events_exporter::Error;
use kube_events_exporter::EventCollector;
use kube_events_exporter::EventCounter;
use kube_events_exporter::ExporterConfig;
use kube_events_exporter::ListWatchMetrics;
use kube_events_exporter::LoggingConfig;
use kube_events_exporter::Result;
use kube_events_exporter::ScrapeMetrics;
use kube_events_exporter::SystemError;
use prometheus::Registry;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let config = ExporterConfig::new()?.validate()?;

    // Initializing Logs
    let _guard = init_observability(&config.logging)?;

    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());

    // Registries
    let events_registry = Registry::new();
    let exporter_registry = Registry::new();

    let counter = EventCounter::new()?;
    events_registry.register(Box::new(counter.clone()))?;

    let list_watch_metrics = ListWatchMetrics::new()?;
    list_watch_metrics.register(&exporter_registry)?;
    let scrape_metrics = ScrapeMetrics::new()?;
    scrape_metrics.register(&exporter_registry)?;
    register_exporter_collectors(&exporter_registry)?;

    // Subscriptions
    let source = ApiServerListWatcher::new(&config.apiserver).await?;
    info!(url = source.events_url(), "watching events");

    let collector = EventCollector::new(&config, counter, list_watch_metrics);
    let mut handles = collector.run(|_| source.clone(), graceful_rx.clone());

    // Metrics servers
    let events_addr = config.server.events_addr()?;
    let events = events_routes(events_registry, scrape_metrics, collector.readiness());
    let shutdown = graceful_rx.clone();
    spawn_task(
        "events-server",
        move || serve("events", events_addr, events, shutdown),
        Some(&mut handles),
    );

    let exporter_addr = config.server.exporter_addr()?;
    let exporter = exporter_routes(exporter_registry);
    let shutdown = graceful_rx.clone();
    spawn_task(
        "exporter-server",
        move || serve("exporter", exporter_addr, exporter, shutdown),
        Some(&mut handles),
    );

    info!("Application started. Waiting for CTRL+C signal...");
    if let Err(e) = graceful_shutdown(graceful_tx).await {
        error!("Failed to shutdown: {:?}", e);
    }

    for handle in handles {
        if let Err(e) = handle.await {
            error!("task failed during shutdown: {:?}", e);
        }
    }

    info!("Exiting program.");
    Ok(())
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    info!("Shutdown server..");
    graceful_tx.send(()).map_err(|e| {
        error!("Failed to send shutdown signal: {}", e);
        Error::System(SystemError::SignalSenderClosed(format!(
            "Failed to send shutdown signal: {}",
            e
        )))
    })?;

    info!("Shutdown completed");
    Ok(())
}

/// Logs go to `log_dir/exporter.log` when configured, stderr otherwise.
/// `RUST_LOG` takes precedence over `logging.level`.
pub fn init_observability(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| Error::Fatal(format!("invalid log filter: {e}")))?;

    match &config.log_dir {
        Some(log_dir) => {
            fs::create_dir_all(log_dir)?;
            let appender = tracing_appender::rolling::never(Path::new(log_dir), "exporter.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(filter);
            tracing_subscriber::registry().with(layer).init();
            Ok(Some(guard))
        }
        None => {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(filter);
            tracing_subscriber::registry().with(layer).init();
            Ok(None)
        }
    }
}
