use std::net::SocketAddr;
use std::time::Duration;

use prometheus::Encoder;
use prometheus::Histogram;
use prometheus::HistogramOpts;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use prometheus::TextEncoder;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

use crate::constants::EXPORTER_VERSION;
use crate::constants::REQUESTS_IN_FLIGHT;
use crate::constants::REQUESTS_TOTAL;
use crate::constants::REQUEST_DURATION;
use crate::Readiness;
use crate::Result;
use crate::SystemError;

/// Instrumentation of scrapes against the events `/metrics` endpoint.
///
/// Registered in the exporter registry, so scraping events never changes
/// the events payload itself.
#[derive(Clone)]
pub struct ScrapeMetrics {
    requests_total: IntCounterVec,
    in_flight: IntGauge,
    duration: Histogram,
}

impl ScrapeMetrics {
    pub fn new() -> Result<Self> {
        Ok(Self {
            requests_total: IntCounterVec::new(
                Opts::new(REQUESTS_TOTAL, "Total number of scrapes."),
                &["code"],
            )?,
            in_flight: IntGauge::new(REQUESTS_IN_FLIGHT, "Current number of scrapes being served.")?,
            duration: Histogram::with_opts(HistogramOpts::new(
                REQUEST_DURATION,
                "Duration of all scrapes.",
            ))?,
        })
    }

    pub fn register(
        &self,
        registry: &Registry,
    ) -> Result<()> {
        registry.register(Box::new(self.requests_total.clone()))?;
        registry.register(Box::new(self.in_flight.clone()))?;
        registry.register(Box::new(self.duration.clone()))?;
        Ok(())
    }

    fn observe(
        &self,
        status: StatusCode,
        elapsed: Duration,
    ) {
        self.requests_total.with_label_values(&[status.as_str()]).inc();
        self.duration.observe(elapsed.as_secs_f64());
    }
}

/// Keeps the in-flight gauge raised while a scrape is being served
struct InFlight(IntGauge);

impl InFlight {
    fn enter(gauge: &IntGauge) -> Self {
        gauge.inc();
        Self(gauge.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.dec();
    }
}

/// Adds the version gauge and, on Linux, process metrics to `registry`
pub fn register_exporter_collectors(registry: &Registry) -> Result<()> {
    let version = IntGauge::with_opts(
        Opts::new(EXPORTER_VERSION, "Version of the exporter.")
            .const_label("version", env!("CARGO_PKG_VERSION")),
    )?;
    version.set(1);
    registry.register(Box::new(version))?;

    #[cfg(target_os = "linux")]
    registry.register(Box::new(prometheus::process_collector::ProcessCollector::for_self()))?;

    Ok(())
}

/// Text exposition of everything gathered from `registry`
pub fn encode_metrics(registry: &Registry) -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

fn metrics_reply(registry: &Registry) -> Response {
    match encode_metrics(registry) {
        Ok(body) => warp::reply::with_header(body, "content-type", prometheus::TEXT_FORMAT).into_response(),
        Err(e) => {
            error!("could not encode metrics: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Routes of the events server: `/metrics`, `/healthz` and `/readyz`
pub fn events_routes(
    registry: Registry,
    scrape: ScrapeMetrics,
    readiness: Readiness,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let in_flight = scrape.in_flight.clone();
    let metrics = warp::path!("metrics")
        .and(warp::get())
        .map(move || InFlight::enter(&in_flight))
        .and_then(move |in_flight: InFlight| {
            let registry = registry.clone();
            async move {
                let reply = tokio::task::spawn_blocking(move || metrics_reply(&registry))
                    .await
                    .unwrap_or_else(|e| {
                        error!("metrics encoding task failed: {:?}", e);
                        StatusCode::INTERNAL_SERVER_ERROR.into_response()
                    });
                drop(in_flight);
                Ok::<_, Rejection>(reply)
            }
        })
        .with(warp::log::custom(move |info| scrape.observe(info.status(), info.elapsed())));

    let healthz = warp::path!("healthz").map(|| StatusCode::OK);

    let readyz = warp::path!("readyz").map(move || {
        if readiness.is_ready() {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        }
    });

    metrics.or(healthz).or(readyz)
}

/// Routes of the exporter self-observability server: `/metrics`
pub fn exporter_routes(registry: Registry) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("metrics")
        .and(warp::get())
        .map(move || metrics_reply(&registry))
}

/// Serves `routes` on `addr` until `shutdown` fires
pub async fn serve<F>(
    name: &str,
    addr: SocketAddr,
    routes: F,
    mut shutdown: watch::Receiver<()>,
) -> Result<()>
where
    F: Filter<Error = Rejection> + Clone + Send + Sync + 'static,
    F::Extract: Reply,
{
    let (bound, server) = warp::serve(routes)
        .try_bind_with_graceful_shutdown(addr, async move {
            let _ = shutdown.changed().await;
        })
        .map_err(|source| SystemError::Bind { addr, source })?;

    info!(server = name, %bound, "metrics server listening");
    server.await;
    info!(server = name, "metrics server stopped");
    Ok(())
}
