//! Prometheus exposition.
//!
//! Two registries are kept apart: the events registry only carries
//! `kube_events_total`, while the exporter registry carries everything about
//! the exporter itself (list/watch outcomes, scrape instrumentation, version
//! and process metrics).

mod counter;
mod list_watch;
mod server;
pub use counter::*;
pub use list_watch::*;
pub use server::*;
