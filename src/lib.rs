//! Counts cluster events as Prometheus counters.
//!
//! Events are read through list/watch subscriptions, filtered against the
//! exporter startup time and the configured allow-lists, and accumulated per
//! (type, namespace, kind, reason). Occurrences compacted into a series are
//! counted by their delta, so a repeated event never counts twice.

mod collector;
mod config;
mod constants;
mod delta;
mod errors;
mod event;
mod filter;
mod informer;
mod metrics;
pub mod utils;

pub use collector::*;
pub use config::*;
pub use constants::*;
pub use delta::*;
pub use errors::*;
pub use event::*;
pub use filter::*;
pub use informer::*;
pub use metrics::*;
