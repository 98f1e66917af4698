//! Subscription fan-out.
//!
//! One informer runs per (namespace, event type) pair. Every informer shares
//! the same [`EventFilter`], so all of them agree on the startup instant that
//! separates replayed events from new ones.


use std::fmt;
use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::info;

use crate::delta::updated_occurrences;
use crate::utils::async_task::spawn_task;
use crate::AllowList;
use crate::BackoffPolicy;
use crate::EventCounter;
use crate::EventFilter;
use crate::EventHandler;
use crate::EventRecord;
use crate::ExporterConfig;
use crate::FilterConfig;
use crate::Informer;
use crate::InstrumentedListWatcher;
use crate::ListOptions;
use crate::ListWatchMetrics;
use crate::ListWatcher;
use crate::SyncState;

/// One partition of the event stream. `None` means unfiltered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub namespace: Option<String>,
    pub event_type: Option<String>,
}

impl Subscription {
    /// Cartesian product of the namespace and event type allow-lists
    pub fn from_config(filter: &FilterConfig) -> Vec<Self> {
        let namespaces = partitions(&filter.namespaces());
        let event_types = partitions(&filter.event_types());

        namespaces
            .iter()
            .flat_map(|namespace| {
                event_types.iter().map(move |event_type| Subscription {
                    namespace: namespace.clone(),
                    event_type: event_type.clone(),
                })
            })
            .collect()
    }

    /// Field selector narrowing list/watch calls to this partition
    pub fn field_selector(&self) -> Option<String> {
        let terms: Vec<String> = [
            self.namespace.as_ref().map(|ns| format!("involvedObject.namespace={ns}")),
            self.event_type.as_ref().map(|t| format!("type={t}")),
        ]
        .into_iter()
        .flatten()
        .collect();

        (!terms.is_empty()).then(|| terms.join(","))
    }
}

impl fmt::Display for Subscription {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(
            f,
            "events[namespace={},type={}]",
            self.namespace.as_deref().unwrap_or("*"),
            self.event_type.as_deref().unwrap_or("*")
        )
    }
}

fn partitions(list: &AllowList) -> Vec<Option<String>> {
    match list {
        AllowList::All => vec![None],
        AllowList::Subset(_) => list.values().into_iter().map(|v| Some(v.to_string())).collect(),
    }
}

/// Filters notifications and feeds accepted ones into the counter
#[derive(Clone)]
pub struct CountingHandler {
    filter: Arc<EventFilter>,
    counter: EventCounter,
}

impl CountingHandler {
    pub fn new(
        filter: Arc<EventFilter>,
        counter: EventCounter,
    ) -> Self {
        Self { filter, counter }
    }
}

impl EventHandler for CountingHandler {
    fn on_add(
        &self,
        record: &EventRecord,
    ) {
        if let Some(key) = self.filter.admit(record) {
            self.counter.increment(&key, 1.0);
        }
    }

    fn on_update(
        &self,
        old: &EventRecord,
        new: &EventRecord,
    ) {
        if let Some(key) = self.filter.admit(new) {
            self.counter.increment(&key, updated_occurrences(old, new));
        }
    }
}

/// True once every subscription finished its first list
#[derive(Debug, Clone, Default)]
pub struct Readiness {
    states: Arc<Vec<SyncState>>,
}

impl Readiness {
    pub fn new(states: Vec<SyncState>) -> Self {
        Self {
            states: Arc::new(states),
        }
    }

    pub fn is_ready(&self) -> bool {
        !self.states.is_empty() && self.states.iter().all(SyncState::is_synced)
    }
}

pub struct EventCollector {
    subscriptions: Vec<Subscription>,
    sync_states: Vec<SyncState>,
    filter: Arc<EventFilter>,
    counter: EventCounter,
    list_watch_metrics: ListWatchMetrics,
    retry: BackoffPolicy,
    watch_timeout_secs: u64,
}

impl EventCollector {
    /// Captures the startup instant used to tell replayed events from new ones
    pub fn new(
        config: &ExporterConfig,
        counter: EventCounter,
        list_watch_metrics: ListWatchMetrics,
    ) -> Self {
        Self::with_startup_time(config, Utc::now(), counter, list_watch_metrics)
    }

    pub fn with_startup_time(
        config: &ExporterConfig,
        startup_time: DateTime<Utc>,
        counter: EventCounter,
        list_watch_metrics: ListWatchMetrics,
    ) -> Self {
        let subscriptions = Subscription::from_config(&config.filter);
        let sync_states = subscriptions.iter().map(|_| SyncState::default()).collect();

        Self {
            subscriptions,
            sync_states,
            filter: EventFilter::from_config(startup_time, &config.filter),
            counter,
            list_watch_metrics,
            retry: config.retry,
            watch_timeout_secs: config.apiserver.watch_timeout_secs,
        }
    }

    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    pub fn startup_time(&self) -> DateTime<Utc> {
        self.filter.startup_time()
    }

    pub fn readiness(&self) -> Readiness {
        Readiness::new(self.sync_states.clone())
    }

    pub fn is_ready(&self) -> bool {
        self.readiness().is_ready()
    }

    /// Spawns one informer per subscription and returns without waiting for
    /// any of them to sync.
    pub fn run<F, L>(
        &self,
        factory: F,
        shutdown: watch::Receiver<()>,
    ) -> Vec<JoinHandle<()>>
    where
        F: Fn(&Subscription) -> L,
        L: ListWatcher,
    {
        let mut handles = Vec::with_capacity(self.subscriptions.len());

        for (subscription, synced) in self.subscriptions.iter().zip(&self.sync_states) {
            let mut source = InstrumentedListWatcher::new(factory(subscription), self.list_watch_metrics.clone());
            if let Some(selector) = subscription.field_selector() {
                source = source.with_transform(Arc::new(move |options: &mut ListOptions| {
                    options.add_field_selector(&selector)
                }));
            }

            let name = subscription.to_string();
            let informer = Informer::new(
                name.clone(),
                source,
                CountingHandler::new(self.filter.clone(), self.counter.clone()),
                self.retry,
            )
            .with_watch_timeout(self.watch_timeout_secs)
            .with_sync_state(synced.clone());

            debug!(subscription = %name, selector = ?subscription.field_selector(), "starting subscription");
            let shutdown = shutdown.clone();
            spawn_task(&name, move || informer.run(shutdown), Some(&mut handles));
        }

        info!(
            subscriptions = handles.len(),
            startup_time = %self.startup_time(),
            "event collector started"
        );
        handles
    }
}
