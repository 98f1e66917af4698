use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use futures::channel::mpsc;
use futures::StreamExt;
use kube_events_exporter::CounterKey;
use kube_events_exporter::EventCounter;
use kube_events_exporter::EventList;
use kube_events_exporter::EventRecord;
use kube_events_exporter::EventSeries;
use kube_events_exporter::ListMeta;
use kube_events_exporter::ListOptions;
use kube_events_exporter::ListWatcher;
use kube_events_exporter::ObjectMeta;
use kube_events_exporter::ObjectReference;
use kube_events_exporter::Result;
use kube_events_exporter::Status;
use kube_events_exporter::TransportError;
use kube_events_exporter::WatchEvent;
use kube_events_exporter::WatchStream;
use parking_lot::Mutex;
use tokio::time::sleep;
use tokio::time::timeout;

pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

type WatchSender = mpsc::UnboundedSender<Result<WatchEvent>>;

#[derive(Default)]
struct State {
    objects: BTreeMap<String, EventRecord>,
    resource_version: u64,
    watchers: Vec<(Option<String>, WatchSender)>,
    failing_lists: usize,
}

/// Event store served through `ListWatcher`, standing in for the API server
#[derive(Clone, Default)]
pub struct InMemoryEvents {
    state: Arc<Mutex<State>>,
}

impl InMemoryEvents {
    pub fn create(
        &self,
        record: EventRecord,
    ) {
        self.store(record, WatchEvent::Added);
    }

    pub fn update(
        &self,
        record: EventRecord,
    ) {
        self.store(record, WatchEvent::Modified);
    }

    /// Ends every open watch with `410 Gone`
    pub fn expire_watches(&self) {
        let mut state = self.state.lock();
        for (_, tx) in state.watchers.drain(..) {
            let _ = tx.unbounded_send(Ok(WatchEvent::Error(Status {
                code: 410,
                reason: Some("Expired".into()),
                message: Some("too old resource version".into()),
            })));
        }
    }

    /// Makes the next `n` list calls fail
    pub fn fail_lists(
        &self,
        n: usize,
    ) {
        self.state.lock().failing_lists = n;
    }

    pub fn open_watches(&self) -> usize {
        self.state.lock().watchers.iter().filter(|(_, tx)| !tx.is_closed()).count()
    }

    fn store(
        &self,
        mut record: EventRecord,
        notify: fn(EventRecord) -> WatchEvent,
    ) {
        let mut state = self.state.lock();
        state.resource_version += 1;
        record.metadata.resource_version = Some(state.resource_version.to_string());
        state.objects.insert(record.cache_key(), record.clone());

        // drop watchers whose receiver went away
        state.watchers.retain(|(selector, tx)| {
            !matches(selector.as_deref(), &record) || tx.unbounded_send(Ok(notify(record.clone()))).is_ok()
        });
    }
}

fn matches(
    selector: Option<&str>,
    record: &EventRecord,
) -> bool {
    selector.unwrap_or_default().split(',').filter(|t| !t.is_empty()).all(|term| {
        match term.split_once('=') {
            Some(("involvedObject.namespace", ns)) => record.involved_object_namespace() == ns,
            Some(("type", t)) => record.event_type() == t,
            _ => false,
        }
    })
}

#[async_trait]
impl ListWatcher for InMemoryEvents {
    async fn list(
        &self,
        options: &ListOptions,
    ) -> Result<EventList> {
        let mut state = self.state.lock();
        if state.failing_lists > 0 {
            state.failing_lists -= 1;
            return Err(TransportError::Status {
                code: 503,
                message: "apiserver unavailable".into(),
            }
            .into());
        }

        let items = state
            .objects
            .values()
            .filter(|r| matches(options.field_selector.as_deref(), r))
            .cloned()
            .collect();
        Ok(EventList {
            metadata: ListMeta {
                resource_version: Some(state.resource_version.to_string()),
            },
            items,
        })
    }

    async fn watch(
        &self,
        options: &ListOptions,
    ) -> Result<WatchStream> {
        let (tx, rx) = mpsc::unbounded();
        self.state.lock().watchers.push((options.field_selector.clone(), tx));
        Ok(rx.boxed())
    }
}

pub fn event(
    name: &str,
    namespace: &str,
    event_type: &str,
    reason: &str,
    observed: DateTime<Utc>,
    count: i32,
) -> EventRecord {
    EventRecord {
        metadata: ObjectMeta {
            name: Some(name.into()),
            namespace: Some(namespace.into()),
            creation_timestamp: Some(observed),
            ..Default::default()
        },
        involved_object: ObjectReference {
            kind: Some("Pod".into()),
            namespace: Some(namespace.into()),
            name: Some(name.split('.').next().unwrap_or(name).into()),
            api_version: Some("v1".into()),
        },
        reason: Some(reason.into()),
        event_type: Some(event_type.into()),
        count: Some(count),
        reporting_controller: Some("kubelet".into()),
        first_timestamp: Some(observed),
        last_timestamp: Some(observed),
        ..Default::default()
    }
}

/// `record` observed again at `observed`, either as legacy count or series
pub fn repeated(
    record: &EventRecord,
    observed: DateTime<Utc>,
    count: i32,
    as_series: bool,
) -> EventRecord {
    let mut next = record.clone();
    if as_series {
        next.series = Some(EventSeries {
            count: Some(count),
            last_observed_time: Some(observed),
        });
    } else {
        next.count = Some(count);
        next.last_timestamp = Some(observed);
    }
    next
}

pub fn key(
    namespace: &str,
    event_type: &str,
    reason: &str,
) -> CounterKey {
    CounterKey::new(event_type, namespace, "Pod", reason)
}

pub async fn wait_until<F>(
    what: &str,
    condition: F,
) where
    F: Fn() -> bool,
{
    let waited = timeout(WAIT_TIMEOUT, async {
        while !condition() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}");
}

pub async fn wait_for_count(
    counter: &EventCounter,
    key: &CounterKey,
    expected: f64,
) {
    wait_until(&format!("{key:?} == {expected}"), || counter.get(key) == Some(expected)).await;
}
