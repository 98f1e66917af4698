use chrono::Duration as ChronoDuration;
use chrono::Utc;
use kube_events_exporter::encode_metrics;
use kube_events_exporter::EventCollector;
use kube_events_exporter::EventCounter;
use kube_events_exporter::ExporterConfig;
use kube_events_exporter::ListWatchMetrics;
use prometheus::Registry;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::commons::*;

struct Pipeline {
    events: InMemoryEvents,
    counter: EventCounter,
    metrics: ListWatchMetrics,
    collector: EventCollector,
    shutdown: watch::Sender<()>,
    handles: Vec<JoinHandle<()>>,
}

impl Pipeline {
    fn start(
        config: ExporterConfig,
        events: InMemoryEvents,
    ) -> Self {
        let counter = EventCounter::new().unwrap();
        let metrics = ListWatchMetrics::new().unwrap();
        let collector = EventCollector::new(&config, counter.clone(), metrics.clone());

        let (shutdown, shutdown_rx) = watch::channel(());
        let source = events.clone();
        let handles = collector.run(move |_| source.clone(), shutdown_rx);

        Self {
            events,
            counter,
            metrics,
            collector,
            shutdown,
            handles,
        }
    }

    async fn wait_ready(&self) {
        wait_until("collector readiness", || self.collector.is_ready()).await;
    }

    async fn stop(self) {
        self.shutdown.send(()).unwrap();
        for handle in self.handles {
            tokio::time::timeout(WAIT_TIMEOUT, handle).await.unwrap().unwrap();
        }
    }
}

fn fast_config() -> ExporterConfig {
    let mut config = ExporterConfig::default();
    config.retry.base_delay_ms = 1;
    config.retry.max_delay_ms = 10;
    config
}

#[tokio::test]
async fn test_replayed_events_are_not_counted() {
    let events = InMemoryEvents::default();
    let long_ago = Utc::now() - ChronoDuration::hours(3);
    events.create(event("web.1", "default", "Warning", "BackOff", long_ago, 12));
    events.create(event("web.2", "default", "Normal", "Pulled", long_ago, 1));

    let pipeline = Pipeline::start(fast_config(), events);
    pipeline.wait_ready().await;
    wait_until("watch to open", || pipeline.events.open_watches() == 1).await;

    assert!(pipeline.counter.is_empty());
    assert_eq!(pipeline.metrics.list_count(true), 1);

    pipeline.stop().await;
}

#[tokio::test]
async fn test_new_and_repeated_events_are_counted_by_delta() {
    let events = InMemoryEvents::default();
    let pipeline = Pipeline::start(fast_config(), events);
    pipeline.wait_ready().await;
    wait_until("watch to open", || pipeline.events.open_watches() == 1).await;

    let now = Utc::now() + ChronoDuration::seconds(1);
    let created = event("web.1", "default", "Warning", "BackOff", now, 1);
    pipeline.events.create(created.clone());
    wait_for_count(&pipeline.counter, &key("default", "Warning", "BackOff"), 1.0).await;

    // legacy count goes 1 -> 4
    let repeated_legacy = repeated(&created, now + ChronoDuration::seconds(10), 4, false);
    pipeline.events.update(repeated_legacy.clone());
    wait_for_count(&pipeline.counter, &key("default", "Warning", "BackOff"), 4.0).await;

    // first series observation counts its full count
    let compacted = repeated(&repeated_legacy, now + ChronoDuration::seconds(20), 2, true);
    pipeline.events.update(compacted.clone());
    wait_for_count(&pipeline.counter, &key("default", "Warning", "BackOff"), 6.0).await;

    // series count goes 2 -> 7
    pipeline
        .events
        .update(repeated(&compacted, now + ChronoDuration::seconds(30), 7, true));
    wait_for_count(&pipeline.counter, &key("default", "Warning", "BackOff"), 11.0).await;

    pipeline.stop().await;
}

#[tokio::test]
async fn test_old_event_repeated_after_startup_counts_only_new_occurrences() {
    let events = InMemoryEvents::default();
    let long_ago = Utc::now() - ChronoDuration::hours(1);
    let existing = event("db.1", "default", "Warning", "Unhealthy", long_ago, 30);
    events.create(existing.clone());

    let pipeline = Pipeline::start(fast_config(), events);
    pipeline.wait_ready().await;
    wait_until("watch to open", || pipeline.events.open_watches() == 1).await;

    pipeline
        .events
        .update(repeated(&existing, Utc::now() + ChronoDuration::seconds(1), 33, false));
    wait_for_count(&pipeline.counter, &key("default", "Warning", "Unhealthy"), 3.0).await;

    pipeline.stop().await;
}

#[tokio::test]
async fn test_subscriptions_only_see_their_partition() {
    let mut config = fast_config();
    config.filter.involved_object_namespaces = vec!["default".into(), "kube-system".into()];
    config.filter.event_types = vec!["Warning".into()];

    let pipeline = Pipeline::start(config, InMemoryEvents::default());
    assert_eq!(pipeline.collector.subscriptions().len(), 2);
    pipeline.wait_ready().await;
    wait_until("watches to open", || pipeline.events.open_watches() == 2).await;

    let now = Utc::now() + ChronoDuration::seconds(1);
    pipeline.events.create(event("a.1", "default", "Warning", "BackOff", now, 1));
    pipeline.events.create(event("b.1", "kube-system", "Warning", "BackOff", now, 1));
    pipeline.events.create(event("c.1", "default", "Normal", "Pulled", now, 1));
    pipeline.events.create(event("d.1", "monitoring", "Warning", "BackOff", now, 1));
    pipeline.events.create(event("e.1", "default", "Warning", "Failed", now, 1));

    wait_for_count(&pipeline.counter, &key("default", "Warning", "Failed"), 1.0).await;
    wait_for_count(&pipeline.counter, &key("kube-system", "Warning", "BackOff"), 1.0).await;
    assert_eq!(pipeline.counter.get(&key("default", "Warning", "BackOff")), Some(1.0));
    assert_eq!(pipeline.counter.get(&key("default", "Normal", "Pulled")), None);
    assert_eq!(pipeline.counter.get(&key("monitoring", "Warning", "BackOff")), None);

    pipeline.stop().await;
}

#[tokio::test]
async fn test_expired_watch_relists_without_double_counting() {
    let pipeline = Pipeline::start(fast_config(), InMemoryEvents::default());
    pipeline.wait_ready().await;
    wait_until("watch to open", || pipeline.events.open_watches() == 1).await;

    let now = Utc::now() + ChronoDuration::seconds(1);
    let created = event("web.1", "default", "Warning", "BackOff", now, 1);
    pipeline.events.create(created.clone());
    wait_for_count(&pipeline.counter, &key("default", "Warning", "BackOff"), 1.0).await;

    pipeline.events.expire_watches();
    wait_until("relist", || pipeline.metrics.list_count(true) == 2).await;
    wait_until("watch to reopen", || pipeline.events.open_watches() == 1).await;

    // the relist replays web.1 unchanged: delta 0
    assert_eq!(pipeline.counter.get(&key("default", "Warning", "BackOff")), Some(1.0));

    pipeline
        .events
        .update(repeated(&created, now + ChronoDuration::seconds(5), 2, false));
    wait_for_count(&pipeline.counter, &key("default", "Warning", "BackOff"), 2.0).await;

    pipeline.stop().await;
}

#[tokio::test]
async fn test_list_failures_are_counted_and_retried() {
    let events = InMemoryEvents::default();
    events.fail_lists(2);

    let pipeline = Pipeline::start(fast_config(), events);
    pipeline.wait_ready().await;

    assert_eq!(pipeline.metrics.list_count(false), 2);
    assert_eq!(pipeline.metrics.list_count(true), 1);

    let registry = Registry::new();
    pipeline.metrics.register(&registry).unwrap();
    let body = encode_metrics(&registry).unwrap();
    assert!(body.contains(r#"kube_events_exporter_list_total{resource="Event",result="error"} 2"#));

    pipeline.stop().await;
}

#[tokio::test]
async fn test_controller_allow_list_drops_other_reporters() {
    let mut config = fast_config();
    config.filter.reporting_controllers = vec!["scheduler".into()];

    let pipeline = Pipeline::start(config, InMemoryEvents::default());
    pipeline.wait_ready().await;
    wait_until("watch to open", || pipeline.events.open_watches() == 1).await;

    let now = Utc::now() + ChronoDuration::seconds(1);
    let mut scheduled = event("web.1", "default", "Normal", "Scheduled", now, 1);
    scheduled.reporting_controller = Some("scheduler".into());
    pipeline.events.create(event("web.2", "default", "Warning", "BackOff", now, 1));
    pipeline.events.create(scheduled);

    wait_for_count(&pipeline.counter, &key("default", "Normal", "Scheduled"), 1.0).await;
    assert_eq!(pipeline.counter.get(&key("default", "Warning", "BackOff")), None);

    pipeline.stop().await;
}
