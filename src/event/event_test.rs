use chrono::Duration;
use chrono::TimeZone;

use super::*;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

fn older_event() -> EventRecord {
    let older = now() - Duration::minutes(1);
    EventRecord {
        metadata: ObjectMeta {
            creation_timestamp: Some(older),
            ..Default::default()
        },
        first_timestamp: Some(older),
        last_timestamp: Some(older),
        event_time: Some(older),
        series: Some(EventSeries {
            count: Some(2),
            last_observed_time: Some(older),
        }),
        ..Default::default()
    }
}

#[test]
fn test_latest_observed_time_only_creation() {
    let ev = EventRecord {
        metadata: ObjectMeta {
            creation_timestamp: Some(now()),
            ..Default::default()
        },
        ..Default::default()
    };
    assert_eq!(ev.latest_observed_time(), now());
}

#[test]
fn test_latest_observed_time_picks_newest_field() {
    let newer = now() + Duration::minutes(1);
    let older = now() - Duration::minutes(1);

    let cases: Vec<(&str, fn(&mut EventRecord, DateTime<Utc>))> = vec![
        ("creation", |ev, t| ev.metadata.creation_timestamp = Some(t)),
        ("first_timestamp", |ev, t| ev.first_timestamp = Some(t)),
        ("last_timestamp", |ev, t| ev.last_timestamp = Some(t)),
        ("event_time", |ev, t| ev.event_time = Some(t)),
        ("series", |ev, t| {
            ev.series.as_mut().unwrap().last_observed_time = Some(t)
        }),
    ];

    assert_eq!(older_event().latest_observed_time(), older);

    for (desc, tweak) in cases {
        let mut ev = older_event();
        tweak(&mut ev, newer);
        assert_eq!(ev.latest_observed_time(), newer, "case {desc}");
    }
}

#[test]
fn test_latest_observed_time_without_any_timestamp_is_oldest() {
    let ev = EventRecord::default();
    assert_eq!(ev.latest_observed_time(), DateTime::<Utc>::MIN_UTC);
}

#[test]
fn test_series_count_absent_vs_zero() {
    let mut ev = EventRecord::default();
    assert_eq!(ev.series_count(), None);

    ev.series = Some(EventSeries::default());
    assert_eq!(ev.series_count(), Some(0));
}

#[test]
fn test_counter_key_uses_empty_labels_for_missing_fields() {
    let ev = EventRecord {
        reason: Some("BackOff".into()),
        ..Default::default()
    };
    assert_eq!(ev.counter_key(), CounterKey::new("", "", "", "BackOff"));
}

#[test]
fn test_cache_key() {
    let mut ev = EventRecord::default();
    ev.metadata.name = Some("nginx.17a".into());
    assert_eq!(ev.cache_key(), "nginx.17a");

    ev.metadata.namespace = Some("default".into());
    assert_eq!(ev.cache_key(), "default/nginx.17a");
}

#[test]
fn test_decode_core_v1_event() {
    let raw = r#"{
        "kind": "Event",
        "apiVersion": "v1",
        "metadata": {
            "name": "nginx-7c5ddbdf54-x8f7v.17b8a3c2",
            "namespace": "default",
            "uid": "6e1c9f3a-4b5d-4c8e-9f2a-0b1c2d3e4f5a",
            "resourceVersion": "48211",
            "creationTimestamp": "2024-03-01T12:00:00Z"
        },
        "involvedObject": {
            "kind": "Pod",
            "namespace": "default",
            "name": "nginx-7c5ddbdf54-x8f7v",
            "apiVersion": "v1"
        },
        "reason": "BackOff",
        "message": "Back-off restarting failed container",
        "source": {"component": "kubelet", "host": "node-1"},
        "firstTimestamp": "2024-03-01T11:58:00Z",
        "lastTimestamp": "2024-03-01T12:01:00Z",
        "count": 7,
        "type": "Warning",
        "eventTime": null,
        "reportingComponent": "kubelet",
        "reportingInstance": "node-1"
    }"#;

    let ev: EventRecord = serde_json::from_str(raw).unwrap();

    assert_eq!(ev.event_type(), "Warning");
    assert_eq!(ev.reason(), "BackOff");
    assert_eq!(ev.involved_object_kind(), "Pod");
    assert_eq!(ev.involved_object_namespace(), "default");
    assert_eq!(ev.involved_object_api_group(), "v1");
    assert_eq!(ev.source_component(), "kubelet");
    assert_eq!(ev.reporting_controller(), "kubelet");
    assert_eq!(ev.count(), 7);
    assert_eq!(ev.series_count(), None);
    assert_eq!(ev.resource_version(), Some("48211"));
    assert_eq!(
        ev.latest_observed_time(),
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 1, 0).unwrap()
    );
}

#[test]
fn test_decode_series_with_micro_time() {
    let raw = r#"{
        "metadata": {"name": "a", "creationTimestamp": "2024-03-01T12:00:00Z"},
        "eventTime": "2024-03-01T12:00:00.123456Z",
        "series": {"count": 4, "lastObservedTime": "2024-03-01T12:05:30.654321Z"}
    }"#;

    let ev: EventRecord = serde_json::from_str(raw).unwrap();

    assert_eq!(ev.series_count(), Some(4));
    assert_eq!(
        ev.latest_observed_time(),
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 5, 30).unwrap() + Duration::microseconds(654_321)
    );
}

#[test]
fn test_decode_event_list() {
    let raw = r#"{
        "kind": "EventList",
        "apiVersion": "v1",
        "metadata": {"resourceVersion": "900"},
        "items": [{"metadata": {"name": "a"}}, {"metadata": {"name": "b"}}]
    }"#;

    let list: EventList = serde_json::from_str(raw).unwrap();

    assert_eq!(list.resource_version(), Some("900"));
    assert_eq!(list.items.len(), 2);
}
