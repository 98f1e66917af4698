//! Event record model.
//!
//! A versioned snapshot of one cluster event as served by the orchestration
//! API (`core/v1` `Event`). Only the fields the exporter counts, filters or
//! reconciles on are modelled; everything else is ignored on decode.
//!
//! Every field is optional on the wire. Absent strings read as empty and
//! absent counts read as 0, so a record with no `series` is a valid state.

#[cfg(test)]
mod event_test;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub resource_version: Option<String>,
    #[serde(default)]
    pub creation_timestamp: Option<DateTime<Utc>>,
}

/// The resource an event is about
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub api_version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventSource {
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
}

/// Compacted representation of repeated occurrences
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSeries {
    #[serde(default)]
    pub count: Option<i32>,
    #[serde(default)]
    pub last_observed_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub involved_object: ObjectReference,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default, rename = "type")]
    pub event_type: Option<String>,
    /// Legacy cumulative occurrence count
    #[serde(default)]
    pub count: Option<i32>,
    #[serde(default)]
    pub source: Option<EventSource>,
    /// Name of the controller that emitted the event
    #[serde(default, rename = "reportingComponent")]
    pub reporting_controller: Option<String>,
    #[serde(default)]
    pub first_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub event_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub series: Option<EventSeries>,
}

impl EventRecord {
    pub fn event_type(&self) -> &str {
        self.event_type.as_deref().unwrap_or_default()
    }

    pub fn reason(&self) -> &str {
        self.reason.as_deref().unwrap_or_default()
    }

    pub fn involved_object_namespace(&self) -> &str {
        self.involved_object.namespace.as_deref().unwrap_or_default()
    }

    pub fn involved_object_kind(&self) -> &str {
        self.involved_object.kind.as_deref().unwrap_or_default()
    }

    /// `apiVersion` of the involved object, e.g. `v1` or `apps/v1`
    pub fn involved_object_api_group(&self) -> &str {
        self.involved_object.api_version.as_deref().unwrap_or_default()
    }

    pub fn reporting_controller(&self) -> &str {
        self.reporting_controller.as_deref().unwrap_or_default()
    }

    pub fn source_component(&self) -> &str {
        self.source
            .as_ref()
            .and_then(|s| s.component.as_deref())
            .unwrap_or_default()
    }

    pub fn count(&self) -> i32 {
        self.count.unwrap_or_default()
    }

    /// Series count, `None` when the event is not compacted
    pub fn series_count(&self) -> Option<i32> {
        self.series.as_ref().map(|s| s.count.unwrap_or_default())
    }

    pub fn resource_version(&self) -> Option<&str> {
        self.metadata.resource_version.as_deref()
    }

    /// Identity of the record in a local cache: `namespace/name`
    pub fn cache_key(&self) -> String {
        let name = self.metadata.name.as_deref().unwrap_or_default();
        match self.metadata.namespace.as_deref() {
            Some(ns) if !ns.is_empty() => format!("{ns}/{name}"),
            _ => name.to_string(),
        }
    }

    /// Most recent of every timestamp present on the record, starting from
    /// the creation time. A record carrying no timestamp at all is treated
    /// as infinitely old.
    pub fn latest_observed_time(&self) -> DateTime<Utc> {
        let series_time = self.series.as_ref().and_then(|s| s.last_observed_time);

        [
            self.first_timestamp,
            self.last_timestamp,
            self.event_time,
            series_time,
        ]
        .into_iter()
        .flatten()
        .fold(
            self.metadata.creation_timestamp.unwrap_or(DateTime::<Utc>::MIN_UTC),
            |latest, t| latest.max(t),
        )
    }

    /// Label tuple this record is counted under
    pub fn counter_key(&self) -> CounterKey {
        CounterKey {
            event_type: self.event_type().to_string(),
            namespace: self.involved_object_namespace().to_string(),
            kind: self.involved_object_kind().to_string(),
            reason: self.reason().to_string(),
        }
    }
}

/// Labels of `kube_events_total`: (type, involved_object_namespace,
/// involved_object_kind, reason)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CounterKey {
    pub event_type: String,
    pub namespace: String,
    pub kind: String,
    pub reason: String,
}

impl CounterKey {
    pub fn new(
        event_type: impl Into<String>,
        namespace: impl Into<String>,
        kind: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            namespace: namespace.into(),
            kind: kind.into(),
            reason: reason.into(),
        }
    }

    /// Label values in `EVENT_LABELS` order
    pub fn label_values(&self) -> [&str; 4] {
        [&self.event_type, &self.namespace, &self.kind, &self.reason]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMeta {
    #[serde(default)]
    pub resource_version: Option<String>,
}

/// Body of a list call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventList {
    #[serde(default)]
    pub metadata: ListMeta,
    #[serde(default)]
    pub items: Vec<EventRecord>,
}

impl EventList {
    pub fn resource_version(&self) -> Option<&str> {
        self.metadata.resource_version.as_deref()
    }
}
