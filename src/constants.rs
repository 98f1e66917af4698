use std::time::Duration;

// -
// Allow-lists

/// Configuration value meaning "match everything" in any allow-list
pub const WILDCARD: &str = "";

/// Replacement reason for events reported by a controller outside the allow-list
pub const MASKED_REASON: &str = "Unknown";

// -
// Metric names

pub(crate) const EVENTS_TOTAL: &str = "kube_events_total";
pub(crate) const LIST_TOTAL: &str = "kube_events_exporter_list_total";
pub(crate) const WATCH_TOTAL: &str = "kube_events_exporter_watch_total";
pub(crate) const REQUESTS_TOTAL: &str = "kube_events_exporter_requests_total";
pub(crate) const REQUESTS_IN_FLIGHT: &str = "kube_events_exporter_requests_in_flight";
pub(crate) const REQUEST_DURATION: &str = "kube_events_exporter_request_duration_seconds";
pub(crate) const EXPORTER_VERSION: &str = "kube_events_exporter_version";

/// Label names of `kube_events_total`, in `CounterKey` order
pub(crate) const EVENT_LABELS: [&str; 4] = [
    "type",
    "involved_object_namespace",
    "involved_object_kind",
    "reason",
];

/// Resource label value of the list/watch counters
pub(crate) const EVENT_RESOURCE: &str = "Event";

pub(crate) const RESULT_SUCCESS: &str = "success";
pub(crate) const RESULT_ERROR: &str = "error";

// -
// Watch loop

/// An empty watch that closes sooner than this counts as a failure
pub(crate) const MIN_WATCH_DURATION: Duration = Duration::from_secs(1);

// -
// In-cluster API access

pub(crate) const SERVICE_ACCOUNT_TOKEN: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
pub(crate) const SERVICE_ACCOUNT_CA: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";
pub(crate) const SERVICE_HOST_ENV: &str = "KUBERNETES_SERVICE_HOST";
pub(crate) const SERVICE_PORT_ENV: &str = "KUBERNETES_SERVICE_PORT";
