use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use prometheus::core::Collector;
use prometheus::core::Desc;
use prometheus::proto::Counter;
use prometheus::proto::LabelPair;
use prometheus::proto::Metric;
use prometheus::proto::MetricFamily;
use prometheus::proto::MetricType;
use tracing::debug;
use tracing::warn;

use crate::constants::EVENTS_TOTAL;
use crate::constants::EVENT_LABELS;
use crate::CounterKey;
use crate::Result;

const EVENTS_TOTAL_HELP: &str = "Count of kubernetes events observed by the exporter.";

/// Labeled occurrence counter behind `kube_events_total`.
///
/// Cloning is cheap and every clone shares the same store, so one handle can
/// be registered in a `Registry` while others are handed to subscriptions.
/// Keys are never evicted.
#[derive(Clone)]
pub struct EventCounter {
    desc: Desc,
    values: Arc<Mutex<HashMap<CounterKey, f64>>>,
}

impl EventCounter {
    pub fn new() -> Result<Self> {
        let desc = Desc::new(
            EVENTS_TOTAL.to_string(),
            EVENTS_TOTAL_HELP.to_string(),
            EVENT_LABELS.iter().map(|l| l.to_string()).collect(),
            HashMap::new(),
        )?;

        Ok(Self {
            desc,
            values: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Adds `amount` to the counter of `key`, creating it at zero first.
    ///
    /// Negative amounts come from regressed upstream counts and are applied
    /// unchanged.
    pub fn increment(
        &self,
        key: &CounterKey,
        amount: f64,
    ) {
        if amount < 0.0 {
            warn!(
                ?key,
                amount, "applying negative delta, upstream count went backwards"
            );
        }

        let total = {
            let mut values = self.values.lock();
            let value = values.entry(key.clone()).or_insert(0.0);
            *value += amount;
            *value
        };

        debug!(?key, amount, total, "event counter updated");
    }

    /// Point-in-time copy of every counter, ordered by key
    pub fn observe(&self) -> Vec<(CounterKey, f64)> {
        let mut snapshot: Vec<(CounterKey, f64)> = {
            let values = self.values.lock();
            values.iter().map(|(k, v)| (k.clone(), *v)).collect()
        };
        snapshot.sort_by(|a, b| a.0.cmp(&b.0));
        snapshot
    }

    pub fn get(
        &self,
        key: &CounterKey,
    ) -> Option<f64> {
        self.values.lock().get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn label_pairs(key: &CounterKey) -> Vec<LabelPair> {
    let mut pairs: Vec<LabelPair> = EVENT_LABELS
        .iter()
        .zip(key.label_values())
        .map(|(name, value)| {
            let mut pair = LabelPair::default();
            pair.set_name(name.to_string());
            pair.set_value(value.to_string());
            pair
        })
        .collect();
    pairs.sort_by(|a, b| a.get_name().cmp(b.get_name()));
    pairs
}

impl Collector for EventCounter {
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.desc]
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let mut family = MetricFamily::default();
        family.set_name(EVENTS_TOTAL.to_string());
        family.set_help(EVENTS_TOTAL_HELP.to_string());
        family.set_field_type(MetricType::COUNTER);

        for (key, value) in self.observe() {
            let mut counter = Counter::default();
            counter.set_value(value);

            let mut metric = Metric::default();
            metric.set_label(label_pairs(&key).into());
            metric.set_counter(counter);
            family.mut_metric().push(metric);
        }

        vec![family]
    }
}
