use prometheus::IntCounterVec;
use prometheus::Opts;
use prometheus::Registry;

use crate::constants::EVENT_RESOURCE;
use crate::constants::LIST_TOTAL;
use crate::constants::RESULT_ERROR;
use crate::constants::RESULT_SUCCESS;
use crate::constants::WATCH_TOTAL;
use crate::Result;

const LABELS: [&str; 2] = ["result", "resource"];

/// Outcome counters of list and watch calls against the API server
#[derive(Clone)]
pub struct ListWatchMetrics {
    list_total: IntCounterVec,
    watch_total: IntCounterVec,
}

impl ListWatchMetrics {
    pub fn new() -> Result<Self> {
        let list_total = IntCounterVec::new(
            Opts::new(LIST_TOTAL, "Total number of list operations on Events."),
            &LABELS,
        )?;
        let watch_total = IntCounterVec::new(
            Opts::new(WATCH_TOTAL, "Total number of watch operations on Events."),
            &LABELS,
        )?;

        Ok(Self {
            list_total,
            watch_total,
        })
    }

    pub fn register(
        &self,
        registry: &Registry,
    ) -> Result<()> {
        registry.register(Box::new(self.list_total.clone()))?;
        registry.register(Box::new(self.watch_total.clone()))?;
        Ok(())
    }

    pub fn record_list(
        &self,
        success: bool,
    ) {
        self.list_total.with_label_values(&[result_label(success), EVENT_RESOURCE]).inc();
    }

    pub fn record_watch(
        &self,
        success: bool,
    ) {
        self.watch_total.with_label_values(&[result_label(success), EVENT_RESOURCE]).inc();
    }

    pub fn list_count(
        &self,
        success: bool,
    ) -> u64 {
        self.list_total.with_label_values(&[result_label(success), EVENT_RESOURCE]).get()
    }

    pub fn watch_count(
        &self,
        success: bool,
    ) -> u64 {
        self.watch_total.with_label_values(&[result_label(success), EVENT_RESOURCE]).get()
    }
}

fn result_label(success: bool) -> &'static str {
    if success {
        RESULT_SUCCESS
    } else {
        RESULT_ERROR
    }
}
