//! Reconciliation and allow-list filtering.
//!
//! Every create/update notification passes through [`EventFilter::admit`]
//! before anything is counted. The checks run in this order:
//!
//! 1. **Reconciliation**: the record's latest observed time, truncated to
//!    whole seconds, must not be before the (truncated) startup time. Records
//!    replayed by the initial list are dropped here.
//! 2. **API group**: `involvedObject.apiVersion` must be allow-listed.
//! 3. **Controller**: `reportingComponent` or `source.component` must be
//!    allow-listed. Depending on [`ControllerPolicy`] a miss either drops the
//!    record or keeps it with the reason masked.
//!
//! A rejected record is dropped silently; rejection is not an error.


use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use tracing::trace;

use crate::utils::time::truncate_to_secs;
use crate::CounterKey;
use crate::EventRecord;
use crate::FilterConfig;
use crate::MASKED_REASON;
use crate::WILDCARD;

/// Operator inclusion set, resolved once from configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowList {
    All,
    Subset(BTreeSet<String>),
}

impl AllowList {
    /// `All` when `values` is empty or contains the wildcard sentinel
    pub fn from_values<S: AsRef<str>>(values: &[S]) -> Self {
        let mut set = BTreeSet::new();
        for value in values {
            let value = value.as_ref().trim();
            if value == WILDCARD {
                return AllowList::All;
            }
            set.insert(value.to_string());
        }

        if set.is_empty() {
            AllowList::All
        } else {
            AllowList::Subset(set)
        }
    }

    pub fn allows(
        &self,
        value: &str,
    ) -> bool {
        match self {
            AllowList::All => true,
            AllowList::Subset(set) => set.contains(value),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, AllowList::All)
    }

    /// Members in sorted order; empty for `All`
    pub fn values(&self) -> Vec<&str> {
        match self {
            AllowList::All => Vec::new(),
            AllowList::Subset(set) => set.iter().map(String::as_str).collect(),
        }
    }
}

/// Outcome for events whose controller is not allow-listed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerPolicy {
    /// Do not count the event
    #[default]
    Drop,
    /// Count the event with its reason replaced by `Unknown`
    MaskReason,
}

/// Why a record was not counted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Reconciled,
    ApiGroup,
    Controller,
}

/// Immutable filter context shared by every subscription
#[derive(Debug, Clone)]
pub struct EventFilter {
    startup_time: DateTime<Utc>,
    api_groups: AllowList,
    controllers: AllowList,
    controller_policy: ControllerPolicy,
}

impl EventFilter {
    pub fn new(
        startup_time: DateTime<Utc>,
        api_groups: AllowList,
        controllers: AllowList,
        controller_policy: ControllerPolicy,
    ) -> Self {
        Self {
            startup_time,
            api_groups,
            controllers,
            controller_policy,
        }
    }

    pub fn from_config(
        startup_time: DateTime<Utc>,
        config: &FilterConfig,
    ) -> Arc<Self> {
        Arc::new(Self::new(
            startup_time,
            config.api_groups(),
            config.controllers(),
            config.controller_policy,
        ))
    }

    pub fn startup_time(&self) -> DateTime<Utc> {
        self.startup_time
    }

    pub fn accept(
        &self,
        record: &EventRecord,
    ) -> bool {
        self.admit(record).is_some()
    }

    /// Runs every check and returns the key to count the record under
    pub fn admit(
        &self,
        record: &EventRecord,
    ) -> Option<CounterKey> {
        match self.evaluate(record) {
            Ok(key) => Some(key),
            Err(rejection) => {
                trace!(
                    event = %record.cache_key(),
                    ?rejection,
                    "event filtered out"
                );
                None
            }
        }
    }

    pub fn evaluate(
        &self,
        record: &EventRecord,
    ) -> std::result::Result<CounterKey, Rejection> {
        if self.is_reconciled(record) {
            return Err(Rejection::Reconciled);
        }

        if !self.api_groups.allows(record.involved_object_api_group()) {
            return Err(Rejection::ApiGroup);
        }

        let mut key = record.counter_key();
        if !self.controller_allowed(record) {
            match self.controller_policy {
                ControllerPolicy::Drop => return Err(Rejection::Controller),
                ControllerPolicy::MaskReason => key.reason = MASKED_REASON.to_string(),
            }
        }

        Ok(key)
    }

    /// True when the record was observed strictly before startup
    pub fn is_reconciled(
        &self,
        record: &EventRecord,
    ) -> bool {
        truncate_to_secs(record.latest_observed_time()) < truncate_to_secs(self.startup_time)
    }

    fn controller_allowed(
        &self,
        record: &EventRecord,
    ) -> bool {
        self.controllers.is_all()
            || self.controllers.allows(record.source_component())
            || self.controllers.allows(record.reporting_controller())
    }
}
