//! List/watch transport and the resubscribing watch loop.
//!
//! [`ListWatcher`] is the seam to the orchestration API. [`Informer`] drives
//! one `ListWatcher`: it lists, replays the result against its local cache,
//! then watches from the listed resource version and turns every
//! notification into an [`EventHandler`] callback. Failures end the current
//! cycle; the loop backs off and relists.

mod apiserver;
mod instrumented;
mod reflector;
pub use apiserver::*;
pub use instrumented::*;
pub use reflector::*;


use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use serde::Serialize;

use crate::EventList;
use crate::EventRecord;
use crate::Result;
use crate::TransportError;

/// Notifications of one watch request, in the order the server sent them
pub type WatchStream = BoxStream<'static, Result<WatchEvent>>;

/// Query parameters shared by list and watch calls
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Comma separated `field=value` terms
    pub field_selector: Option<String>,
    pub resource_version: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub allow_bookmarks: bool,
}

impl ListOptions {
    /// Appends `selector` to the existing field selector
    pub fn with_field_selector(
        mut self,
        selector: &str,
    ) -> Self {
        self.add_field_selector(selector);
        self
    }

    pub fn add_field_selector(
        &mut self,
        selector: &str,
    ) {
        if selector.is_empty() {
            return;
        }
        self.field_selector = match self.field_selector.take() {
            Some(existing) if !existing.is_empty() => Some(format!("{existing},{selector}")),
            _ => Some(selector.to_string()),
        };
    }
}

/// `Status` object carried by a watch `ERROR` notification
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl From<Status> for TransportError {
    fn from(status: Status) -> Self {
        let message = status
            .message
            .or(status.reason)
            .unwrap_or_else(|| "watch error".to_string());
        if status.code == 410 {
            TransportError::WatchExpired(message)
        } else {
            TransportError::Status {
                code: status.code,
                message,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    Added(EventRecord),
    Modified(EventRecord),
    Deleted(EventRecord),
    /// Progress marker carrying only a resource version
    Bookmark(String),
    Error(Status),
}

/// Source of event snapshots and change notifications
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ListWatcher: Send + Sync + 'static {
    async fn list(
        &self,
        options: &ListOptions,
    ) -> Result<EventList>;

    async fn watch(
        &self,
        options: &ListOptions,
    ) -> Result<WatchStream>;
}

/// Callbacks invoked by [`Informer`]. They run inline on the informer task
/// and must not block.
pub trait EventHandler: Send + Sync + 'static {
    fn on_add(
        &self,
        record: &EventRecord,
    );

    fn on_update(
        &self,
        old: &EventRecord,
        new: &EventRecord,
    );

    fn on_delete(
        &self,
        _record: &EventRecord,
    ) {
    }
}

/// Set once the informer finished its first list
#[derive(Debug, Clone, Default)]
pub struct SyncState(Arc<AtomicBool>);

impl SyncState {
    pub fn mark_synced(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_synced(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
