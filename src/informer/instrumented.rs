use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::ListOptions;
use super::ListWatcher;
use super::WatchStream;
use crate::EventList;
use crate::ListWatchMetrics;
use crate::Result;

/// Adjusts the options of every call before it reaches the wrapped source
pub type OptionsTransform = Arc<dyn Fn(&mut ListOptions) + Send + Sync>;

/// Counts the outcome of every list and watch call.
///
/// Results pass through unchanged and nothing is retried here.
pub struct InstrumentedListWatcher<L> {
    inner: L,
    metrics: ListWatchMetrics,
    transform: Option<OptionsTransform>,
}

impl<L> fmt::Debug for InstrumentedListWatcher<L> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("InstrumentedListWatcher")
            .field("transform", &self.transform.is_some())
            .finish_non_exhaustive()
    }
}

impl<L: ListWatcher> InstrumentedListWatcher<L> {
    pub fn new(
        inner: L,
        metrics: ListWatchMetrics,
    ) -> Self {
        Self {
            inner,
            metrics,
            transform: None,
        }
    }

    pub fn with_transform(
        mut self,
        transform: OptionsTransform,
    ) -> Self {
        self.transform = Some(transform);
        self
    }

    fn prepare(
        &self,
        options: &ListOptions,
    ) -> ListOptions {
        let mut options = options.clone();
        if let Some(transform) = &self.transform {
            transform(&mut options);
        }
        options
    }
}

#[async_trait]
impl<L: ListWatcher> ListWatcher for InstrumentedListWatcher<L> {
    async fn list(
        &self,
        options: &ListOptions,
    ) -> Result<EventList> {
        let options = self.prepare(options);
        let result = self.inner.list(&options).await;
        self.metrics.record_list(result.is_ok());
        result
    }

    async fn watch(
        &self,
        options: &ListOptions,
    ) -> Result<WatchStream> {
        let options = self.prepare(options);
        let result = self.inner.watch(&options).await;
        self.metrics.record_watch(result.is_ok());
        result
    }
}
