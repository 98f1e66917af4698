use std::collections::HashMap;

use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::yield_now;
use tokio::time::sleep;
use tokio::time::Instant;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::EventHandler;
use super::ListOptions;
use super::ListWatcher;
use super::SyncState;
use super::WatchEvent;
use crate::constants::MIN_WATCH_DURATION;
use crate::BackoffPolicy;
use crate::EventList;
use crate::EventRecord;
use crate::Result;
use crate::TransportError;

/// Resubscribing list/watch loop over one [`ListWatcher`].
///
/// Notifications reach the handler in stream order. The cache only lives as
/// long as the informer and is keyed by `namespace/name`.
pub struct Informer<L, H> {
    name: String,
    source: L,
    handler: H,
    retry: BackoffPolicy,
    watch_timeout_secs: Option<u64>,
    cache: HashMap<String, EventRecord>,
    resource_version: Option<String>,
    synced: SyncState,
}

impl<L, H> Informer<L, H>
where
    L: ListWatcher,
    H: EventHandler,
{
    pub fn new(
        name: impl Into<String>,
        source: L,
        handler: H,
        retry: BackoffPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            handler,
            retry,
            watch_timeout_secs: None,
            cache: HashMap::new(),
            resource_version: None,
            synced: SyncState::default(),
        }
    }

    pub fn with_watch_timeout(
        mut self,
        secs: u64,
    ) -> Self {
        self.watch_timeout_secs = Some(secs);
        self
    }

    pub fn with_sync_state(
        mut self,
        synced: SyncState,
    ) -> Self {
        self.synced = synced;
        self
    }

    pub fn sync_state(&self) -> SyncState {
        self.synced.clone()
    }

    /// Runs until `shutdown` fires or its sender is dropped
    pub async fn run(
        mut self,
        mut shutdown: watch::Receiver<()>,
    ) -> Result<()> {
        info!(informer = %self.name, "informer started");
        let mut attempt: u32 = 0;

        loop {
            let err = tokio::select! {
                _ = shutdown.changed() => break,
                result = self.list_and_watch(&mut attempt) => match result {
                    Ok(()) => continue,
                    Err(e) => e,
                },
            };

            let delay = self.retry.delay(attempt);
            attempt = attempt.saturating_add(1);
            warn!(
                informer = %self.name,
                attempt,
                ?delay,
                "list/watch failed, relisting after backoff: {:?}",
                err
            );

            tokio::select! {
                _ = shutdown.changed() => break,
                _ = sleep(delay) => {}
            }
        }

        info!(informer = %self.name, "informer stopped");
        Ok(())
    }

    async fn list_and_watch(
        &mut self,
        attempt: &mut u32,
    ) -> Result<()> {
        self.relist().await?;

        loop {
            self.watch_once(attempt).await?;
            yield_now().await;
        }
    }

    /// Replays a full listing against the cache
    async fn relist(&mut self) -> Result<()> {
        let EventList { metadata, items } = self.source.list(&ListOptions::default()).await?;

        let mut fresh = HashMap::with_capacity(items.len());
        for item in items {
            let key = item.cache_key();
            match self.cache.remove(&key) {
                Some(old) => self.handler.on_update(&old, &item),
                None => self.handler.on_add(&item),
            }
            fresh.insert(key, item);
        }
        for (_, gone) in self.cache.drain() {
            self.handler.on_delete(&gone);
        }

        self.cache = fresh;
        self.resource_version = metadata.resource_version;
        self.synced.mark_synced();

        debug!(
            informer = %self.name,
            cached = self.cache.len(),
            resource_version = ?self.resource_version,
            "list replayed"
        );
        Ok(())
    }

    /// Consumes one watch request. Returns `Ok` when the server closed the
    /// stream normally after delivering something or staying open for
    /// `MIN_WATCH_DURATION`. A watch that proves healthy resets `attempt`.
    async fn watch_once(
        &mut self,
        attempt: &mut u32,
    ) -> Result<()> {
        let options = ListOptions {
            resource_version: self.resource_version.clone(),
            timeout_seconds: self.watch_timeout_secs,
            allow_bookmarks: true,
            ..Default::default()
        };
        let started = Instant::now();
        let mut stream = self.source.watch(&options).await?;
        let mut delivered = false;

        while let Some(event) = stream.next().await {
            match event? {
                WatchEvent::Added(record) | WatchEvent::Modified(record) => self.apply(record),
                WatchEvent::Deleted(record) => self.evict(record),
                WatchEvent::Bookmark(rv) => self.resource_version = Some(rv),
                WatchEvent::Error(status) => return Err(TransportError::from(status).into()),
            }
            delivered = true;
            *attempt = 0;
        }

        let elapsed = started.elapsed();
        if !delivered {
            if elapsed < MIN_WATCH_DURATION {
                return Err(TransportError::ShortWatch(elapsed).into());
            }
            *attempt = 0;
        }

        debug!(informer = %self.name, ?elapsed, "watch stream closed, re-watching");
        Ok(())
    }

    fn apply(
        &mut self,
        record: EventRecord,
    ) {
        self.advance(&record);

        let key = record.cache_key();
        match self.cache.get(&key) {
            Some(old) => self.handler.on_update(old, &record),
            None => self.handler.on_add(&record),
        }
        self.cache.insert(key, record);
    }

    fn evict(
        &mut self,
        record: EventRecord,
    ) {
        self.advance(&record);

        if let Some(old) = self.cache.remove(&record.cache_key()) {
            self.handler.on_delete(&old);
        }
    }

    fn advance(
        &mut self,
        record: &EventRecord,
    ) {
        if let Some(rv) = record.resource_version() {
            self.resource_version = Some(rv.to_string());
        }
    }
}
