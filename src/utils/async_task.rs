use std::future::Future;

use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;

use crate::Result;

/// Spawns a named background task and tracks its handle.
///
/// Errors returned by the task are logged; they never propagate to the
/// caller.
pub fn spawn_task<F, Fut>(
    name: &str,
    task_fn: F,
    handles: Option<&mut Vec<JoinHandle<()>>>,
) where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let name = name.to_string();
    let handle = tokio::spawn(async move {
        match task_fn().await {
            Ok(()) => debug!(task = %name, "spawned task finished"),
            Err(e) => error!(task = %name, "spawned task stopped with error: {:?}", e),
        }
    });

    if let Some(h) = handles {
        h.push(handle);
    }
}
