use std::future::Future;
use std::time::Duration;

use tokio_util::task::TaskTracker;

pub async fn sleep(d: Duration) {
    tokio::time::sleep(d).await;
}

/// Spawns `f` on the current tokio runtime, tracked by `tracker` so it can be awaited on shutdown.
pub fn spawn(tracker: &TaskTracker, f: impl Future<Output = ()> + Send + 'static) {
    tracker.spawn(f);
}
