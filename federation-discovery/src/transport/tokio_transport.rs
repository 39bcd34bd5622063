use std::{sync::Arc, time::Duration};

use federation_types::ListFederationDatabasesRequest;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, info, trace};

use crate::{
    error::{DiscoveryError, ErrorKind},
    transport::{
        fetch::Fetch, DiscoveryTransport, LocalDatabase, ResponseCallback, TimerCallback,
    },
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const TOKIO_TRANSPORT: &str = "TokioTransport";

/// A [`DiscoveryTransport`] running timers and discovery calls as tasks on the current tokio runtime.
///
/// Must be used from within a tokio runtime.
#[derive(Debug)]
pub struct TokioTransport {
    fetcher: Arc<dyn Fetch>,
    local_database: LocalDatabase,
    request_timeout: Duration,
    tracker: TaskTracker,
    token: CancellationToken,
}

impl TokioTransport {
    /// Creates a new `TokioTransport`.
    pub fn new(fetcher: Arc<dyn Fetch>, local_database: LocalDatabase) -> Self {
        Self {
            fetcher,
            local_database,
            request_timeout: REQUEST_TIMEOUT,
            tracker: TaskTracker::new(),
            token: CancellationToken::new(),
        }
    }

    /// Sets the client-side timeout of a single discovery call.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancels all pending timers and calls, and waits for their tasks to finish.
    pub async fn shutdown(&self) {
        self.token.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!("{TOKIO_TRANSPORT}: gracefully stopped");
    }
}

impl DiscoveryTransport for TokioTransport {
    fn create_context(&self) -> Option<CancellationToken> {
        if self.token.is_cancelled() {
            return None;
        }
        Some(self.token.child_token())
    }

    fn send_discovery_request(
        &self,
        request: ListFederationDatabasesRequest,
        token: CancellationToken,
        callback: ResponseCallback,
    ) {
        let fetcher = Arc::clone(&self.fetcher);
        let timeout = self.request_timeout;
        crate::util::spawn(&self.tracker, async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    trace!("{TOKIO_TRANSPORT}: discovery call cancelled");
                }
                result = tokio::time::timeout(timeout, fetcher.fetch(request)) => {
                    let response = result.unwrap_or_else(|_| {
                        Err(DiscoveryError::new(
                            ErrorKind::Timeout,
                            format!("no response within {timeout:?}"),
                        ))
                    });
                    callback(response);
                }
            }
        });
    }

    fn schedule_callback(&self, delay: Duration, token: CancellationToken, callback: TimerCallback) {
        crate::util::spawn(&self.tracker, async move {
            let fired = tokio::select! {
                biased;
                _ = token.cancelled() => false,
                _ = crate::util::sleep(delay) => true,
            };
            debug!("{TOKIO_TRANSPORT}: timer after {delay:?} fired={fired}");
            callback(fired);
        });
    }

    fn local_database(&self) -> LocalDatabase {
        self.local_database.clone()
    }
}
