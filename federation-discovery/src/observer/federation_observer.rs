//! The background observer keeping the federation topology up to date.

use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use arc_swap::ArcSwap;
use federation_types::{ListFederationDatabasesRequest, ListFederationDatabasesResult};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    config::ObserverConfig,
    error::{DiscoveryError, ErrorKind},
    observer::{
        first_state::FirstStateSignal,
        retry::{RetryPolicy, RetryState},
        state::FederatedDbState,
    },
    transport::DiscoveryTransport,
};

/// Delay between two successful discoveries.
pub const REDISCOVERY_DELAY: Duration = Duration::from_secs(30);

const FEDERATION_OBSERVER: &str = "FederationObserver";

/// Periodically discovers the member databases of a federation and publishes them as immutable snapshots.
///
/// The observer owns no thread: every step runs inside a callback delivered by the [`DiscoveryTransport`].
/// At most one timer or discovery call is outstanding at any time.
///
/// Dropping the observer stops it.
#[derive(Debug)]
pub struct FederationObserver {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    transport: Arc<dyn DiscoveryTransport>,
    retry_policy: Arc<dyn RetryPolicy>,
    control: Mutex<ControlState>,
    /// Only stored to while `control` is locked.
    snapshot: ArcSwap<FederatedDbState>,
    first_state: FirstStateSignal,
}

/// Mutable state guarded by `Inner::control`. Methods suffixed `_locked` take it by `&mut`,
/// which can only be obtained through the guard.
#[derive(Debug, Default)]
struct ControlState {
    started: bool,
    stopping: bool,
    /// Token of the single outstanding timer or discovery call.
    context: Option<CancellationToken>,
    /// Present for the duration of a streak of failures.
    retry_state: Option<Box<dyn RetryState>>,
}

/// A builder for the [`FederationObserver`].
#[derive(Debug)]
pub struct FederationObserverBuilder {
    transport: Arc<dyn DiscoveryTransport>,
    config: ObserverConfig,
}

impl FederationObserverBuilder {
    /// Sets the policy used to retry failed discoveries.
    pub fn with_retry_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
        self.config.retry_policy = policy;
        self
    }

    /// Replaces the whole configuration.
    pub fn with_config(mut self, config: ObserverConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the observer. Discovery begins once [`start`](FederationObserver::start) is called.
    pub fn build(self) -> FederationObserver {
        FederationObserver::new(self.transport, self.config)
    }
}

impl FederationObserver {
    /// Creates a new observer. Nothing is scheduled until [`start`](Self::start) is called.
    pub fn new(transport: Arc<dyn DiscoveryTransport>, config: ObserverConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                retry_policy: config.retry_policy,
                control: Mutex::new(ControlState::default()),
                snapshot: ArcSwap::from_pointee(FederatedDbState::default()),
                first_state: FirstStateSignal::new(),
            }),
        }
    }

    /// Creates a builder with the default configuration.
    pub fn builder(transport: Arc<dyn DiscoveryTransport>) -> FederationObserverBuilder {
        FederationObserverBuilder {
            transport,
            config: ObserverConfig::default(),
        }
    }

    /// Schedules the first discovery immediately. Does nothing if the observer was already started or stopped.
    pub fn start(&self) {
        let mut control = self.inner.lock();
        if control.stopping || control.started {
            return;
        }
        control.started = true;
        info!("{FEDERATION_OBSERVER}: started");
        self.inner
            .schedule_discovery_locked(&mut control, Duration::ZERO);
    }

    /// Stops the observer and cancels the outstanding timer or call. Idempotent.
    ///
    /// A response that is already on its way is dropped when it arrives.
    pub fn stop(&self) {
        let context = {
            let mut control = self.inner.lock();
            if !control.stopping {
                info!("{FEDERATION_OBSERVER}: stopping");
            }
            control.stopping = true;
            control.context.take()
        };
        // Cancelled after unlocking: the callback owning this token takes the lock as well.
        if let Some(context) = context {
            context.cancel();
        }
    }

    /// Returns the latest published snapshot without waiting for network activity.
    ///
    /// Before the first discovery completes this is an empty snapshot; see [`wait_for_first_state`](Self::wait_for_first_state).
    pub fn state(&self) -> Arc<FederatedDbState> {
        self.inner.snapshot.load_full()
    }

    /// Resolves once the first discovery attempt has completed, whatever its outcome.
    ///
    /// Inspect [`state`](Self::state) afterwards to learn whether it succeeded.
    /// If the observer is stopped before any attempt completes, the future never resolves.
    pub fn wait_for_first_state(&self) -> impl Future<Output = ()> + Send + 'static {
        self.inner.first_state.wait()
    }

    /// Whether the first discovery attempt has completed.
    pub fn has_first_state(&self) -> bool {
        self.inner.first_state.is_raised()
    }

    /// Whether the retry policy gave up on the last discovery. A stale observer never updates its state again.
    pub fn is_stale(&self) -> bool {
        let _control = self.inner.lock();
        self.inner.first_state.is_raised() && !self.inner.snapshot.load().is_success()
    }
}

impl Drop for FederationObserver {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, ControlState> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates the token of the next step and makes it the only live one.
    /// A transport that is shutting down stops the observer.
    fn next_context_locked(&self, control: &mut ControlState) -> Option<CancellationToken> {
        match self.transport.create_context() {
            Some(token) => {
                control.context = Some(token.clone());
                Some(token)
            }
            None => {
                warn!("{FEDERATION_OBSERVER}: transport is shutting down, discovery stopped");
                control.stopping = true;
                control.context = None;
                None
            }
        }
    }

    fn schedule_discovery_locked(self: &Arc<Self>, control: &mut ControlState, delay: Duration) {
        let Some(token) = self.next_context_locked(control) else {
            return;
        };
        debug!("{FEDERATION_OBSERVER}: next discovery in {delay:?}");
        let weak = Arc::downgrade(self);
        self.transport.schedule_callback(
            delay,
            token,
            Box::new(move |ok| {
                if !ok {
                    return;
                }
                if let Some(inner) = weak.upgrade() {
                    let mut control = inner.lock();
                    if control.stopping {
                        return;
                    }
                    inner.run_discovery_locked(&mut control);
                }
            }),
        );
    }

    fn run_discovery_locked(self: &Arc<Self>, control: &mut ControlState) {
        let Some(token) = self.next_context_locked(control) else {
            return;
        };
        let weak = Arc::downgrade(self);
        self.transport.send_discovery_request(
            ListFederationDatabasesRequest::default(),
            token,
            Box::new(move |response| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_federation_discovery(response);
                }
            }),
        );
    }

    fn publish_locked(&self, _control: &mut ControlState, state: FederatedDbState) {
        debug!(
            "{FEDERATION_OBSERVER}: publishing state with {} databases, status {:?}",
            state.db_infos.len(),
            state.status
        );
        self.snapshot.store(Arc::new(state));
    }

    fn on_federation_discovery(
        self: &Arc<Self>,
        response: Result<ListFederationDatabasesResult, DiscoveryError>,
    ) {
        {
            let mut control = self.lock();
            if control.stopping {
                debug!("{FEDERATION_OBSERVER}: dropping discovery response received after stop");
                return;
            }

            match response {
                Err(err) if err.kind() == ErrorKind::TransportUnavailable => {
                    warn!("{FEDERATION_OBSERVER}: transport is shutting down, discovery stopped: {err}");
                    control.stopping = true;
                    control.context = None;
                    return;
                }
                Err(err) if err.is_not_implemented() => {
                    warn!("{FEDERATION_OBSERVER}: federation discovery is not supported, falling back to single database mode");
                    control.retry_state = None;
                    let local = self.transport.local_database();
                    self.publish_locked(&mut control, FederatedDbState::fallback(&local));
                    self.schedule_discovery_locked(&mut control, REDISCOVERY_DELAY);
                }
                Err(err) => {
                    let retry_policy = &self.retry_policy;
                    let retry_state = control
                        .retry_state
                        .get_or_insert_with(|| retry_policy.create_retry_state());
                    let delay = retry_state.next_delay(&err);
                    if let Some(delay) = delay {
                        warn!("{FEDERATION_OBSERVER}: discovery failed, retrying in {delay:?}: {err}");
                        self.schedule_discovery_locked(&mut control, delay);
                        return;
                    }
                    error!("{FEDERATION_OBSERVER}: discovery failed and will not be retried: {err}");
                    control.context = None;
                    self.publish_locked(&mut control, FederatedDbState::from_error(err));
                }
                Ok(result) => {
                    control.retry_state = None;
                    self.publish_locked(&mut control, FederatedDbState::from_result(result));
                    self.schedule_discovery_locked(&mut control, REDISCOVERY_DELAY);
                }
            }
        }

        if self.first_state.raise() {
            info!("{FEDERATION_OBSERVER}: first federation state received");
        }
    }
}
