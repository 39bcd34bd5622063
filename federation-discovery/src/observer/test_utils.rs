use std::collections::VecDeque;
use std::fmt::{self, Debug};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use federation_types::{ListFederationDatabasesRequest, ListFederationDatabasesResult};
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::{
    error::DiscoveryError,
    observer::retry::{RetryPolicy, RetryState},
    transport::{
        fetch::Fetch, DiscoveryTransport, LocalDatabase, ResponseCallback, TimerCallback,
    },
};

static TRACING_INIT: Once = Once::new();

pub fn setup_tracing() {
    TRACING_INIT.call_once(|| {
        FmtSubscriber::builder().with_max_level(Level::TRACE).init();
    });
}

struct PendingTimer {
    delay: Duration,
    token: CancellationToken,
    callback: TimerCallback,
}

struct PendingRequest {
    token: CancellationToken,
    callback: ResponseCallback,
}

#[derive(Default)]
struct ManualTransportState {
    shutting_down: bool,
    timers: VecDeque<PendingTimer>,
    requests: VecDeque<PendingRequest>,
    timers_scheduled: usize,
    requests_sent: usize,
}

/// A transport that only records timers and requests; the test decides when they complete.
/// Callbacks are always invoked outside of the transport lock.
pub struct ManualTransport {
    local_database: LocalDatabase,
    state: Mutex<ManualTransportState>,
}

impl Debug for ManualTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("ManualTransport")
            .field("local_database", &self.local_database)
            .field("pending_timers", &state.timers.len())
            .field("pending_requests", &state.requests.len())
            .finish()
    }
}

impl ManualTransport {
    pub fn new(local_database: LocalDatabase) -> Self {
        Self {
            local_database,
            state: Mutex::new(ManualTransportState::default()),
        }
    }

    pub fn set_shutting_down(&self, shutting_down: bool) {
        self.state.lock().unwrap().shutting_down = shutting_down;
    }

    /// Fires the oldest pending timer, as cancelled if its token was cancelled. Returns its delay.
    pub fn fire_next_timer(&self) -> Option<Duration> {
        let timer = self.state.lock().unwrap().timers.pop_front()?;
        (timer.callback)(!timer.token.is_cancelled());
        Some(timer.delay)
    }

    /// Delivers `response` for the oldest pending request, even if its token was cancelled
    /// (the response was already on the wire).
    pub fn complete_next_request(
        &self,
        response: Result<ListFederationDatabasesResult, DiscoveryError>,
    ) {
        let request = self
            .state
            .lock()
            .unwrap()
            .requests
            .pop_front()
            .expect("no pending discovery request");
        (request.callback)(response);
    }

    pub fn pending_timers(&self) -> usize {
        self.state.lock().unwrap().timers.len()
    }

    pub fn pending_timer_delays(&self) -> Vec<Duration> {
        let state = self.state.lock().unwrap();
        state.timers.iter().map(|t| t.delay).collect()
    }

    pub fn pending_requests(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }

    /// Number of pending timers and requests whose token has not been cancelled.
    pub fn live_tokens(&self) -> usize {
        let state = self.state.lock().unwrap();
        let timers = state.timers.iter().filter(|t| !t.token.is_cancelled());
        let requests = state.requests.iter().filter(|r| !r.token.is_cancelled());
        timers.count() + requests.count()
    }

    pub fn timers_scheduled(&self) -> usize {
        self.state.lock().unwrap().timers_scheduled
    }

    pub fn requests_sent(&self) -> usize {
        self.state.lock().unwrap().requests_sent
    }
}

impl DiscoveryTransport for ManualTransport {
    fn create_context(&self) -> Option<CancellationToken> {
        if self.state.lock().unwrap().shutting_down {
            return None;
        }
        Some(CancellationToken::new())
    }

    fn send_discovery_request(
        &self,
        _request: ListFederationDatabasesRequest,
        token: CancellationToken,
        callback: ResponseCallback,
    ) {
        let mut state = self.state.lock().unwrap();
        state.requests_sent += 1;
        state.requests.push_back(PendingRequest { token, callback });
    }

    fn schedule_callback(&self, delay: Duration, token: CancellationToken, callback: TimerCallback) {
        let mut state = self.state.lock().unwrap();
        state.timers_scheduled += 1;
        state.timers.push_back(PendingTimer {
            delay,
            token,
            callback,
        });
    }

    fn local_database(&self) -> LocalDatabase {
        self.local_database.clone()
    }
}

#[derive(Debug, Default)]
struct RetryLog {
    states_created: usize,
    calls: Vec<usize>,
}

/// A retry policy recording which retry state every `next_delay` call was made on.
#[derive(Debug, Default)]
pub struct RecordingRetryPolicy {
    delays: Vec<Duration>,
    log: Arc<Mutex<RetryLog>>,
}

impl RecordingRetryPolicy {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self {
            delays,
            log: Arc::default(),
        }
    }

    pub fn states_created(&self) -> usize {
        self.log.lock().unwrap().states_created
    }

    /// Ids of the retry states, in call order. Ids are assigned in creation order starting from 0.
    pub fn calls(&self) -> Vec<usize> {
        self.log.lock().unwrap().calls.clone()
    }
}

impl RetryPolicy for RecordingRetryPolicy {
    fn create_retry_state(&self) -> Box<dyn RetryState> {
        let mut log = self.log.lock().unwrap();
        let id = log.states_created;
        log.states_created += 1;
        Box::new(RecordingRetryState {
            id,
            delays: self.delays.clone().into(),
            log: Arc::clone(&self.log),
        })
    }
}

#[derive(Debug)]
struct RecordingRetryState {
    id: usize,
    delays: VecDeque<Duration>,
    log: Arc<Mutex<RetryLog>>,
}

impl RetryState for RecordingRetryState {
    fn next_delay(&mut self, _err: &DiscoveryError) -> Option<Duration> {
        self.log.lock().unwrap().calls.push(self.id);
        self.delays.pop_front()
    }
}

/// A fetcher answering from a queue of responses, then repeating a default one.
#[derive(Debug)]
pub struct FetcherMock {
    responses: Mutex<VecDeque<Result<ListFederationDatabasesResult, DiscoveryError>>>,
    default_response: Mutex<Result<ListFederationDatabasesResult, DiscoveryError>>,
    latency: Mutex<Duration>,
    calls: Mutex<usize>,
}

impl Default for FetcherMock {
    fn default() -> Self {
        Self::new()
    }
}

impl FetcherMock {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            default_response: Mutex::new(Ok(ListFederationDatabasesResult::default())),
            latency: Mutex::new(Duration::ZERO),
            calls: Mutex::new(0),
        }
    }

    pub fn push_response(&self, response: Result<ListFederationDatabasesResult, DiscoveryError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn set_default_response(
        &self,
        response: Result<ListFederationDatabasesResult, DiscoveryError>,
    ) {
        *self.default_response.lock().unwrap() = response;
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Fetch for FetcherMock {
    async fn fetch(
        &self,
        _request: ListFederationDatabasesRequest,
    ) -> Result<ListFederationDatabasesResult, DiscoveryError> {
        *self.calls.lock().unwrap() += 1;
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.default_response.lock().unwrap().clone())
    }
}
