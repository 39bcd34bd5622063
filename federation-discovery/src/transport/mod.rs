//! The transport the observer uses to issue discovery calls and to schedule delayed work.

use std::{fmt::Debug, time::Duration};

use federation_types::{ListFederationDatabasesRequest, ListFederationDatabasesResult};
use tokio_util::sync::CancellationToken;

use crate::error::DiscoveryError;

/// Fetcher of the federation topology.
pub mod fetch;
/// Transport backed by the tokio runtime.
pub mod tokio_transport;

/// Receives the outcome of a discovery call.
pub type ResponseCallback =
    Box<dyn FnOnce(Result<ListFederationDatabasesResult, DiscoveryError>) + Send + 'static>;

/// Receives `true` once the delay elapsed, or `false` if the token was cancelled first.
pub type TimerCallback = Box<dyn FnOnce(bool) + Send + 'static>;

/// The database this process is configured to talk to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LocalDatabase {
    /// Path of the database.
    pub database: String,
    /// Endpoint used for discovery.
    pub discovery_endpoint: String,
}

impl LocalDatabase {
    /// Creates a new `LocalDatabase`.
    pub fn new(database: impl Into<String>, discovery_endpoint: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            discovery_endpoint: discovery_endpoint.into(),
        }
    }
}

/// Asynchronous discovery calls and cancellable timers.
///
/// Implementations must never invoke a callback from within the method that received it:
/// the observer holds its lock while scheduling and takes it again inside the callbacks.
pub trait DiscoveryTransport: Send + Sync + Debug {
    /// Creates a token for the next scheduled step. `None` means the transport is shutting down.
    fn create_context(&self) -> Option<CancellationToken>;

    /// Sends a discovery request. `callback` is invoked at most once, and not at all if `token` is cancelled first.
    fn send_discovery_request(
        &self,
        request: ListFederationDatabasesRequest,
        token: CancellationToken,
        callback: ResponseCallback,
    );

    /// Invokes `callback` exactly once: with `true` after `delay`, or with `false` if `token` is cancelled earlier.
    fn schedule_callback(&self, delay: Duration, token: CancellationToken, callback: TimerCallback);

    /// The locally configured database, used when the server does not support federation discovery.
    fn local_database(&self) -> LocalDatabase;
}
