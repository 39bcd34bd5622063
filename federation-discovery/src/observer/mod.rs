//! Federation discovery observer.

/// The first-state readiness signal.
mod first_state;
pub mod federation_observer;
/// Retry policies.
pub mod retry;
/// Published topology snapshots.
pub mod state;
#[cfg(test)]
pub(crate) mod test_utils;
