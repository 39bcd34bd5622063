//! The `federation-discovery` crate keeps a client process informed of the topology of a
//! federated database cluster: which member databases exist, their endpoints, availability
//! and routing weights.
//!
//! ## Overview
//! A [`FederationObserver`] periodically issues a discovery call through a
//! [`DiscoveryTransport`](transport::DiscoveryTransport), retries failures according to a
//! pluggable [`RetryPolicy`](observer::retry::RetryPolicy) and publishes every result as an
//! immutable [`FederatedDbState`] snapshot that any number of threads can read without blocking
//! the discovery loop.
//!
//! Servers that do not implement federation discovery are handled transparently: the observer
//! falls back to a single-member topology built from the locally configured database.
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use federation_discovery::{
//!     transport::{fetch::HttpFetcher, tokio_transport::TokioTransport},
//!     FederationObserver, ObserverSettings,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings: ObserverSettings = serde_json::from_str(
//!         r#"{"database": "/Root/db", "discovery_endpoint": "https://disc.example.com:2135"}"#,
//!     )?;
//!     let fetcher = HttpFetcher::new(reqwest::Client::new(), &settings.discovery_endpoint)?;
//!     let transport = Arc::new(
//!         TokioTransport::new(Arc::new(fetcher), settings.local_database()?)
//!             .with_request_timeout(settings.request_timeout()),
//!     );
//!     let observer = FederationObserver::new(transport.clone(), settings.observer_config()?);
//!     observer.start();
//!
//!     observer.wait_for_first_state().await;
//!     let state = observer.state();
//!     match &state.status {
//!         Ok(()) => {
//!             for db in &state.db_infos {
//!                 println!("{} at {} (weight {})", db.path, db.endpoint, db.weight);
//!             }
//!         }
//!         Err(err) => eprintln!("discovery failed: {err}"),
//!     }
//!
//!     observer.stop();
//!     transport.shutdown().await;
//!     Ok(())
//! }
//! ```

#![warn(
    missing_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::private_intra_doc_links
)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod util;

pub mod config;
pub mod error;
pub mod observer;
pub mod transport;

#[doc(inline)]
pub use config::{ObserverConfig, ObserverSettings, RetrySettings};
#[doc(inline)]
pub use error::{ConfigError, DiscoveryError, ErrorKind};
#[doc(inline)]
pub use observer::{
    federation_observer::{FederationObserver, FederationObserverBuilder, REDISCOVERY_DELAY},
    state::FederatedDbState,
};

pub use federation_types::{
    DatabaseInfo, DatabaseStatus, ListFederationDatabasesRequest, ListFederationDatabasesResult,
};
