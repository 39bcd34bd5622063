use async_trait::async_trait;
use federation_types::{ListFederationDatabasesRequest, ListFederationDatabasesResult};
use std::fmt::Debug;

use crate::error::DiscoveryError;
#[cfg(feature = "reqwest")]
use crate::error::{ConfigError, ErrorKind};
#[cfg(feature = "reqwest")]
use tracing::{debug, warn};
#[cfg(feature = "reqwest")]
use url::Url;

/// Path of the discovery method, relative to the discovery endpoint.
pub const LIST_FEDERATION_DATABASES_PATH: &str =
    "federation_discovery/v1/list_federation_databases";

/// Fetcher of the federation topology.
#[async_trait]
pub trait Fetch: Sync + Send + Debug {
    /// Performs a single discovery call.
    async fn fetch(
        &self,
        request: ListFederationDatabasesRequest,
    ) -> Result<ListFederationDatabasesResult, DiscoveryError>;
}

#[cfg(feature = "reqwest")]
const HTTP_FETCHER: &str = "HttpFetcher";

/// A [`Fetch`] implementation calling the discovery method over HTTP with JSON bodies.
#[cfg(feature = "reqwest")]
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http_client: reqwest::Client,
    url: Url,
}

#[cfg(feature = "reqwest")]
impl HttpFetcher {
    /// Creates a fetcher talking to `discovery_endpoint`, for example `https://disc.example.com:2135`.
    pub fn new(http_client: reqwest::Client, discovery_endpoint: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidEndpoint {
            endpoint: discovery_endpoint.to_string(),
            reason,
        };
        let mut base = Url::parse(discovery_endpoint).map_err(|err| invalid(err.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(invalid("not a base url".to_string()));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let url = base
            .join(LIST_FEDERATION_DATABASES_PATH)
            .map_err(|err| invalid(err.to_string()))?;
        Ok(Self { http_client, url })
    }

    /// The url the discovery requests are sent to.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[cfg(feature = "reqwest")]
fn error_kind_for_status(status: reqwest::StatusCode) -> ErrorKind {
    use reqwest::StatusCode;
    match status {
        StatusCode::NOT_IMPLEMENTED => ErrorKind::NotImplemented,
        StatusCode::BAD_REQUEST => ErrorKind::BadRequest,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorKind::Unauthorized,
        StatusCode::TOO_MANY_REQUESTS => ErrorKind::Overloaded,
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => ErrorKind::Unavailable,
        StatusCode::GATEWAY_TIMEOUT | StatusCode::REQUEST_TIMEOUT => ErrorKind::Timeout,
        _ => ErrorKind::Internal,
    }
}

#[cfg(feature = "reqwest")]
#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(
        &self,
        request: ListFederationDatabasesRequest,
    ) -> Result<ListFederationDatabasesResult, DiscoveryError> {
        let response = self
            .http_client
            .post(self.url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|err| {
                let kind = if err.is_timeout() {
                    ErrorKind::Timeout
                } else {
                    ErrorKind::Unavailable
                };
                DiscoveryError::new(
                    kind,
                    format!("Failed to execute POST request to {}: {err}", self.url),
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let kind = error_kind_for_status(status);
            let body = response.text().await.unwrap_or_default();
            warn!(
                "{HTTP_FETCHER}: unexpected http status code {status} for url={} received",
                self.url
            );
            return Err(DiscoveryError::new(
                kind,
                format!("http status {status}: {body}"),
            ));
        }

        let result = response
            .json::<ListFederationDatabasesResult>()
            .await
            .map_err(|err| {
                DiscoveryError::new(
                    ErrorKind::Internal,
                    format!("Failed to decode discovery response: {err}"),
                )
            })?;
        debug!(
            "{HTTP_FETCHER}: fetched {} federation databases",
            result.federation_databases.len()
        );
        Ok(result)
    }
}
