use federation_types::{DatabaseInfo, DatabaseStatus, ListFederationDatabasesResult};

use crate::{error::DiscoveryError, transport::LocalDatabase};

/// Weight assigned to the only member of a non-federated deployment.
pub const FALLBACK_DATABASE_WEIGHT: u32 = 100;

/// The federation topology as of the most recent completed discovery attempt.
///
/// A snapshot is never modified after it has been published; the observer replaces it as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedDbState {
    /// Outcome of the discovery attempt that produced this snapshot.
    pub status: Result<(), DiscoveryError>,
    /// Endpoint of the federation control plane.
    pub control_plane_endpoint: String,
    /// Location of this client as reported by the server.
    pub self_location: Option<String>,
    /// Member databases, in server order.
    pub db_infos: Vec<DatabaseInfo>,
}

impl Default for FederatedDbState {
    fn default() -> Self {
        Self {
            status: Ok(()),
            control_plane_endpoint: String::new(),
            self_location: None,
            db_infos: Vec::new(),
        }
    }
}

impl FederatedDbState {
    /// Builds a snapshot from a successful discovery response.
    pub fn from_result(result: ListFederationDatabasesResult) -> Self {
        Self {
            status: Ok(()),
            control_plane_endpoint: result.control_plane_endpoint,
            self_location: Some(result.self_location).filter(|l| !l.is_empty()),
            db_infos: result.federation_databases,
        }
    }

    /// Builds a single-member snapshot for servers that do not implement federation discovery.
    pub fn fallback(local: &LocalDatabase) -> Self {
        Self {
            status: Ok(()),
            control_plane_endpoint: local.discovery_endpoint.clone(),
            self_location: None,
            db_infos: vec![DatabaseInfo::new(
                local.database.clone(),
                local.discovery_endpoint.clone(),
                DatabaseStatus::Available,
                FALLBACK_DATABASE_WEIGHT,
            )],
        }
    }

    /// Builds a snapshot describing a failed discovery.
    pub fn from_error(err: DiscoveryError) -> Self {
        Self {
            status: Err(err),
            ..Default::default()
        }
    }

    /// Whether the snapshot was produced by a successful attempt.
    pub fn is_success(&self) -> bool {
        self.status.is_ok()
    }

    /// Members that currently accept requests.
    pub fn available_databases(&self) -> impl Iterator<Item = &DatabaseInfo> {
        self.db_infos.iter().filter(|db| db.is_available())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn result_order_and_location_are_kept() {
        let state = FederatedDbState::from_result(ListFederationDatabasesResult {
            control_plane_endpoint: "cp:2135".to_string(),
            federation_databases: vec![
                DatabaseInfo::new("/db2", "h2", DatabaseStatus::Unavailable, 10),
                DatabaseInfo::new("/db1", "h1", DatabaseStatus::Available, 90),
            ],
            self_location: "vla".to_string(),
        });
        assert!(state.is_success());
        assert_eq!(state.self_location.as_deref(), Some("vla"));
        let paths: Vec<_> = state.db_infos.iter().map(|db| db.path.as_str()).collect();
        assert_eq!(paths, ["/db2", "/db1"]);
        let available: Vec<_> = state.available_databases().map(|db| &db.path).collect();
        assert_eq!(available, ["/db1"]);
    }

    #[test]
    fn empty_self_location_is_none() {
        let state = FederatedDbState::from_result(ListFederationDatabasesResult::default());
        assert_eq!(state.self_location, None);
    }

    #[test]
    fn fallback_has_single_local_member() {
        let local = LocalDatabase::new("/root", "disc:2135");
        let state = FederatedDbState::fallback(&local);
        assert!(state.is_success());
        assert_eq!(state.control_plane_endpoint, "disc:2135");
        assert_eq!(
            state.db_infos,
            vec![DatabaseInfo::new(
                "/root",
                "disc:2135",
                DatabaseStatus::Available,
                100
            )]
        );
    }

    #[test]
    fn error_snapshot_has_no_members() {
        let err = DiscoveryError::new(ErrorKind::Unavailable, "down");
        let state = FederatedDbState::from_error(err.clone());
        assert_eq!(state.status, Err(err));
        assert!(state.db_infos.is_empty());
    }
}
