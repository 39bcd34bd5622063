//! Types of the federation discovery protocol. Primarily used through
//! [`federation-discovery`](https://docs.rs/federation-discovery).

#![warn(missing_docs, missing_debug_implementations)]
#![deny(elided_lifetimes_in_paths)]

use serde::{Deserialize, Serialize};

/// A request for the list of databases of a federation. The protocol currently defines no fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFederationDatabasesRequest {}

/// The result of a successful federation discovery call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ListFederationDatabasesResult {
    /// The endpoint of the federation control plane.
    #[serde(default)]
    pub control_plane_endpoint: String,
    /// The member databases, in the order the server reported them.
    #[serde(default)]
    pub federation_databases: Vec<DatabaseInfo>,
    /// The location of the client as seen by the server. Empty if unknown.
    #[serde(default)]
    pub self_location: String,
}

/// A single member database of a federation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseInfo {
    /// Human readable name of the database.
    #[serde(default)]
    pub name: String,
    /// Full path of the database.
    pub path: String,
    /// Opaque database id.
    #[serde(default)]
    pub id: String,
    /// The endpoint clients should connect to.
    pub endpoint: String,
    /// The location (for example, a data center) the database is served from.
    #[serde(default)]
    pub location: String,
    /// Availability of the database.
    #[serde(default)]
    pub status: DatabaseStatus,
    /// Relative weight used when balancing between members.
    #[serde(default)]
    pub weight: u32,
}

impl DatabaseInfo {
    /// Creates a member description from the fields every member carries. The remaining fields are left empty.
    pub fn new(
        path: impl Into<String>,
        endpoint: impl Into<String>,
        status: DatabaseStatus,
        weight: u32,
    ) -> Self {
        Self {
            path: path.into(),
            endpoint: endpoint.into(),
            status,
            weight,
            ..Default::default()
        }
    }

    /// Whether the member currently accepts requests.
    pub fn is_available(&self) -> bool {
        self.status == DatabaseStatus::Available
    }
}

/// Availability of a member database. Encoded as its integer code on the wire.
///
/// Codes this version does not know are kept as [`Unknown`](Self::Unknown) so that one member
/// reporting a newer status does not invalidate the whole list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum DatabaseStatus {
    /// The server did not report a status.
    #[default]
    Unspecified,
    /// The database serves reads and writes.
    Available,
    /// The database only serves reads.
    ReadOnly,
    /// The database does not serve requests.
    Unavailable,
    /// A status code not known to this version.
    Unknown(i32),
}

impl From<i32> for DatabaseStatus {
    fn from(code: i32) -> Self {
        match code {
            0 => Self::Unspecified,
            1 => Self::Available,
            2 => Self::ReadOnly,
            3 => Self::Unavailable,
            code => Self::Unknown(code),
        }
    }
}

impl From<DatabaseStatus> for i32 {
    fn from(status: DatabaseStatus) -> Self {
        match status {
            DatabaseStatus::Unspecified => 0,
            DatabaseStatus::Available => 1,
            DatabaseStatus::ReadOnly => 2,
            DatabaseStatus::Unavailable => 3,
            DatabaseStatus::Unknown(code) => code,
        }
    }
}
