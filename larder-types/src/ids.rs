//! Identifier types used throughout the Larder core.
//!
//! A record is addressed either by a server-issued id or by a
//! client-generated temporary id assigned while offline. The two are kept
//! apart at the type level so the pending-create invariant (a record that
//! only exists locally always carries a local id) is enforced by the
//! compiler rather than by a string convention.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Prefix used when a local id crosses the storage/wire boundary.
///
/// This is an encoding detail of `Display`/`FromStr`, not something
/// callers should match on — use [`RecordId::is_local`] instead.
pub const TEMP_ID_PREFIX: &str = "temp_";

/// Client-generated identifier for a record that has not yet been assigned
/// a server id. Uses UUID v7 which embeds a timestamp for natural ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(Uuid);

impl LocalId {
    /// Creates a new local id with the current timestamp.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a local id from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for LocalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LocalId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Server-issued document identifier. Opaque to this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(String);

impl RemoteId {
    /// Wraps a server-issued id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RemoteId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RemoteId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of the owning user. Issued by the auth layer; opaque here.
/// Every store and backend query is scoped by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    /// Wraps an auth-issued user id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for OwnerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OwnerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A record identity: either a client-generated temporary id or a
/// server-issued one.
///
/// The string encoding prefixes local ids with [`TEMP_ID_PREFIX`]; server
/// ids pass through unchanged. A server id that itself starts with the
/// prefix and parses as a UUID would be misread — server ids are assumed
/// not to collide with this namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RecordId {
    /// Client-generated, never seen by the server.
    Local(LocalId),
    /// Server-issued.
    Remote(RemoteId),
}

impl RecordId {
    /// True for client-generated temporary ids.
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    /// True for server-issued ids.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    /// Returns the local id, if this is one.
    #[must_use]
    pub fn as_local(&self) -> Option<LocalId> {
        match self {
            Self::Local(id) => Some(*id),
            Self::Remote(_) => None,
        }
    }

    /// Returns the remote id, if this is one.
    #[must_use]
    pub fn as_remote(&self) -> Option<&RemoteId> {
        match self {
            Self::Local(_) => None,
            Self::Remote(id) => Some(id),
        }
    }
}

impl From<LocalId> for RecordId {
    fn from(id: LocalId) -> Self {
        Self::Local(id)
    }
}

impl From<RemoteId> for RecordId {
    fn from(id: RemoteId) -> Self {
        Self::Remote(id)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(id) => write!(f, "{TEMP_ID_PREFIX}{id}"),
            Self::Remote(id) => write!(f, "{id}"),
        }
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix(TEMP_ID_PREFIX) {
            Some(raw) => Ok(Self::Local(raw.parse()?)),
            None => Ok(Self::Remote(RemoteId::new(s))),
        }
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for RecordId {
    type Error = uuid::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
