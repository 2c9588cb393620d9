//! Graph projection store
//!
//! A property-graph-native store holding two node kinds (Actor, Connection)
//! and tag edges between connections. The store owns no business logic; it is
//! pure storage plus path-query execution. Writers go through
//! [`crate::sync::ProjectionSync`], readers through the resolvers.

mod memory;

pub use memory::InMemoryGraphStore;

use crate::queries::{PathQuery, PathRow};
use crate::value_objects::{
    ActorId, ActorKind, ConnectionId, ConnectionStatus, GeoPoint, LabelRef, ManagerRef,
    SupplyChainId, TagId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur against the projection store
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The store is unreachable; the operation can be retried by the caller
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Graph projection of a supply-chain participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorNode {
    /// Stable identifier copied from the system of record
    pub id: ActorId,
    /// Opaque display id for the same record
    pub external_ref: String,
    /// The kind of participant
    pub kind: ActorKind,
    /// Human-readable name
    pub display_name: String,
    /// Actors managing this one, rewritten wholesale on change
    pub managers: Vec<ManagerRef>,
    /// Last known coordinates, captured from connection change events
    pub coordinates: Option<GeoPoint>,
    /// The actor's declared primary operation, if any
    pub primary_operation: Option<String>,
    /// Last projection write
    pub updated_at: DateTime<Utc>,
}

impl ActorNode {
    /// Minimal stub for an actor that has not been synced yet but
    /// participates in a connection
    pub fn stub(id: ActorId) -> Self {
        Self {
            id,
            external_ref: String::new(),
            kind: ActorKind::Unknown,
            display_name: String::new(),
            managers: Vec::new(),
            coordinates: None,
            primary_operation: None,
            updated_at: Utc::now(),
        }
    }
}

/// Graph projection of one directed buyer->supplier relationship, scoped to
/// exactly one supply chain. The two mandatory edges to the endpoint actors
/// are stored as the `buyer` and `supplier` fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionNode {
    /// The connection's identifier
    pub id: ConnectionId,
    /// Verification status
    pub status: ConnectionStatus,
    /// The buying actor
    pub buyer: ActorId,
    /// The supplying actor
    pub supplier: ActorId,
    /// The supply chain this connection belongs to
    pub supply_chain: SupplyChainId,
    /// Whether the connection is active; inactive connections never
    /// participate in traversal
    pub active: bool,
    /// Geographic distance in meters between the endpoints, computed once on
    /// first creation and cached
    pub distance: f64,
    /// Whether the invitation behind this connection was dispatched
    pub email_sent: bool,
    /// Labels attached to the connection
    pub labels: Vec<LabelRef>,
    /// Last projection write
    pub updated_at: DateTime<Utc>,
}

/// Edge between two connections sharing a middle actor, representing one
/// additional tier of transitive reachability.
///
/// Valid only when the buyer-side connection's supplier equals the
/// supplier-side connection's buyer and both share a supply chain; the
/// invariant is enforced at the sync boundary before the edge is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagEdge {
    /// Back-reference to the originating tag record
    pub tag_id: TagId,
    /// The buyer-side connection
    pub buyer_connection: ConnectionId,
    /// The supplier-side connection
    pub supplier_connection: ConnectionId,
    /// The supply chain both connections belong to
    pub supply_chain: SupplyChainId,
    /// Average of the two connections' own distances, in meters
    pub distance: f64,
}

/// Storage and path-query execution for the connection graph.
///
/// Implementations must be safe for unbounded concurrent reads against a
/// store that is being concurrently updated; results reflect a best-effort
/// snapshot. Concurrent writes to the same connection are serialized by the
/// caller.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Insert or replace an actor node
    async fn upsert_actor(&self, actor: ActorNode) -> StoreResult<()>;

    /// Get an actor node by id
    async fn get_actor(&self, id: ActorId) -> StoreResult<Option<ActorNode>>;

    /// Remove an actor node, cascading to its connections and their tag edges
    async fn remove_actor(&self, id: ActorId) -> StoreResult<()>;

    /// Insert or replace a connection node
    async fn upsert_connection(&self, connection: ConnectionNode) -> StoreResult<()>;

    /// Get a connection node by id
    async fn get_connection(&self, id: ConnectionId) -> StoreResult<Option<ConnectionNode>>;

    /// Remove a connection node, cascading to its tag edges
    async fn remove_connection(&self, id: ConnectionId) -> StoreResult<()>;

    /// Insert or replace a tag edge
    async fn upsert_tag(&self, tag: TagEdge) -> StoreResult<()>;

    /// Get a tag edge by its originating tag id
    async fn get_tag(&self, tag_id: TagId) -> StoreResult<Option<TagEdge>>;

    /// Remove a tag edge by its originating tag id
    async fn remove_tag(&self, tag_id: TagId) -> StoreResult<()>;

    /// All tag edges attached to a connection, on either side
    async fn tags_for_connection(&self, id: ConnectionId) -> StoreResult<Vec<TagEdge>>;

    /// Execute a parameterized multi-hop path query, returning one row per
    /// matched path
    async fn run_path_query(&self, query: &PathQuery) -> StoreResult<Vec<PathRow>>;
}
