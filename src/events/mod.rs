//! Supply-chain change events
//!
//! Change events are emitted by the system of record after its own
//! transaction commits, and consumed here to keep the graph projection
//! consistent. The graph is an asynchronously-consistent read replica of the
//! relationship topology; a reader may transiently see a stale or missing
//! edge right after a relational write.

use crate::value_objects::{
    ActorId, ActorKind, ConnectionId, ConnectionStatus, GeoPoint, LabelRef, ManagerRef,
    SupplyChainId, TagId,
};
use serde::{Deserialize, Serialize};

/// An actor record changed in the system of record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorChanged {
    /// The actor's stable identifier
    pub actor_id: ActorId,
    /// Opaque display id for the same record
    pub external_ref: String,
    /// The kind of participant
    pub kind: ActorKind,
    /// Human-readable name
    pub display_name: String,
    /// Actors managing this one, rewritten wholesale on change
    pub managers: Vec<ManagerRef>,
    /// The actor's declared primary operation, if any
    pub primary_operation: Option<String>,
}

/// A buyer-supplier connection changed in the system of record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionChanged {
    /// The connection's identifier
    pub connection_id: ConnectionId,
    /// The buying actor
    pub buyer: ActorId,
    /// The supplying actor
    pub supplier: ActorId,
    /// Verification status
    pub status: ConnectionStatus,
    /// The supply chain this connection is scoped to
    pub supply_chain: SupplyChainId,
    /// Whether the connection is active (soft-disable without deletion)
    pub active: bool,
    /// Whether the invitation behind this connection was dispatched
    pub email_sent: bool,
    /// Labels attached to the connection
    pub labels: Vec<LabelRef>,
    /// Buyer coordinates, used for distance computation on first creation
    pub buyer_coordinates: Option<GeoPoint>,
    /// Supplier coordinates, used for distance computation on first creation
    pub supplier_coordinates: Option<GeoPoint>,
}

/// A transitive tier link was declared between two connections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagDeclared {
    /// The originating tag record
    pub tag_id: TagId,
    /// The buyer-side connection
    pub buyer_connection: ConnectionId,
    /// The supplier-side connection
    pub supplier_connection: ConnectionId,
    /// The supply chain both connections must belong to
    pub supply_chain: SupplyChainId,
}

/// An actor record was deleted from the system of record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorDeleted {
    /// The deleted actor's identifier
    pub actor_id: ActorId,
}

/// A connection was deleted from the system of record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionDeleted {
    /// The deleted connection's identifier
    pub connection_id: ConnectionId,
}

/// A tag record was removed from the system of record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagRemoved {
    /// The removed tag's identifier
    pub tag_id: TagId,
}
