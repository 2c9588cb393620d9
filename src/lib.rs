//! Supply-chain connection graph for AgriTrace
//!
//! A graph-shaped projection of the "who buys from whom" relationship:
//! multi-tier supplier and buyer traversal, transitive tagging between
//! non-adjacent tiers, point-to-point path search, and derived chain
//! statistics. The relational system of record stays the primary store;
//! this crate holds an asynchronously-consistent read replica of the
//! relationship topology and is invoked in-process by the surrounding
//! application and its background jobs.

pub mod domain_events;
pub mod events;
pub mod handlers;
pub mod paths;
pub mod queries;
pub mod resolver;
pub mod stats;
pub mod store;
pub mod sync;
pub mod value_objects;

// Re-export main types
pub use domain_events::ProjectionEvent;
pub use events::*;

// Re-export store types
pub use store::{
    ActorNode, ConnectionNode, GraphStore, InMemoryGraphStore, StoreError, StoreResult, TagEdge,
};

// Re-export query types
pub use queries::{PathQuery, PathQueryBuilder, PathRow};

// Re-export sync types
pub use sync::{ProjectionSync, SyncError, SyncResult};

// Re-export resolver types
pub use resolver::{
    ChainResolution, ChainResolver, ConnectedTo, ResolveRequest, RootSeed, TierEntry,
};

// Re-export path search types
pub use paths::{ChainPath, PathSearch};

// Re-export stats types
pub use stats::{
    ChainStats, InvitationLedger, InvitationRecord, StatsAggregator, StatsError, StatsRepository,
    StatsResult,
};

// Re-export handlers
pub use handlers::{InMemoryStatsQueue, ProjectionEventHandler, StatsRefreshQueue};

// Re-export value objects
pub use value_objects::{
    ActorId, ActorKind, ConnectionId, ConnectionStatus, Direction, GeoPoint, LabelRef, ManagerRef,
    SupplyChainId, TagId,
};
