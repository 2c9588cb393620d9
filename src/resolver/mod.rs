//! Chain resolution
//!
//! Executes a path query and reduces the raw path rows into a deduplicated,
//! tiered chain: one entry per reachable actor with its signed tier, the
//! aggregated geographic distance, and the immediate parent detail along
//! each path. Resolution is a pure read; it never mutates the store and is
//! safe to run concurrently with projection writes.

use crate::queries::{PathQueryBuilder, PathRow};
use crate::store::{GraphStore, StoreResult};
use crate::value_objects::{
    ActorId, ActorKind, ConnectionId, ConnectionStatus, Direction, LabelRef, ManagerRef,
    SupplyChainId,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Seed values for the synthetic no-parent entry on the root actor.
///
/// The two directions historically seed `email_sent` differently for the
/// call sites feeding statistics and dashboards; the divergence is kept
/// behind this explicit parameter instead of being unified silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootSeed {
    /// Value of `email_sent` on the root's synthetic connected-to entry
    pub email_sent: Option<bool>,
}

impl RootSeed {
    /// Seed used by supplier-direction call sites
    pub fn supplier_default() -> Self {
        Self {
            email_sent: Some(true),
        }
    }

    /// Seed used by buyer-direction call sites
    pub fn buyer_default() -> Self {
        Self { email_sent: None }
    }

    /// The direction's historical default
    pub fn for_direction(direction: Direction) -> Self {
        match direction {
            Direction::ToSuppliers => Self::supplier_default(),
            Direction::ToBuyers => Self::buyer_default(),
        }
    }
}

/// One incoming path into a chain entry: the immediate parent actor and the
/// detail of the last connection on that path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectedTo {
    /// The immediate parent actor; nil when not resolved
    pub parent_id: ActorId,
    /// The parent's display name; empty when not resolved
    pub parent_name: String,
    /// Status of the last connection on the path
    pub connection_status: Option<ConnectionStatus>,
    /// Whether the invitation behind the last connection was dispatched
    pub email_sent: Option<bool>,
    /// Labels on the last connection
    pub labels: Vec<LabelRef>,
    /// Actors this connection acts as supplier for, derived from attached
    /// tag edges
    pub supplier_for: Vec<ActorId>,
    /// Actors this connection acts as buyer for, derived from attached tag
    /// edges
    pub buyer_for: Vec<ActorId>,
    /// Managers of the parent actor
    pub managers: Vec<ManagerRef>,
}

impl ConnectedTo {
    /// Sentinel entry with no parent and empty detail
    pub fn sentinel(email_sent: Option<bool>) -> Self {
        Self {
            parent_id: ActorId::nil(),
            parent_name: String::new(),
            connection_status: None,
            email_sent,
            labels: Vec::new(),
            supplier_for: Vec::new(),
            buyer_for: Vec::new(),
            managers: Vec::new(),
        }
    }
}

/// One entry per reachable actor in a resolved chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierEntry {
    /// The reached actor
    pub id: ActorId,
    /// Signed hop distance from the root: supplier tiers positive, buyer
    /// tiers negative, minimum magnitude across all paths
    pub tier: i32,
    /// Aggregated geographic distance in meters, minimum across all paths
    pub distance: f64,
    /// The reached actor's kind
    pub kind: ActorKind,
    /// One entry per distinct immediate parent, keyed by parent id
    pub connected_to: IndexMap<ActorId, ConnectedTo>,
}

/// Result of a chain resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainResolution {
    /// Deduplicated reachable actor ids, in discovery order
    pub reachable: Vec<ActorId>,
    /// Tier data per actor, including the root seed entry
    pub tiers: IndexMap<ActorId, TierEntry>,
}

impl ChainResolution {
    /// Tier entry for an actor, if reached
    pub fn entry(&self, actor: ActorId) -> Option<&TierEntry> {
        self.tiers.get(&actor)
    }
}

/// Parameters for a chain resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveRequest {
    /// The actor the chain is centered on
    pub root: ActorId,
    /// Traversal direction
    pub direction: Direction,
    /// Optional supply-chain scope
    pub supply_chain: Option<SupplyChainId>,
    /// Whether the root itself is included in the reachable set
    pub include_self: bool,
    /// Fast mode skips per-parent detail resolution to cut query cost when
    /// only counts and coordinates are needed
    pub fast: bool,
    /// Optional first-hop restriction (labeled sub-chain queries)
    pub starting_connections: Option<Vec<ConnectionId>>,
    /// Seed for the root's synthetic connected-to entry
    pub root_seed: RootSeed,
}

impl ResolveRequest {
    /// New request with the direction's default root seed, full detail and
    /// no scope
    pub fn new(root: ActorId, direction: Direction) -> Self {
        Self {
            root,
            direction,
            supply_chain: None,
            include_self: false,
            fast: false,
            starting_connections: None,
            root_seed: RootSeed::for_direction(direction),
        }
    }

    /// Scope to one supply chain
    pub fn supply_chain(mut self, chain: SupplyChainId) -> Self {
        self.supply_chain = Some(chain);
        self
    }

    /// Include the root in the reachable set
    pub fn include_self(mut self, include: bool) -> Self {
        self.include_self = include;
        self
    }

    /// Skip per-parent detail resolution
    pub fn fast(mut self, fast: bool) -> Self {
        self.fast = fast;
        self
    }

    /// Restrict the first hop to an explicit connection set
    pub fn starting_connections(mut self, connections: Vec<ConnectionId>) -> Self {
        self.starting_connections = Some(connections);
        self
    }
}

/// Resolves tiered supplier or buyer chains from a root actor
pub struct ChainResolver {
    store: Arc<dyn GraphStore>,
}

impl ChainResolver {
    /// Create a new resolver over the given store
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Resolve the chain described by the request.
    ///
    /// A root with no graph projection yields an empty reachable set and
    /// only the seed entry; this is not an error. A single malformed edge
    /// degrades to sentinel values rather than aborting the resolution.
    pub async fn resolve(&self, request: ResolveRequest) -> StoreResult<ChainResolution> {
        tracing::debug!(
            "resolve chain for {} direction {} fast={}",
            request.root,
            request.direction,
            request.fast
        );

        let mut kinds: HashMap<ActorId, ActorKind> = HashMap::new();
        let root_kind = self.actor_kind(request.root, &mut kinds).await?;

        let mut tiers: IndexMap<ActorId, TierEntry> = IndexMap::new();
        let mut seed_connected = IndexMap::new();
        seed_connected.insert(
            ActorId::nil(),
            ConnectedTo::sentinel(request.root_seed.email_sent),
        );
        tiers.insert(
            request.root,
            TierEntry {
                id: request.root,
                tier: 0,
                distance: 0.0,
                kind: root_kind,
                connected_to: seed_connected,
            },
        );

        let query = PathQueryBuilder::new(request.direction)
            .supply_chain_opt(request.supply_chain)
            .starting_connections_opt(request.starting_connections.clone())
            .build(request.root);
        let rows = self.store.run_path_query(&query).await?;

        for row in &rows {
            let tier = request.direction.tier_sign() * row.hops() as i32;
            let distance = row.total_distance();
            let kind = self.actor_kind(row.terminal, &mut kinds).await?;

            let entry = tiers.entry(row.terminal).or_insert_with(|| TierEntry {
                id: row.terminal,
                tier,
                distance,
                kind,
                connected_to: IndexMap::new(),
            });
            // Closest/shallowest path wins for the scalar fields
            if tier.abs() < entry.tier.abs() {
                entry.tier = tier;
            }
            if distance < entry.distance {
                entry.distance = distance;
            }

            if request.fast {
                entry
                    .connected_to
                    .entry(ActorId::nil())
                    .or_insert_with(|| ConnectedTo::sentinel(None));
            } else {
                let connected = self.resolve_parent(request.direction, row).await?;
                entry.connected_to.entry(connected.parent_id).or_insert(connected);
            }
        }

        let reachable = tiers
            .keys()
            .copied()
            .filter(|id| request.include_self || *id != request.root)
            .collect();

        Ok(ChainResolution { reachable, tiers })
    }

    /// Resolve the immediate parent actor and last-connection detail for one
    /// path row
    async fn resolve_parent(&self, direction: Direction, row: &PathRow) -> StoreResult<ConnectedTo> {
        let parent_id = match direction {
            Direction::ToSuppliers => row.last.buyer,
            Direction::ToBuyers => row.last.supplier,
        };

        let (parent_id, parent_name, managers) = match self.store.get_actor(parent_id).await? {
            Some(actor) => (actor.id, actor.display_name, actor.managers),
            None => {
                tracing::warn!(
                    "parent actor {} of connection {} is not projected",
                    parent_id,
                    row.last.id
                );
                (ActorId::nil(), String::new(), Vec::new())
            }
        };

        let mut supplier_for = Vec::new();
        let mut buyer_for = Vec::new();
        for tag in self.store.tags_for_connection(row.last.id).await? {
            if tag.supplier_connection == row.last.id {
                if let Some(downstream) = self.store.get_connection(tag.buyer_connection).await? {
                    if !supplier_for.contains(&downstream.buyer) {
                        supplier_for.push(downstream.buyer);
                    }
                }
            }
            if tag.buyer_connection == row.last.id {
                if let Some(upstream) = self.store.get_connection(tag.supplier_connection).await? {
                    if !buyer_for.contains(&upstream.supplier) {
                        buyer_for.push(upstream.supplier);
                    }
                }
            }
        }

        Ok(ConnectedTo {
            parent_id,
            parent_name,
            connection_status: Some(row.last.status),
            email_sent: Some(row.last.email_sent),
            labels: row.last.labels.clone(),
            supplier_for,
            buyer_for,
            managers,
        })
    }

    async fn actor_kind(
        &self,
        id: ActorId,
        cache: &mut HashMap<ActorId, ActorKind>,
    ) -> StoreResult<ActorKind> {
        if let Some(kind) = cache.get(&id) {
            return Ok(*kind);
        }
        let kind = self
            .store
            .get_actor(id)
            .await?
            .map(|actor| actor.kind)
            .unwrap_or(ActorKind::Unknown);
        cache.insert(id, kind);
        Ok(kind)
    }
}
