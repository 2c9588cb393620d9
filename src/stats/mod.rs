//! Chain statistics aggregation
//!
//! A pure read/compute/write step: resolves the supplier and buyer chains of
//! an actor in fast mode, rolls the result up into a [`ChainStats`] bundle,
//! joins the combined actor set against the invitation ledger, and persists
//! the bundle back to the system of record. Recomputation is last-write-wins
//! and safe to invoke repeatedly for the same actor.

use crate::resolver::{ChainResolver, ResolveRequest};
use crate::store::{GraphStore, StoreError};
use crate::value_objects::{ActorId, ActorKind, Direction, GeoPoint, SupplyChainId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Result type for stats operations
pub type StatsResult<T> = Result<T, StatsError>;

/// Errors that can occur while aggregating statistics
#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    /// The graph store failed; the recomputation can be retried by the
    /// job scheduler
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The invitation ledger failed
    #[error("invitation ledger error: {0}")]
    Ledger(String),
    /// Persisting the bundle failed
    #[error("stats persistence error: {0}")]
    Persist(String),
}

/// Invitation history of one actor, as recorded by the system of record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationRecord {
    /// An invitation was sent to the actor
    pub invited: bool,
    /// The actor signed up and is active
    pub active: bool,
    /// The actor was mapped without signing up
    pub mapped: bool,
    /// An invitation is outstanding
    pub pending_invite: bool,
}

/// External collaborator: the invitation ledger of the system of record,
/// consulted only at the stats step
#[async_trait]
pub trait InvitationLedger: Send + Sync {
    /// Invitation records for the given actors; absent actors have no
    /// invitation history
    async fn invitation_status(
        &self,
        actors: &[ActorId],
    ) -> StatsResult<HashMap<ActorId, InvitationRecord>>;
}

/// External collaborator: persistence of stats bundles back to the system
/// of record
#[async_trait]
pub trait StatsRepository: Send + Sync {
    /// Persist the per-actor bundle
    async fn persist_actor_stats(&self, actor: ActorId, stats: &ChainStats) -> StatsResult<()>;

    /// Persist the per-(actor, supply chain) bundle
    async fn persist_chain_stats(
        &self,
        actor: ActorId,
        supply_chain: SupplyChainId,
        stats: &ChainStats,
    ) -> StatsResult<()>;
}

/// Per-operation actor counts, bucketed into farmer and supplier operations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationCounts {
    /// Counts by declared primary operation for farm actors
    pub farmer: HashMap<String, usize>,
    /// Counts by declared primary operation for all other actors
    pub supplier: HashMap<String, usize>,
}

/// The rollup bundle computed per actor (and per (actor, supply chain) when
/// scoped)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainStats {
    /// Actors reachable in the supplier direction
    pub actor_count: usize,
    /// Buying companies among the suppliers
    pub supplier_count: usize,
    /// Farms among the suppliers
    pub farmer_count: usize,
    /// Non-farm actors among the suppliers
    pub company_count: usize,
    /// Actors with an invitation sent
    pub invited_actor_count: usize,
    /// Actors signed up and active
    pub active_actor_count: usize,
    /// Actors mapped without signing up
    pub mapped_actor_count: usize,
    /// Actors with an outstanding invitation
    pub pending_invite_count: usize,
    /// |max positive tier| + |min negative tier| across both directions
    pub tier_count: u32,
    /// Max absolute distance in the supplier direction, meters, rounded to
    /// two decimals
    pub chain_length: f64,
    /// Whether the chain reaches at least one farm
    pub traceable: bool,
    /// Weighted composite score used for dashboard ranking
    pub complexity: f64,
    /// Coordinates of reachable farms
    pub farmer_coordinates: Vec<GeoPoint>,
    /// Coordinates of reachable non-farm suppliers
    pub supplier_coordinates: Vec<GeoPoint>,
    /// Per-operation actor counts
    pub operations: OperationCounts,
    /// When this bundle was computed
    pub computed_at: DateTime<Utc>,
}

/// Weighted composite complexity score.
///
/// Monotonically increasing in tier count and company count.
pub fn complexity_score(
    tier_count: u32,
    company_count: usize,
    chain_length: f64,
    farmer_count: usize,
) -> f64 {
    5.0 * tier_count as f64
        + company_count as f64
        + chain_length / 10_000.0
        + farmer_count as f64 / 5.0
}

/// Computes and persists chain statistics for an actor
pub struct StatsAggregator {
    store: Arc<dyn GraphStore>,
    resolver: ChainResolver,
    ledger: Arc<dyn InvitationLedger>,
    repository: Arc<dyn StatsRepository>,
}

impl StatsAggregator {
    /// Create a new aggregator over the given store and collaborators
    pub fn new(
        store: Arc<dyn GraphStore>,
        ledger: Arc<dyn InvitationLedger>,
        repository: Arc<dyn StatsRepository>,
    ) -> Self {
        let resolver = ChainResolver::new(store.clone());
        Self {
            store,
            resolver,
            ledger,
            repository,
        }
    }

    /// Compute the stats bundle for an actor, optionally scoped to one
    /// supply chain, and persist it
    pub async fn compute_stats(
        &self,
        actor: ActorId,
        supply_chain: Option<SupplyChainId>,
    ) -> StatsResult<ChainStats> {
        tracing::debug!("compute stats for {} (chain scope: {})", actor, supply_chain.is_some());

        let mut supplier_request = ResolveRequest::new(actor, Direction::ToSuppliers).fast(true);
        let mut buyer_request = ResolveRequest::new(actor, Direction::ToBuyers).fast(true);
        if let Some(chain) = supply_chain {
            supplier_request = supplier_request.supply_chain(chain);
            buyer_request = buyer_request.supply_chain(chain);
        }
        let suppliers = self.resolver.resolve(supplier_request).await?;
        let buyers = self.resolver.resolve(buyer_request).await?;

        let actor_count = suppliers.reachable.len();
        let mut supplier_count = 0;
        let mut farmer_count = 0;
        let mut farmer_coordinates = Vec::new();
        let mut supplier_coordinates = Vec::new();
        let mut operations = OperationCounts::default();

        for id in &suppliers.reachable {
            let Some(node) = self.store.get_actor(*id).await? else {
                continue;
            };
            let operation = node
                .primary_operation
                .clone()
                .unwrap_or_else(|| node.kind.as_str().to_string());
            if node.kind == ActorKind::Farm {
                farmer_count += 1;
                if let Some(point) = node.coordinates {
                    farmer_coordinates.push(point);
                }
                *operations.farmer.entry(operation).or_default() += 1;
            } else {
                if node.kind == ActorKind::BuyingCompany {
                    supplier_count += 1;
                }
                if let Some(point) = node.coordinates {
                    supplier_coordinates.push(point);
                }
                *operations.supplier.entry(operation).or_default() += 1;
            }
        }
        let company_count = actor_count - farmer_count;

        let max_positive_tier = suppliers
            .tiers
            .values()
            .map(|entry| entry.tier)
            .filter(|tier| *tier > 0)
            .max()
            .unwrap_or(0);
        let min_negative_tier = buyers
            .tiers
            .values()
            .map(|entry| entry.tier)
            .filter(|tier| *tier < 0)
            .min()
            .unwrap_or(0);
        let tier_count = (max_positive_tier.abs() + min_negative_tier.abs()) as u32;

        let chain_length = suppliers
            .tiers
            .values()
            .map(|entry| entry.distance.abs())
            .fold(0.0_f64, f64::max);
        let chain_length = (chain_length * 100.0).round() / 100.0;

        let mut combined: Vec<ActorId> = suppliers.reachable.clone();
        for id in &buyers.reachable {
            if !combined.contains(id) {
                combined.push(*id);
            }
        }
        let invitations = self.ledger.invitation_status(&combined).await?;
        let invited_actor_count = invitations.values().filter(|r| r.invited).count();
        let active_actor_count = invitations.values().filter(|r| r.active).count();
        let mapped_actor_count = invitations.values().filter(|r| r.mapped).count();
        let pending_invite_count = invitations.values().filter(|r| r.pending_invite).count();

        let stats = ChainStats {
            actor_count,
            supplier_count,
            farmer_count,
            company_count,
            invited_actor_count,
            active_actor_count,
            mapped_actor_count,
            pending_invite_count,
            tier_count,
            chain_length,
            traceable: farmer_count > 0,
            complexity: complexity_score(tier_count, company_count, chain_length, farmer_count),
            farmer_coordinates,
            supplier_coordinates,
            operations,
            computed_at: Utc::now(),
        };

        self.repository.persist_actor_stats(actor, &stats).await?;
        if let Some(chain) = supply_chain {
            self.repository
                .persist_chain_stats(actor, chain, &stats)
                .await?;
        }

        Ok(stats)
    }
}

/// In-memory invitation ledger for testing
#[derive(Debug, Default)]
pub struct InMemoryInvitationLedger {
    records: RwLock<HashMap<ActorId, InvitationRecord>>,
}

impl InMemoryInvitationLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an actor's invitation history
    pub fn record(&self, actor: ActorId, record: InvitationRecord) {
        self.records.write().insert(actor, record);
    }
}

#[async_trait]
impl InvitationLedger for InMemoryInvitationLedger {
    async fn invitation_status(
        &self,
        actors: &[ActorId],
    ) -> StatsResult<HashMap<ActorId, InvitationRecord>> {
        let records = self.records.read();
        Ok(actors
            .iter()
            .filter_map(|id| records.get(id).map(|record| (*id, *record)))
            .collect())
    }
}

/// In-memory stats repository for testing
#[derive(Debug, Default)]
pub struct InMemoryStatsRepository {
    actor_stats: RwLock<HashMap<ActorId, ChainStats>>,
    chain_stats: RwLock<HashMap<(ActorId, SupplyChainId), ChainStats>>,
}

impl InMemoryStatsRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// The last persisted per-actor bundle
    pub fn actor_stats(&self, actor: ActorId) -> Option<ChainStats> {
        self.actor_stats.read().get(&actor).cloned()
    }

    /// The last persisted per-(actor, supply chain) bundle
    pub fn chain_stats(&self, actor: ActorId, chain: SupplyChainId) -> Option<ChainStats> {
        self.chain_stats.read().get(&(actor, chain)).cloned()
    }
}

#[async_trait]
impl StatsRepository for InMemoryStatsRepository {
    async fn persist_actor_stats(&self, actor: ActorId, stats: &ChainStats) -> StatsResult<()> {
        self.actor_stats.write().insert(actor, stats.clone());
        Ok(())
    }

    async fn persist_chain_stats(
        &self,
        actor: ActorId,
        supply_chain: SupplyChainId,
        stats: &ChainStats,
    ) -> StatsResult<()> {
        self.chain_stats
            .write()
            .insert((actor, supply_chain), stats.clone());
        Ok(())
    }
}
