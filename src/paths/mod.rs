//! Point-to-point path search
//!
//! Finds every distinct supply-chain-scoped path between two actors. The
//! target may be upstream or downstream of the source, so the bounded query
//! runs in both directions; per supply chain only the shortest path is kept.

use crate::queries::{PathQueryBuilder, PathRow};
use crate::store::{GraphStore, StoreResult};
use crate::value_objects::{ActorId, ConnectionId, Direction, SupplyChainId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One path between two actors within a supply chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainPath {
    /// The supply chain the path runs through
    pub supply_chain: SupplyChainId,
    /// The connection carrying the path out of the source actor
    pub connection: ConnectionId,
    /// The full ordered actor sequence from source to target
    pub path: Vec<ActorId>,
    /// Net tier of the path: positive when the target is upstream
    /// (supplier side), negative when downstream
    pub tier: i32,
}

/// Searches for paths between two arbitrary actors
pub struct PathSearch {
    store: Arc<dyn GraphStore>,
}

impl PathSearch {
    /// Create a new path search over the given store
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Find every distinct path from `source` to `target`, keeping only the
    /// shortest per supply chain
    pub async fn find_paths(
        &self,
        source: ActorId,
        target: ActorId,
        supply_chain: Option<SupplyChainId>,
    ) -> StoreResult<Vec<ChainPath>> {
        tracing::debug!("path search {} -> {}", source, target);
        let mut shortest: IndexMap<SupplyChainId, ChainPath> = IndexMap::new();

        for direction in [Direction::ToSuppliers, Direction::ToBuyers] {
            let query = PathQueryBuilder::new(direction)
                .supply_chain_opt(supply_chain)
                .target_actor(target)
                .build(source);

            for row in self.store.run_path_query(&query).await? {
                let Some(path) = self.reconstruct(direction, &row).await? else {
                    continue;
                };
                let candidate = ChainPath {
                    supply_chain: row.first.supply_chain,
                    connection: row.first.id,
                    path,
                    tier: direction.tier_sign() * row.hops() as i32,
                };
                match shortest.get(&candidate.supply_chain) {
                    Some(existing) if existing.tier.abs() <= candidate.tier.abs() => {}
                    _ => {
                        shortest.insert(candidate.supply_chain, candidate);
                    }
                }
            }
        }

        Ok(shortest.into_values().collect())
    }

    /// Rebuild the full ordered actor sequence of a path row by walking the
    /// tag chain and appending the final connection endpoints. Returns `None`
    /// when an intermediate connection has gone missing mid-walk.
    async fn reconstruct(
        &self,
        direction: Direction,
        row: &PathRow,
    ) -> StoreResult<Option<Vec<ActorId>>> {
        let mut actors = match direction {
            Direction::ToSuppliers => vec![row.first.buyer, row.first.supplier],
            Direction::ToBuyers => vec![row.first.supplier, row.first.buyer],
        };

        for tag in &row.tags {
            let next_id = match direction {
                Direction::ToSuppliers => tag.supplier_connection,
                Direction::ToBuyers => tag.buyer_connection,
            };
            let next = if next_id == row.last.id {
                row.last.clone()
            } else {
                match self.store.get_connection(next_id).await? {
                    Some(connection) => connection,
                    None => {
                        tracing::warn!("connection {} vanished during path reconstruction", next_id);
                        return Ok(None);
                    }
                }
            };
            actors.push(match direction {
                Direction::ToSuppliers => next.supplier,
                Direction::ToBuyers => next.buyer,
            });
        }

        Ok(Some(actors))
    }
}
