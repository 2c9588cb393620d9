//! Projection synchronization
//!
//! Keeps the graph store consistent with the system of record. All
//! operations are idempotent and safe to replay; they run after the owning
//! relational transaction commits, never inside it. Concurrent writes to the
//! same connection are serialized by the caller.

use crate::events::{ActorChanged, ConnectionChanged, TagDeclared};
use crate::store::{ActorNode, ConnectionNode, GraphStore, StoreError, TagEdge};
use crate::value_objects::{ActorId, ConnectionId, GeoPoint, TagId};
use chrono::Utc;
use std::sync::Arc;

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while syncing the projection
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A write violated a graph invariant; the rejection is permanent and
    /// nothing was written
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    /// The underlying store failed; the operation can be retried
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Writes actor, connection and tag changes into the graph store
pub struct ProjectionSync {
    store: Arc<dyn GraphStore>,
}

impl ProjectionSync {
    /// Create a new sync over the given store
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Create or update an actor node. Coordinates are owned by connection
    /// events and carried over from the previous node state.
    pub async fn upsert_actor(&self, change: ActorChanged) -> SyncResult<()> {
        let coordinates = self
            .store
            .get_actor(change.actor_id)
            .await?
            .and_then(|existing| existing.coordinates);

        let node = ActorNode {
            id: change.actor_id,
            external_ref: change.external_ref,
            kind: change.kind,
            display_name: change.display_name,
            managers: change.managers,
            coordinates,
            primary_operation: change.primary_operation,
            updated_at: Utc::now(),
        };
        tracing::debug!("upsert actor {}", node.id);
        self.store.upsert_actor(node).await?;
        Ok(())
    }

    /// Create or update a connection node and its two endpoint edges.
    ///
    /// Both endpoint actors are ensured to exist first (minimal stubs are
    /// created if necessary). The geographic distance is computed once from
    /// the endpoint coordinates when the connection is first created and kept
    /// immutable thereafter unless the connection is recreated.
    pub async fn upsert_connection(&self, change: ConnectionChanged) -> SyncResult<()> {
        self.ensure_endpoint(change.buyer, change.buyer_coordinates)
            .await?;
        self.ensure_endpoint(change.supplier, change.supplier_coordinates)
            .await?;

        let distance = match self.store.get_connection(change.connection_id).await? {
            Some(existing) => existing.distance,
            None => match (change.buyer_coordinates, change.supplier_coordinates) {
                (Some(buyer), Some(supplier)) => buyer.distance_to(&supplier),
                _ => 0.0,
            },
        };

        let node = ConnectionNode {
            id: change.connection_id,
            status: change.status,
            buyer: change.buyer,
            supplier: change.supplier,
            supply_chain: change.supply_chain,
            active: change.active,
            distance,
            email_sent: change.email_sent,
            labels: change.labels,
            updated_at: Utc::now(),
        };
        tracing::debug!("upsert connection {} ({} -> {})", node.id, node.buyer, node.supplier);
        self.store.upsert_connection(node).await?;
        Ok(())
    }

    /// Create or update a tag edge between two connections.
    ///
    /// Rejected before any write unless the buyer-side connection's supplier
    /// equals the supplier-side connection's buyer and all three supply
    /// chains match.
    pub async fn upsert_tag(&self, change: TagDeclared) -> SyncResult<()> {
        let buyer_side = self
            .store
            .get_connection(change.buyer_connection)
            .await?
            .ok_or_else(|| {
                SyncError::InvariantViolation(format!(
                    "buyer-side connection {} is not projected",
                    change.buyer_connection
                ))
            })?;
        let supplier_side = self
            .store
            .get_connection(change.supplier_connection)
            .await?
            .ok_or_else(|| {
                SyncError::InvariantViolation(format!(
                    "supplier-side connection {} is not projected",
                    change.supplier_connection
                ))
            })?;

        if buyer_side.supplier != supplier_side.buyer {
            return Err(SyncError::InvariantViolation(format!(
                "connections {} and {} do not share a middle actor",
                buyer_side.id, supplier_side.id
            )));
        }
        if buyer_side.supply_chain != change.supply_chain
            || supplier_side.supply_chain != change.supply_chain
        {
            return Err(SyncError::InvariantViolation(format!(
                "connections {} and {} are not both in supply chain {}",
                buyer_side.id, supplier_side.id, change.supply_chain
            )));
        }

        let edge = TagEdge {
            tag_id: change.tag_id,
            buyer_connection: change.buyer_connection,
            supplier_connection: change.supplier_connection,
            supply_chain: change.supply_chain,
            distance: (buyer_side.distance + supplier_side.distance) / 2.0,
        };
        tracing::debug!("upsert tag {} ({} ~ {})", edge.tag_id, edge.buyer_connection, edge.supplier_connection);
        self.store.upsert_tag(edge).await?;
        Ok(())
    }

    /// Remove an actor node and cascade to its edges
    pub async fn delete_actor(&self, actor_id: ActorId) -> SyncResult<()> {
        tracing::debug!("delete actor {}", actor_id);
        self.store.remove_actor(actor_id).await?;
        Ok(())
    }

    /// Remove a connection node and its tag edges
    pub async fn delete_connection(&self, connection_id: ConnectionId) -> SyncResult<()> {
        tracing::debug!("delete connection {}", connection_id);
        self.store.remove_connection(connection_id).await?;
        Ok(())
    }

    /// Remove a tag edge
    pub async fn delete_tag(&self, tag_id: TagId) -> SyncResult<()> {
        tracing::debug!("delete tag {}", tag_id);
        self.store.remove_tag(tag_id).await?;
        Ok(())
    }

    async fn ensure_endpoint(
        &self,
        actor_id: ActorId,
        coordinates: Option<GeoPoint>,
    ) -> SyncResult<()> {
        match self.store.get_actor(actor_id).await? {
            Some(mut existing) => {
                if let Some(point) = coordinates {
                    if existing.coordinates != Some(point) {
                        existing.coordinates = Some(point);
                        existing.updated_at = Utc::now();
                        self.store.upsert_actor(existing).await?;
                    }
                }
            }
            None => {
                let mut stub = ActorNode::stub(actor_id);
                stub.coordinates = coordinates;
                self.store.upsert_actor(stub).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryGraphStore;
    use crate::value_objects::{ActorKind, ConnectionStatus, SupplyChainId};

    fn connection_change(
        buyer: ActorId,
        supplier: ActorId,
        chain: SupplyChainId,
    ) -> ConnectionChanged {
        ConnectionChanged {
            connection_id: ConnectionId::new(),
            buyer,
            supplier,
            status: ConnectionStatus::Claimed,
            supply_chain: chain,
            active: true,
            email_sent: false,
            labels: Vec::new(),
            buyer_coordinates: Some(GeoPoint::new(0.0, 0.0)),
            supplier_coordinates: Some(GeoPoint::new(0.0, 1.0)),
        }
    }

    fn sync_over(store: &Arc<InMemoryGraphStore>) -> ProjectionSync {
        ProjectionSync::new(store.clone() as Arc<dyn GraphStore>)
    }

    #[tokio::test]
    async fn test_connection_creates_endpoint_stubs() {
        let store = Arc::new(InMemoryGraphStore::new());
        let sync = sync_over(&store);
        let change = connection_change(ActorId::new(), ActorId::new(), SupplyChainId::new());

        sync.upsert_connection(change.clone()).await.unwrap();

        let buyer = store.get_actor(change.buyer).await.unwrap().unwrap();
        assert_eq!(buyer.kind, ActorKind::Unknown);
        assert_eq!(buyer.coordinates, Some(GeoPoint::new(0.0, 0.0)));
        assert!(store.get_actor(change.supplier).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_distance_computed_once() {
        let store = Arc::new(InMemoryGraphStore::new());
        let sync = sync_over(&store);
        let mut change = connection_change(ActorId::new(), ActorId::new(), SupplyChainId::new());

        sync.upsert_connection(change.clone()).await.unwrap();
        let first = store
            .get_connection(change.connection_id)
            .await
            .unwrap()
            .unwrap()
            .distance;
        assert!(first > 100_000.0);

        // Replaying with moved endpoints must not recompute the cached value
        change.supplier_coordinates = Some(GeoPoint::new(0.0, 10.0));
        change.status = ConnectionStatus::Verified;
        sync.upsert_connection(change.clone()).await.unwrap();
        let node = store
            .get_connection(change.connection_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(node.distance, first);
        assert_eq!(node.status, ConnectionStatus::Verified);
    }

    #[tokio::test]
    async fn test_actor_upsert_keeps_coordinates() {
        let store = Arc::new(InMemoryGraphStore::new());
        let sync = sync_over(&store);
        let change = connection_change(ActorId::new(), ActorId::new(), SupplyChainId::new());
        sync.upsert_connection(change.clone()).await.unwrap();

        sync.upsert_actor(ActorChanged {
            actor_id: change.buyer,
            external_ref: "A-001".to_string(),
            kind: ActorKind::BuyingCompany,
            display_name: "Roaster Co".to_string(),
            managers: Vec::new(),
            primary_operation: Some("roasting".to_string()),
        })
        .await
        .unwrap();

        let actor = store.get_actor(change.buyer).await.unwrap().unwrap();
        assert_eq!(actor.display_name, "Roaster Co");
        assert_eq!(actor.coordinates, Some(GeoPoint::new(0.0, 0.0)));
    }

    #[tokio::test]
    async fn test_tag_invariant_mismatched_middle_actor() {
        let store = Arc::new(InMemoryGraphStore::new());
        let sync = sync_over(&store);
        let chain = SupplyChainId::new();
        let c0 = connection_change(ActorId::new(), ActorId::new(), chain);
        // c1's buyer is unrelated to c0's supplier
        let c1 = connection_change(ActorId::new(), ActorId::new(), chain);
        sync.upsert_connection(c0.clone()).await.unwrap();
        sync.upsert_connection(c1.clone()).await.unwrap();

        let result = sync
            .upsert_tag(TagDeclared {
                tag_id: TagId::new(),
                buyer_connection: c0.connection_id,
                supplier_connection: c1.connection_id,
                supply_chain: chain,
            })
            .await;

        assert!(matches!(result, Err(SyncError::InvariantViolation(_))));
        // The rejected edge must not have been written
        assert!(store
            .tags_for_connection(c0.connection_id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_tag_invariant_mismatched_supply_chain() {
        let store = Arc::new(InMemoryGraphStore::new());
        let sync = sync_over(&store);
        let middle = ActorId::new();
        let c0 = connection_change(ActorId::new(), middle, SupplyChainId::new());
        let c1 = connection_change(middle, ActorId::new(), SupplyChainId::new());
        sync.upsert_connection(c0.clone()).await.unwrap();
        sync.upsert_connection(c1.clone()).await.unwrap();

        let result = sync
            .upsert_tag(TagDeclared {
                tag_id: TagId::new(),
                buyer_connection: c0.connection_id,
                supplier_connection: c1.connection_id,
                supply_chain: c0.supply_chain,
            })
            .await;

        assert!(matches!(result, Err(SyncError::InvariantViolation(_))));
    }

    #[tokio::test]
    async fn test_valid_tag_distance_is_endpoint_average() {
        let store = Arc::new(InMemoryGraphStore::new());
        let sync = sync_over(&store);
        let chain = SupplyChainId::new();
        let middle = ActorId::new();
        let c0 = connection_change(ActorId::new(), middle, chain);
        let c1 = connection_change(middle, ActorId::new(), chain);
        sync.upsert_connection(c0.clone()).await.unwrap();
        sync.upsert_connection(c1.clone()).await.unwrap();

        let tag_id = TagId::new();
        sync.upsert_tag(TagDeclared {
            tag_id,
            buyer_connection: c0.connection_id,
            supplier_connection: c1.connection_id,
            supply_chain: chain,
        })
        .await
        .unwrap();

        let d0 = store
            .get_connection(c0.connection_id)
            .await
            .unwrap()
            .unwrap()
            .distance;
        let d1 = store
            .get_connection(c1.connection_id)
            .await
            .unwrap()
            .unwrap()
            .distance;
        let tags = store.tags_for_connection(c0.connection_id).await.unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].distance, (d0 + d1) / 2.0);
    }

    #[tokio::test]
    async fn test_deletes_are_idempotent() {
        let store = Arc::new(InMemoryGraphStore::new());
        let sync = sync_over(&store);
        let change = connection_change(ActorId::new(), ActorId::new(), SupplyChainId::new());
        sync.upsert_connection(change.clone()).await.unwrap();

        sync.delete_connection(change.connection_id).await.unwrap();
        sync.delete_connection(change.connection_id).await.unwrap();
        sync.delete_actor(change.buyer).await.unwrap();
        sync.delete_actor(change.buyer).await.unwrap();
        sync.delete_tag(TagId::new()).await.unwrap();

        assert!(store
            .get_connection(change.connection_id)
            .await
            .unwrap()
            .is_none());
    }
}
