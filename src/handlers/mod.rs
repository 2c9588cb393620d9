//! Projection event handling
//!
//! The system of record emits a [`ProjectionEvent`](crate::domain_events::ProjectionEvent)
//! after its own transaction commits; a worker consumes it here, applies the
//! change through [`ProjectionSync`], and enqueues a statistics refresh for
//! the downstream actor whose topology may have changed. The decoupling from
//! the owning transaction is explicit: nothing in this module runs inside it.

use crate::domain_events::ProjectionEvent;
use crate::store::GraphStore;
use crate::sync::ProjectionSync;
use crate::value_objects::{ActorId, SupplyChainId};
use anyhow::Context;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

/// Background-job seam: a queue of pending statistics recomputations.
///
/// Enqueueing the same actor repeatedly is fine; recomputation is
/// last-write-wins and superseded runs can simply be discarded.
#[async_trait]
pub trait StatsRefreshQueue: Send + Sync {
    /// Request a stats recomputation for the actor, optionally scoped to one
    /// supply chain
    async fn enqueue(&self, actor: ActorId, supply_chain: Option<SupplyChainId>)
        -> anyhow::Result<()>;
}

/// In-memory refresh queue for testing
#[derive(Debug, Default)]
pub struct InMemoryStatsQueue {
    pending: Mutex<Vec<(ActorId, Option<SupplyChainId>)>>,
}

impl InMemoryStatsQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all pending refresh requests
    pub fn drain(&self) -> Vec<(ActorId, Option<SupplyChainId>)> {
        std::mem::take(&mut *self.pending.lock())
    }
}

#[async_trait]
impl StatsRefreshQueue for InMemoryStatsQueue {
    async fn enqueue(
        &self,
        actor: ActorId,
        supply_chain: Option<SupplyChainId>,
    ) -> anyhow::Result<()> {
        self.pending.lock().push((actor, supply_chain));
        Ok(())
    }
}

/// Applies projection events to the graph store and schedules downstream
/// stats refreshes
pub struct ProjectionEventHandler {
    store: Arc<dyn GraphStore>,
    sync: ProjectionSync,
    stats_queue: Option<Arc<dyn StatsRefreshQueue>>,
}

impl ProjectionEventHandler {
    /// Create a new handler over the given store
    pub fn new(store: Arc<dyn GraphStore>, stats_queue: Option<Arc<dyn StatsRefreshQueue>>) -> Self {
        let sync = ProjectionSync::new(store.clone());
        Self {
            store,
            sync,
            stats_queue,
        }
    }

    /// Handle one projection event
    pub async fn handle(&self, event: ProjectionEvent) -> anyhow::Result<()> {
        tracing::debug!("handling {}", event.subject());
        match event {
            ProjectionEvent::ActorChanged(change) => {
                self.sync.upsert_actor(change).await?;
            }
            ProjectionEvent::ConnectionChanged(change) => {
                let buyer = change.buyer;
                let chain = change.supply_chain;
                self.sync.upsert_connection(change).await?;
                self.refresh(buyer, Some(chain)).await?;
            }
            ProjectionEvent::TagDeclared(change) => {
                let buyer_connection = change.buyer_connection;
                let chain = change.supply_chain;
                self.sync.upsert_tag(change).await?;
                if let Some(connection) = self.store.get_connection(buyer_connection).await? {
                    self.refresh(connection.buyer, Some(chain)).await?;
                }
            }
            ProjectionEvent::ActorDeleted(change) => {
                self.sync.delete_actor(change.actor_id).await?;
            }
            ProjectionEvent::ConnectionDeleted(change) => {
                let downstream = self.store.get_connection(change.connection_id).await?;
                self.sync.delete_connection(change.connection_id).await?;
                if let Some(connection) = downstream {
                    self.refresh(connection.buyer, Some(connection.supply_chain))
                        .await?;
                }
            }
            ProjectionEvent::TagRemoved(change) => {
                let tag = self.store.get_tag(change.tag_id).await?;
                self.sync.delete_tag(change.tag_id).await?;
                if let Some(tag) = tag {
                    if let Some(connection) = self.store.get_connection(tag.buyer_connection).await?
                    {
                        self.refresh(connection.buyer, Some(tag.supply_chain)).await?;
                    }
                }
            }
        }
        Ok(())
    }

    async fn refresh(&self, actor: ActorId, supply_chain: Option<SupplyChainId>) -> anyhow::Result<()> {
        if let Some(queue) = &self.stats_queue {
            queue
                .enqueue(actor, supply_chain)
                .await
                .context("failed to enqueue stats refresh")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ConnectionChanged, ConnectionDeleted, TagDeclared};
    use crate::store::InMemoryGraphStore;
    use crate::value_objects::{ConnectionId, ConnectionStatus, GeoPoint, TagId};

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
            supplier_coordinates: Some(GeoPoint::new(1.0, 1.0)),
        }
    }

    #[tokio::test]
    async fn test_connection_event_syncs_and_enqueues_refresh() {
        let store = Arc::new(InMemoryGraphStore::new());
        let queue = Arc::new(InMemoryStatsQueue::new());
        let handler = ProjectionEventHandler::new(
            store.clone() as Arc<dyn GraphStore>,
            Some(queue.clone() as Arc<dyn StatsRefreshQueue>),
        );

        let change = connection_change(ActorId::new(), ActorId::new(), SupplyChainId::new());
        handler
            .handle(ProjectionEvent::ConnectionChanged(change.clone()))
            .await
            .unwrap();

        assert!(store
            .get_connection(change.connection_id)
            .await
            .unwrap()
            .is_some());
        assert_eq!(
            queue.drain(),
            vec![(change.buyer, Some(change.supply_chain))]
        );
    }

    #[tokio::test]
    async fn test_invalid_tag_event_fails_without_refresh() {
        let store = Arc::new(InMemoryGraphStore::new());
        let queue = Arc::new(InMemoryStatsQueue::new());
        let handler = ProjectionEventHandler::new(
            store.clone() as Arc<dyn GraphStore>,
            Some(queue.clone() as Arc<dyn StatsRefreshQueue>),
        );

        let chain = SupplyChainId::new();
        let c0 = connection_change(ActorId::new(), ActorId::new(), chain);
        let c1 = connection_change(ActorId::new(), ActorId::new(), chain);
        handler
            .handle(ProjectionEvent::ConnectionChanged(c0.clone()))
            .await
            .unwrap();
        handler
            .handle(ProjectionEvent::ConnectionChanged(c1.clone()))
            .await
            .unwrap();
        queue.drain();

        let result = handler
            .handle(ProjectionEvent::TagDeclared(TagDeclared {
                tag_id: TagId::new(),
                buyer_connection: c0.connection_id,
                supplier_connection: c1.connection_id,
                supply_chain: chain,
            }))
            .await;

        assert!(result.is_err());
        assert!(queue.drain().is_empty());
    }

    #[tokio::test]
    async fn test_connection_deletion_refreshes_former_buyer() {
        let store = Arc::new(InMemoryGraphStore::new());
        let queue = Arc::new(InMemoryStatsQueue::new());
        let handler = ProjectionEventHandler::new(
            store.clone() as Arc<dyn GraphStore>,
            Some(queue.clone() as Arc<dyn StatsRefreshQueue>),
        );

        let change = connection_change(ActorId::new(), ActorId::new(), SupplyChainId::new());
        handler
            .handle(ProjectionEvent::ConnectionChanged(change.clone()))
            .await
            .unwrap();
        queue.drain();

        handler
            .handle(ProjectionEvent::ConnectionDeleted(ConnectionDeleted {
                connection_id: change.connection_id,
            }))
            .await
            .unwrap();

        assert!(store
            .get_connection(change.connection_id)
            .await
            .unwrap()
            .is_none());
        assert_eq!(
            queue.drain(),
            vec![(change.buyer, Some(change.supply_chain))]
        );
    }

    #[tokio::test]
    async fn test_handler_without_queue_still_syncs() {
        let store = Arc::new(InMemoryGraphStore::new());
        let handler = ProjectionEventHandler::new(store.clone() as Arc<dyn GraphStore>, None);

        let change = connection_change(ActorId::new(), ActorId::new(), SupplyChainId::new());
        handler
            .handle(ProjectionEvent::ConnectionChanged(change.clone()))
            .await
            .unwrap();

        assert!(store
            .get_connection(change.connection_id)
            .await
            .unwrap()
            .is_some());
    }
}
