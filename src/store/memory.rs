//! In-memory graph store
//!
//! Keeps actor and connection nodes plus tag edges in hash maps with
//! secondary indexes per traversal entry point, mirroring how the projection
//! is laid out in a property-graph database. Readers take short read locks
//! and see a best-effort snapshot of concurrent writes.

use super::{ActorNode, ConnectionNode, GraphStore, StoreResult, TagEdge};
use crate::queries::{PathQuery, PathRow};
use crate::value_objects::{ActorId, ConnectionId, Direction, TagId};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
struct State {
    actors: HashMap<ActorId, ActorNode>,
    connections: HashMap<ConnectionId, ConnectionNode>,
    tags: HashMap<TagId, TagEdge>,
    connections_by_buyer: HashMap<ActorId, Vec<ConnectionId>>,
    connections_by_supplier: HashMap<ActorId, Vec<ConnectionId>>,
    tags_by_buyer_connection: HashMap<ConnectionId, Vec<TagId>>,
    tags_by_supplier_connection: HashMap<ConnectionId, Vec<TagId>>,
}

impl State {
    fn unlink_connection(&mut self, connection: &ConnectionNode) {
        if let Some(ids) = self.connections_by_buyer.get_mut(&connection.buyer) {
            ids.retain(|id| id != &connection.id);
        }
        if let Some(ids) = self.connections_by_supplier.get_mut(&connection.supplier) {
            ids.retain(|id| id != &connection.id);
        }
    }

    fn unlink_tag(&mut self, tag: &TagEdge) {
        if let Some(ids) = self.tags_by_buyer_connection.get_mut(&tag.buyer_connection) {
            ids.retain(|id| id != &tag.tag_id);
        }
        if let Some(ids) = self.tags_by_supplier_connection.get_mut(&tag.supplier_connection) {
            ids.retain(|id| id != &tag.tag_id);
        }
    }

    fn remove_connection_cascading(&mut self, id: ConnectionId) {
        if let Some(connection) = self.connections.remove(&id) {
            self.unlink_connection(&connection);
        }
        let attached: Vec<TagId> = self
            .tags
            .values()
            .filter(|t| t.buyer_connection == id || t.supplier_connection == id)
            .map(|t| t.tag_id)
            .collect();
        for tag_id in attached {
            if let Some(tag) = self.tags.remove(&tag_id) {
                self.unlink_tag(&tag);
            }
        }
    }

    /// Enumerate every simple path from the query root, emitting one row per
    /// prefix so each reachable tier is reported.
    fn collect_paths(&self, query: &PathQuery) -> Vec<PathRow> {
        let first_hop_index = match query.direction {
            Direction::ToSuppliers => &self.connections_by_buyer,
            Direction::ToBuyers => &self.connections_by_supplier,
        };

        let mut rows = Vec::new();
        let Some(first_hops) = first_hop_index.get(&query.root) else {
            return rows;
        };

        for connection_id in first_hops {
            let Some(first) = self.connections.get(connection_id) else {
                continue;
            };
            if !query.permits_first_hop(first) {
                continue;
            }
            let mut visited = HashSet::from([first.id]);
            let mut tags = Vec::new();
            self.walk(query, first, first, &mut tags, &mut visited, &mut rows);
        }

        rows
    }

    fn walk(
        &self,
        query: &PathQuery,
        first: &ConnectionNode,
        current: &ConnectionNode,
        tags: &mut Vec<TagEdge>,
        visited: &mut HashSet<ConnectionId>,
        rows: &mut Vec<PathRow>,
    ) {
        let terminal = match query.direction {
            Direction::ToSuppliers => current.supplier,
            Direction::ToBuyers => current.buyer,
        };
        if query.permits_terminal(terminal) {
            rows.push(PathRow {
                terminal,
                first: first.clone(),
                last: current.clone(),
                tags: tags.clone(),
            });
        }

        let tag_index = match query.direction {
            Direction::ToSuppliers => &self.tags_by_buyer_connection,
            Direction::ToBuyers => &self.tags_by_supplier_connection,
        };
        let Some(outgoing) = tag_index.get(&current.id) else {
            return;
        };

        for tag_id in outgoing {
            let Some(tag) = self.tags.get(tag_id) else {
                continue;
            };
            if !query.permits_tag(tag) {
                continue;
            }
            let next_id = match query.direction {
                Direction::ToSuppliers => tag.supplier_connection,
                Direction::ToBuyers => tag.buyer_connection,
            };
            if visited.contains(&next_id) {
                continue;
            }
            let Some(next) = self.connections.get(&next_id) else {
                tracing::warn!("tag {} points at missing connection {}", tag.tag_id, next_id);
                continue;
            };
            if !query.permits_connection(next) {
                continue;
            }

            visited.insert(next_id);
            tags.push(tag.clone());
            self.walk(query, first, next, tags, visited, rows);
            tags.pop();
            visited.remove(&next_id);
        }
    }
}

/// In-memory implementation of [`GraphStore`]
#[derive(Debug, Default)]
pub struct InMemoryGraphStore {
    state: RwLock<State>,
}

impl InMemoryGraphStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn upsert_actor(&self, actor: ActorNode) -> StoreResult<()> {
        let mut state = self.state.write();
        state.actors.insert(actor.id, actor);
        Ok(())
    }

    async fn get_actor(&self, id: ActorId) -> StoreResult<Option<ActorNode>> {
        Ok(self.state.read().actors.get(&id).cloned())
    }

    async fn remove_actor(&self, id: ActorId) -> StoreResult<()> {
        let mut state = self.state.write();
        state.actors.remove(&id);
        let touching: Vec<ConnectionId> = state
            .connections
            .values()
            .filter(|c| c.buyer == id || c.supplier == id)
            .map(|c| c.id)
            .collect();
        for connection_id in touching {
            state.remove_connection_cascading(connection_id);
        }
        state.connections_by_buyer.remove(&id);
        state.connections_by_supplier.remove(&id);
        Ok(())
    }

    async fn upsert_connection(&self, connection: ConnectionNode) -> StoreResult<()> {
        let mut state = self.state.write();
        if let Some(previous) = state.connections.remove(&connection.id) {
            state.unlink_connection(&previous);
        }
        state
            .connections_by_buyer
            .entry(connection.buyer)
            .or_default()
            .push(connection.id);
        state
            .connections_by_supplier
            .entry(connection.supplier)
            .or_default()
            .push(connection.id);
        state.connections.insert(connection.id, connection);
        Ok(())
    }

    async fn get_connection(&self, id: ConnectionId) -> StoreResult<Option<ConnectionNode>> {
        Ok(self.state.read().connections.get(&id).cloned())
    }

    async fn remove_connection(&self, id: ConnectionId) -> StoreResult<()> {
        self.state.write().remove_connection_cascading(id);
        Ok(())
    }

    async fn upsert_tag(&self, tag: TagEdge) -> StoreResult<()> {
        let mut state = self.state.write();
        if let Some(previous) = state.tags.remove(&tag.tag_id) {
            state.unlink_tag(&previous);
        }
        state
            .tags_by_buyer_connection
            .entry(tag.buyer_connection)
            .or_default()
            .push(tag.tag_id);
        state
            .tags_by_supplier_connection
            .entry(tag.supplier_connection)
            .or_default()
            .push(tag.tag_id);
        state.tags.insert(tag.tag_id, tag);
        Ok(())
    }

    async fn get_tag(&self, tag_id: TagId) -> StoreResult<Option<TagEdge>> {
        Ok(self.state.read().tags.get(&tag_id).cloned())
    }

    async fn remove_tag(&self, tag_id: TagId) -> StoreResult<()> {
        let mut state = self.state.write();
        if let Some(tag) = state.tags.remove(&tag_id) {
            state.unlink_tag(&tag);
        }
        Ok(())
    }

    async fn tags_for_connection(&self, id: ConnectionId) -> StoreResult<Vec<TagEdge>> {
        let state = self.state.read();
        let mut tags = Vec::new();
        for index in [&state.tags_by_buyer_connection, &state.tags_by_supplier_connection] {
            if let Some(ids) = index.get(&id) {
                tags.extend(ids.iter().filter_map(|tag_id| state.tags.get(tag_id)).cloned());
            }
        }
        Ok(tags)
    }

    async fn run_path_query(&self, query: &PathQuery) -> StoreResult<Vec<PathRow>> {
        tracing::debug!(
            "path query from {} direction {} (chain scope: {})",
            query.root,
            query.direction,
            query.supply_chain.is_some()
        );
        Ok(self.state.read().collect_paths(query))
    }
}
