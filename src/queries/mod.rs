//! Parameterized path queries
//!
//! Queries provide read-only access to the connection graph. A [`PathQuery`]
//! is a typed, parameterized description of a multi-hop traversal; direction
//! and scope are enumerated values, never interpolated into query text, so
//! the four direction/scope combinations are exhaustively testable.

use crate::store::{ConnectionNode, TagEdge};
use crate::value_objects::{ActorId, ConnectionId, Direction, SupplyChainId};
use serde::{Deserialize, Serialize};

/// A parameterized multi-hop path query over the connection graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathQuery {
    /// The actor the traversal starts from
    pub root: ActorId,
    /// Which edge traversal order is used
    pub direction: Direction,
    /// When set, only connections and tag edges with this supply chain
    /// participate
    pub supply_chain: Option<SupplyChainId>,
    /// When set, only paths ending at this actor are returned
    pub target: Option<ActorId>,
    /// When set, the first hop is restricted to this explicit connection set
    pub starting_connections: Option<Vec<ConnectionId>>,
}

impl PathQuery {
    /// Whether a connection may participate in this traversal at all
    pub fn permits_connection(&self, connection: &ConnectionNode) -> bool {
        if !connection.active {
            return false;
        }
        match self.supply_chain {
            Some(chain) => connection.supply_chain == chain,
            None => true,
        }
    }

    /// Whether a connection may be the first hop of a path
    pub fn permits_first_hop(&self, connection: &ConnectionNode) -> bool {
        if !self.permits_connection(connection) {
            return false;
        }
        match &self.starting_connections {
            Some(starting) => starting.contains(&connection.id),
            None => true,
        }
    }

    /// Whether a tag edge may extend a path
    pub fn permits_tag(&self, tag: &TagEdge) -> bool {
        match self.supply_chain {
            Some(chain) => tag.supply_chain == chain,
            None => true,
        }
    }

    /// Whether a path terminating at the given actor satisfies the target
    /// bound
    pub fn permits_terminal(&self, actor: ActorId) -> bool {
        match self.target {
            Some(target) => actor == target,
            None => true,
        }
    }
}

/// Builder for [`PathQuery`] values
#[derive(Debug, Clone)]
pub struct PathQueryBuilder {
    direction: Direction,
    supply_chain: Option<SupplyChainId>,
    target: Option<ActorId>,
    starting_connections: Option<Vec<ConnectionId>>,
}

impl PathQueryBuilder {
    /// Start building a query in the given direction
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            supply_chain: None,
            target: None,
            starting_connections: None,
        }
    }

    /// Scope the traversal to one supply chain
    pub fn supply_chain(mut self, chain: SupplyChainId) -> Self {
        self.supply_chain = Some(chain);
        self
    }

    /// Scope the traversal to an optional supply chain
    pub fn supply_chain_opt(mut self, chain: Option<SupplyChainId>) -> Self {
        self.supply_chain = chain;
        self
    }

    /// Bound the traversal to paths ending at the given actor
    pub fn target_actor(mut self, actor: ActorId) -> Self {
        self.target = Some(actor);
        self
    }

    /// Restrict the first hop to an explicit connection set
    pub fn starting_connections(mut self, connections: Vec<ConnectionId>) -> Self {
        self.starting_connections = Some(connections);
        self
    }

    /// Restrict the first hop to an optional connection set
    pub fn starting_connections_opt(mut self, connections: Option<Vec<ConnectionId>>) -> Self {
        self.starting_connections = connections;
        self
    }

    /// Build the query rooted at the given actor
    pub fn build(self, root: ActorId) -> PathQuery {
        PathQuery {
            root,
            direction: self.direction,
            supply_chain: self.supply_chain,
            target: self.target,
            starting_connections: self.starting_connections,
        }
    }
}

/// One matched path returned by the store: the terminal actor, the first and
/// last connections on the path, and the ordered tag edges between them.
///
/// A one-hop path has `first == last` and no tag edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathRow {
    /// The actor the path terminates at
    pub terminal: ActorId,
    /// The first connection on the path
    pub first: ConnectionNode,
    /// The last connection on the path
    pub last: ConnectionNode,
    /// The ordered tag edges traversed between first and last
    pub tags: Vec<TagEdge>,
}

impl PathRow {
    /// Unsigned hop count of this path: tag hops plus the first connection
    pub fn hops(&self) -> usize {
        self.tags.len() + 1
    }

    /// Aggregated geographic distance of this path: average of the first and
    /// last connection's own distance, plus the sum of all intervening tag
    /// edge distances.
    pub fn total_distance(&self) -> f64 {
        let endpoints = (self.first.distance + self.last.distance) / 2.0;
        let tags: f64 = self.tags.iter().map(|t| t.distance).sum();
        endpoints + tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::ConnectionStatus;
    use chrono::Utc;

    fn connection(chain: SupplyChainId, active: bool) -> ConnectionNode {
        ConnectionNode {
            id: ConnectionId::new(),
            status: ConnectionStatus::Verified,
            buyer: ActorId::new(),
            supplier: ActorId::new(),
            supply_chain: chain,
            active,
            distance: 1000.0,
            email_sent: true,
            labels: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_inactive_connections_never_participate() {
        let chain = SupplyChainId::new();
        let query = PathQueryBuilder::new(Direction::ToSuppliers).build(ActorId::new());
        assert!(query.permits_connection(&connection(chain, true)));
        assert!(!query.permits_connection(&connection(chain, false)));
    }

    #[test]
    fn test_supply_chain_scope() {
        let chain = SupplyChainId::new();
        let other = SupplyChainId::new();
        let query = PathQueryBuilder::new(Direction::ToSuppliers)
            .supply_chain(chain)
            .build(ActorId::new());
        assert!(query.permits_connection(&connection(chain, true)));
        assert!(!query.permits_connection(&connection(other, true)));
    }

    #[test]
    fn test_starting_connection_scope() {
        let chain = SupplyChainId::new();
        let allowed = connection(chain, true);
        let excluded = connection(chain, true);
        let query = PathQueryBuilder::new(Direction::ToSuppliers)
            .starting_connections(vec![allowed.id])
            .build(ActorId::new());
        assert!(query.permits_first_hop(&allowed));
        assert!(!query.permits_first_hop(&excluded));
        // The restriction applies to the first hop only
        assert!(query.permits_connection(&excluded));
    }

    #[test]
    fn test_target_bound() {
        let target = ActorId::new();
        let query = PathQueryBuilder::new(Direction::ToBuyers)
            .target_actor(target)
            .build(ActorId::new());
        assert!(query.permits_terminal(target));
        assert!(!query.permits_terminal(ActorId::new()));
    }

    #[test]
    fn test_path_row_distance() {
        let chain = SupplyChainId::new();
        let mut first = connection(chain, true);
        first.distance = 1000.0;
        let mut last = connection(chain, true);
        last.distance = 3000.0;
        let row = PathRow {
            terminal: last.supplier,
            first: first.clone(),
            last,
            tags: vec![TagEdge {
                tag_id: crate::value_objects::TagId::new(),
                buyer_connection: first.id,
                supplier_connection: ConnectionId::new(),
                supply_chain: chain,
                distance: 2000.0,
            }],
        };
        assert_eq!(row.hops(), 2);
        assert_eq!(row.total_distance(), 4000.0);
    }
}
