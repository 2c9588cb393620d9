//! Property tests for chain resolution invariants

use agritrace_graph::{
    ActorId, ActorNode, ChainResolution, ChainResolver, ConnectionId, ConnectionNode,
    ConnectionStatus, Direction, GraphStore, InMemoryGraphStore, ResolveRequest, SupplyChainId,
    TagEdge, TagId,
};
use chrono::Utc;
use proptest::prelude::*;
use std::sync::Arc;

const CONNECTION_DISTANCE: f64 = 1000.0;

/// A randomly shaped chain: one actor count per tier, and for every actor a
/// pick of which parent in the previous tier it supplies.
#[derive(Debug, Clone)]
struct ChainShape {
    tier_sizes: Vec<usize>,
    parent_picks: Vec<prop::sample::Index>,
}

fn chain_shape() -> impl Strategy<Value = ChainShape> {
    (
        prop::collection::vec(1usize..=3, 1..=4),
        prop::collection::vec(any::<prop::sample::Index>(), 12),
    )
        .prop_map(|(tier_sizes, parent_picks)| ChainShape {
            tier_sizes,
            parent_picks,
        })
}

struct BuiltChain {
    root: ActorId,
    /// Actors grouped by the tier they were placed at; index 0 is the root
    tiers: Vec<Vec<ActorId>>,
    resolver: ChainResolver,
}

/// Materialize a shape: every tier-n actor supplies one tier-(n-1) actor,
/// with tag edges chaining each incoming connection of the parent onward.
async fn build_chain(shape: &ChainShape) -> BuiltChain {
    let store = Arc::new(InMemoryGraphStore::new());
    let chain = SupplyChainId::new();
    let root = ActorId::new();
    store.upsert_actor(ActorNode::stub(root)).await.unwrap();

    let mut tiers: Vec<Vec<ActorId>> = vec![vec![root]];
    // Connections whose supplier is the keyed actor, used as tag buyer-sides
    let mut incoming: Vec<(ActorId, ConnectionId)> = Vec::new();
    let mut picks = shape.parent_picks.iter().cycle();

    for size in &shape.tier_sizes {
        let previous = tiers.last().unwrap().clone();
        let mut current = Vec::new();
        for _ in 0..*size {
            let supplier = ActorId::new();
            store.upsert_actor(ActorNode::stub(supplier)).await.unwrap();
            let buyer = previous[picks.next().unwrap().index(previous.len())];

            let connection = ConnectionNode {
                id: ConnectionId::new(),
                status: ConnectionStatus::Verified,
                buyer,
                supplier,
                supply_chain: chain,
                active: true,
                distance: CONNECTION_DISTANCE,
                email_sent: true,
                labels: Vec::new(),
                updated_at: Utc::now(),
            };
            store.upsert_connection(connection.clone()).await.unwrap();

            for (_, buyer_side) in incoming.iter().filter(|(actor, _)| *actor == buyer) {
                store
                    .upsert_tag(TagEdge {
                        tag_id: TagId::new(),
                        buyer_connection: *buyer_side,
                        supplier_connection: connection.id,
                        supply_chain: chain,
                        distance: CONNECTION_DISTANCE,
                    })
                    .await
                    .unwrap();
            }

            incoming.push((supplier, connection.id));
            current.push(supplier);
        }
        tiers.push(current);
    }

    let resolver = ChainResolver::new(store as Arc<dyn GraphStore>);
    BuiltChain {
        root,
        tiers,
        resolver,
    }
}

fn resolve_suppliers(shape: &ChainShape) -> (BuiltChain, ChainResolution) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let built = build_chain(shape).await;
        let result = built
            .resolver
            .resolve(ResolveRequest::new(built.root, Direction::ToSuppliers))
            .await
            .unwrap();
        (built, result)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_supplier_tiers_strictly_positive_and_bounded(shape in chain_shape()) {
        let (built, result) = resolve_suppliers(&shape);

        let root_entry = result.entry(built.root).unwrap();
        prop_assert_eq!(root_entry.tier, 0);
        prop_assert_eq!(root_entry.distance, 0.0);

        let depth = shape.tier_sizes.len() as i32;
        for id in &result.reachable {
            let entry = result.entry(*id).unwrap();
            prop_assert!(entry.tier >= 1, "tier {} not above root", entry.tier);
            prop_assert!(entry.tier <= depth);
            prop_assert!(entry.distance >= 0.0);
        }
    }

    #[test]
    fn prop_tier_matches_construction_depth(shape in chain_shape()) {
        let (built, result) = resolve_suppliers(&shape);

        for (depth, actors) in built.tiers.iter().enumerate().skip(1) {
            for actor in actors {
                let entry = result.entry(*actor).unwrap();
                prop_assert_eq!(entry.tier, depth as i32);
                // Each hop contributes one connection worth of distance
                prop_assert_eq!(entry.distance, depth as f64 * CONNECTION_DISTANCE);
            }
        }
    }

    #[test]
    fn prop_resolve_is_idempotent(shape in chain_shape()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (first, second) = rt.block_on(async {
            let built = build_chain(&shape).await;
            let request = ResolveRequest::new(built.root, Direction::ToSuppliers);
            let first = built.resolver.resolve(request.clone()).await.unwrap();
            let second = built.resolver.resolve(request).await.unwrap();
            (first, second)
        });
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_fast_mode_agrees_on_scalars(shape in chain_shape()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (full, fast) = rt.block_on(async {
            let built = build_chain(&shape).await;
            let full = built
                .resolver
                .resolve(ResolveRequest::new(built.root, Direction::ToSuppliers))
                .await
                .unwrap();
            let fast = built
                .resolver
                .resolve(ResolveRequest::new(built.root, Direction::ToSuppliers).fast(true))
                .await
                .unwrap();
            (full, fast)
        });

        prop_assert_eq!(&full.reachable, &fast.reachable);
        for (id, entry) in &full.tiers {
            let fast_entry = fast.entry(*id).unwrap();
            prop_assert_eq!(entry.tier, fast_entry.tier);
            prop_assert_eq!(entry.distance, fast_entry.distance);
        }
    }
}
