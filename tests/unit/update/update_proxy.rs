use super::*;
use crate::common::memory_pool::PoolCounters;
use crate::update::property_owner::{ObserverKey, ObserverSet, PropertyOwnerObserver};

struct NoObservers;

impl ObserverSet for NoObservers {
    fn observer_mut(&mut self, _key: ObserverKey) -> Option<&mut dyn PropertyOwnerObserver> {
        None
    }
}

/// root -> a -> b, plus a detached c.
fn scene() -> (SceneGraph, OwnerKey, OwnerKey, OwnerKey) {
    let mut g = SceneGraph::new(PoolCounters::new()).unwrap();
    let a = g.add_node(NodeId(1)).unwrap();
    let b = g.add_node(NodeId(2)).unwrap();
    let c = g.add_node(NodeId(3)).unwrap();
    let root = g.root();
    g.connect_child(root, a, &mut NoObservers).unwrap();
    g.connect_child(a, b, &mut NoObservers).unwrap();
    (g, a, b, c)
}

#[test]
fn traveler_is_limited_to_its_subtree() {
    let (g, a, b, _) = scene();
    let mut t = SceneGraphTraveler::new(Some(a));
    assert_eq!(t.find_node(&g, NodeId(1)), Some(a));
    assert_eq!(t.find_node(&g, NodeId(2)), Some(b));
    assert_eq!(t.find_node(&g, NodeId(3)), None);
    assert_eq!(t.find_node(&g, NodeId::ROOT), None);

    let mut global = SceneGraphTraveler::new(None);
    assert!(global.find_node(&g, NodeId(3)).is_some());
}

#[test]
fn hierarchy_change_clears_the_cache() {
    let (mut g, a, b, _) = scene();
    let mut t = SceneGraphTraveler::new(Some(a));
    t.find_node(&g, NodeId(2));
    assert_eq!(t.cached(), 1);

    g.disconnect_child(BufferIndex::ZERO, b, &mut NoObservers)
        .unwrap();
    t.node_hierarchy_changed();
    assert_eq!(t.cached(), 0);
    assert_eq!(t.find_node(&g, NodeId(2)), None);
}

#[test]
fn set_and_bake_queue_matching_resetters() {
    let (mut g, a, _, _) = scene();
    let mut t = SceneGraphTraveler::new(None);
    let mut state = UpdateProxyState::new(None);
    let mut resets = Vec::new();
    let mut proxy = UpdateProxy::new(&mut g, &mut t, &mut state, &mut resets, BufferIndex::ZERO);

    assert!(proxy.set_position(NodeId(1), [1.0, 2.0, 3.0]));
    assert_eq!(proxy.position(NodeId(1)), Some([1.0, 2.0, 3.0]));
    assert!(proxy.bake_color(NodeId(1), [0.5; 4]));
    assert!(!proxy.set_size(NodeId(42), [1.0; 3]));

    assert_eq!(
        resets,
        vec![
            ResetRequest {
                owner: a,
                property: node_property::POSITION,
                lifetime: ResetterLifetime::Set,
            },
            ResetRequest {
                owner: a,
                property: node_property::COLOR,
                lifetime: ResetterLifetime::Bake,
            },
        ]
    );
}

#[test]
fn world_position_accumulates_parents() {
    let (mut g, _, _, _) = scene();
    let mut t = SceneGraphTraveler::new(None);
    let mut state = UpdateProxyState::new(None);
    let mut resets = Vec::new();
    let mut proxy = UpdateProxy::new(&mut g, &mut t, &mut state, &mut resets, BufferIndex::ZERO);
    proxy.bake_position(NodeId(1), [10.0, 0.0, 0.0]);
    proxy.bake_scale(NodeId(1), [2.0, 2.0, 2.0]);
    proxy.bake_position(NodeId(2), [1.0, 1.0, 0.0]);
    assert_eq!(proxy.world_position(NodeId(2)), Some([12.0, 2.0, 0.0]));
}

#[test]
fn sync_points_pop_in_order() {
    let (mut g, _, _, _) = scene();
    let mut t = SceneGraphTraveler::new(None);
    let mut state = UpdateProxyState::new(Some(NodeId(1)));
    state.push_sync_point(7);
    state.push_sync_point(8);
    let mut resets = Vec::new();
    let mut proxy = UpdateProxy::new(&mut g, &mut t, &mut state, &mut resets, BufferIndex::ZERO);
    assert_eq!(proxy.root(), Some(NodeId(1)));
    assert_eq!(proxy.pop_sync_point(), Some(7));
    assert_eq!(proxy.pop_sync_point(), Some(8));
    assert_eq!(proxy.pop_sync_point(), None);
}
