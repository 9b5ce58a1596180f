use super::*;
use crate::update::property_owner::{NotifyReturn, PropertyOwnerObserver};

#[derive(Default)]
struct Log {
    events: Vec<(&'static str, OwnerKey)>,
}

impl PropertyOwnerObserver for Log {
    fn property_owner_connected(&mut self, owner: OwnerKey) {
        self.events.push(("connected", owner));
    }

    fn property_owner_disconnected(
        &mut self,
        _buffer: BufferIndex,
        owner: OwnerKey,
        _registry: &mut dyn ObserverRegistry,
    ) -> NotifyReturn {
        self.events.push(("disconnected", owner));
        NotifyReturn::KeepObserving
    }

    fn property_owner_destroyed(&mut self, owner: OwnerKey, _registry: &mut dyn ObserverRegistry) {
        self.events.push(("destroyed", owner));
    }
}

impl ObserverSet for Log {
    fn observer_mut(&mut self, key: ObserverKey) -> Option<&mut dyn PropertyOwnerObserver> {
        match key {
            ObserverKey::External(0) => Some(self),
            _ => None,
        }
    }
}

fn graph() -> SceneGraph {
    SceneGraph::new(PoolCounters::new()).unwrap()
}

#[test]
fn connecting_under_root_reports_whole_subtree() {
    let mut g = graph();
    let mut log = Log::default();
    let a = g.add_node(NodeId(1)).unwrap();
    let b = g.add_node(NodeId(2)).unwrap();
    g.add_observer(a, ObserverKey::External(0)).unwrap();
    g.add_observer(b, ObserverKey::External(0)).unwrap();

    g.connect_child(a, b, &mut log).unwrap();
    assert!(log.events.is_empty());
    assert!(!g.node(b).unwrap().is_connected());

    g.connect_child(g.root(), a, &mut log).unwrap();
    assert_eq!(log.events, vec![("connected", a), ("connected", b)]);
    assert!(g.node(b).unwrap().is_connected());
    assert!(g.take_hierarchy_changed());
    assert!(!g.take_hierarchy_changed());
}

#[test]
fn disconnect_reports_and_keeps_node_alive() {
    let mut g = graph();
    let mut log = Log::default();
    let a = g.add_node(NodeId(1)).unwrap();
    g.connect_child(g.root(), a, &mut log).unwrap();
    g.add_observer(a, ObserverKey::External(0)).unwrap();

    g.disconnect_child(BufferIndex::ZERO, a, &mut log).unwrap();
    assert_eq!(log.events, vec![("disconnected", a)]);
    assert!(g.node(a).is_some());
    assert_eq!(g.node(g.root()).unwrap().children().len(), 0);

    // Detaching an orphan is a no-op.
    g.disconnect_child(BufferIndex::ZERO, a, &mut log).unwrap();
    assert_eq!(log.events.len(), 1);
}

#[test]
fn destroy_notifies_before_slot_release() {
    let mut g = graph();
    let mut log = Log::default();
    let a = g.add_node(NodeId(1)).unwrap();
    let b = g.add_node(NodeId(2)).unwrap();
    g.connect_child(g.root(), a, &mut log).unwrap();
    g.connect_child(a, b, &mut log).unwrap();
    g.add_observer(a, ObserverKey::External(0)).unwrap();

    g.destroy_node(BufferIndex::ZERO, a, &mut log).unwrap();
    assert_eq!(log.events.last(), Some(&("destroyed", a)));
    assert_eq!(
        log.events.iter().filter(|(e, _)| *e == "destroyed").count(),
        1
    );
    assert!(g.node(a).is_none());
    assert!(g.key_of(NodeId(1)).is_none());

    // The child survives as an orphan.
    let child = g.node(b).unwrap();
    assert!(child.parent().is_none());
    assert!(!child.is_connected());
}

#[test]
fn root_cannot_be_destroyed_and_cycles_are_rejected() {
    let mut g = graph();
    let mut log = Log::default();
    let root = g.root();
    assert!(g.destroy_node(BufferIndex::ZERO, root, &mut log).is_err());

    let a = g.add_node(NodeId(1)).unwrap();
    let b = g.add_node(NodeId(2)).unwrap();
    g.connect_child(a, b, &mut log).unwrap();
    assert!(g.connect_child(b, a, &mut log).is_err());
    assert!(g.connect_child(a, a, &mut log).is_err());
    assert!(g.add_node(NodeId(1)).is_err());
}

#[test]
fn world_position_accumulates_scaled_offsets() {
    let mut g = graph();
    let mut log = Log::default();
    let a = g.add_node(NodeId(1)).unwrap();
    let b = g.add_node(NodeId(2)).unwrap();
    g.connect_child(g.root(), a, &mut log).unwrap();
    g.connect_child(a, b, &mut log).unwrap();

    let buf = BufferIndex::ZERO;
    let owner = g.owner_mut(a).unwrap();
    owner
        .bake(buf, node_property::POSITION, PropertyValue::Vector3([10.0, 0.0, 0.0]))
        .unwrap();
    owner
        .bake(buf, node_property::SCALE, PropertyValue::Vector3([2.0, 2.0, 1.0]))
        .unwrap();
    g.owner_mut(b)
        .unwrap()
        .bake(buf, node_property::POSITION, PropertyValue::Vector3([5.0, 1.0, 0.0]))
        .unwrap();

    assert_eq!(g.world_position(buf, b), [20.0, 2.0, 0.0]);
}
