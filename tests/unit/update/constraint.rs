use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::common::memory_pool::{FixedSizeMemoryPool, PoolCounters};
use crate::update::node::{NodeId, SceneGraph, node_property};
use crate::update::property_owner::ObserverSet;

struct Sum {
    disconnects: Arc<AtomicUsize>,
}

impl ConstraintFunction for Sum {
    fn apply(
        &mut self,
        _current: &PropertyValue,
        inputs: &[PropertyValue],
    ) -> TableauResult<PropertyValue> {
        let mut out = [0.0_f32; 3];
        for input in inputs {
            if let PropertyValue::Vector3(v) = input {
                for i in 0..3 {
                    out[i] += v[i];
                }
            }
        }
        Ok(PropertyValue::Vector3(out))
    }

    fn on_disconnect(&mut self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

struct Constraints(FixedSizeMemoryPool<Constraint>);

impl ObserverSet for Constraints {
    fn observer_mut(&mut self, key: ObserverKey) -> Option<&mut dyn PropertyOwnerObserver> {
        match key {
            ObserverKey::Constraint(k) => self
                .0
                .get_mut(k)
                .map(|c| c as &mut dyn PropertyOwnerObserver),
            _ => None,
        }
    }
}

struct Fixture {
    graph: SceneGraph,
    constraints: Constraints,
    a: OwnerKey,
    b: OwnerKey,
    target: OwnerKey,
    key: PoolKey,
    disconnects: Arc<AtomicUsize>,
}

fn fixture() -> Fixture {
    let mut graph = SceneGraph::new(PoolCounters::new()).unwrap();
    let a = graph.add_node(NodeId(1)).unwrap();
    let b = graph.add_node(NodeId(2)).unwrap();
    let target = graph.add_node(NodeId(3)).unwrap();
    let disconnects = Arc::new(AtomicUsize::new(0));

    let constraint = Constraint::new(
        PropertyTarget {
            owner: target,
            property: node_property::POSITION,
        },
        [
            PropertyTarget {
                owner: a,
                property: node_property::POSITION,
            },
            PropertyTarget {
                owner: b,
                property: node_property::POSITION,
            },
        ],
        Box::new(Sum {
            disconnects: Arc::clone(&disconnects),
        }),
    );
    let mut pool = FixedSizeMemoryPool::new();
    let key = pool.allocate_with(constraint).unwrap();
    pool.get_mut(key)
        .unwrap()
        .on_connect(ObserverKey::Constraint(key), &mut graph)
        .unwrap();

    Fixture {
        graph,
        constraints: Constraints(pool),
        a,
        b,
        target,
        key,
        disconnects,
    }
}

#[test]
fn applies_sum_of_sources_each_frame() {
    let mut f = fixture();
    let buf = BufferIndex::ZERO;
    f.graph
        .owner_mut(f.a)
        .unwrap()
        .bake(buf, node_property::POSITION, PropertyValue::Vector3([1.0, 2.0, 3.0]))
        .unwrap();
    f.graph
        .owner_mut(f.b)
        .unwrap()
        .bake(buf, node_property::POSITION, PropertyValue::Vector3([10.0, 0.0, 0.0]))
        .unwrap();

    let c = f.constraints.0.get_mut(f.key).unwrap();
    c.apply(buf, &mut f.graph).unwrap();
    assert!(c.has_applied());
    assert_eq!(
        f.graph
            .owner(f.target)
            .unwrap()
            .get(buf, node_property::POSITION)
            .unwrap(),
        PropertyValue::Vector3([11.0, 2.0, 3.0])
    );
}

#[test]
fn observes_target_and_each_distinct_source_once() {
    let f = fixture();
    let c = f.constraints.0.get(f.key).unwrap();
    assert_eq!(c.observed_owners(), &[f.target, f.a, f.b]);
    for owner in [f.a, f.b, f.target] {
        assert_eq!(
            f.graph.owner(owner).unwrap().observers(),
            &[ObserverKey::Constraint(f.key)]
        );
    }
}

#[test]
fn destroying_two_owners_disconnects_once() {
    let mut f = fixture();
    let buf = BufferIndex::ZERO;

    f.graph.destroy_node(buf, f.a, &mut f.constraints).unwrap();
    assert_eq!(f.disconnects.load(Ordering::SeqCst), 1);
    let c = f.constraints.0.get(f.key).unwrap();
    assert!(c.is_disconnected());
    assert!(f.graph.owner(f.b).unwrap().observers().is_empty());
    assert!(f.graph.owner(f.target).unwrap().observers().is_empty());

    f.graph.destroy_node(buf, f.b, &mut f.constraints).unwrap();
    assert_eq!(f.disconnects.load(Ordering::SeqCst), 1);

    // A disconnected constraint never writes again.
    let c = f.constraints.0.get_mut(f.key).unwrap();
    c.apply(buf, &mut f.graph).unwrap();
    assert!(!c.has_applied());
}

#[test]
fn disconnect_from_scene_stops_observation() {
    let mut f = fixture();
    let buf = BufferIndex::ZERO;
    let root = f.graph.root();
    f.graph.connect_child(root, f.a, &mut f.constraints).unwrap();

    f.graph.disconnect_child(buf, f.a, &mut f.constraints).unwrap();
    assert_eq!(f.disconnects.load(Ordering::SeqCst), 1);
    assert!(f.graph.owner(f.a).unwrap().observers().is_empty());

    // Later events on the remaining owners are ignored.
    f.graph.destroy_node(buf, f.target, &mut f.constraints).unwrap();
    assert_eq!(f.disconnects.load(Ordering::SeqCst), 1);
}

#[test]
fn remove_with_bake_keeps_constrained_value() {
    let mut f = fixture();
    let buf = BufferIndex::ZERO;
    f.graph
        .owner_mut(f.a)
        .unwrap()
        .bake(buf, node_property::POSITION, PropertyValue::Vector3([4.0, 0.0, 0.0]))
        .unwrap();
    let c = f.constraints.0.get_mut(f.key).unwrap();
    assert_eq!(c.remove_action(), RemoveAction::Bake);
    c.apply(buf, &mut f.graph).unwrap();
    c.remove(buf, &mut f.graph);

    let target = f.graph.owner(f.target).unwrap();
    assert_eq!(
        target.property(node_property::POSITION).unwrap().base(),
        PropertyValue::Vector3([4.0, 0.0, 0.0])
    );
    assert!(target.observers().is_empty());
    assert_eq!(f.disconnects.load(Ordering::SeqCst), 1);
}

#[test]
fn remove_with_discard_leaves_base_untouched() {
    let mut f = fixture();
    let buf = BufferIndex::ZERO;
    f.graph
        .owner_mut(f.a)
        .unwrap()
        .bake(buf, node_property::POSITION, PropertyValue::Vector3([4.0, 0.0, 0.0]))
        .unwrap();
    let c = f.constraints.0.get_mut(f.key).unwrap();
    c.set_remove_action(RemoveAction::Discard);
    c.apply(buf, &mut f.graph).unwrap();
    c.remove(buf, &mut f.graph);

    assert_eq!(
        f.graph
            .owner(f.target)
            .unwrap()
            .property(node_property::POSITION)
            .unwrap()
            .base(),
        PropertyValue::Vector3([0.0, 0.0, 0.0])
    );
}

#[test]
fn closures_work_as_constraint_functions() {
    let mut graph = SceneGraph::new(PoolCounters::new()).unwrap();
    let target = graph.add_node(NodeId(1)).unwrap();
    let mut c = Constraint::new(
        PropertyTarget {
            owner: target,
            property: node_property::COLOR,
        },
        [],
        Box::new(|_: &PropertyValue, _: &[PropertyValue]| PropertyValue::Vector4([0.5; 4])),
    );
    c.on_connect(ObserverKey::External(1), &mut graph).unwrap();
    assert!(c.on_connect(ObserverKey::External(1), &mut graph).is_err());

    c.apply(BufferIndex::ONE, &mut graph).unwrap();
    assert_eq!(
        graph
            .owner(target)
            .unwrap()
            .get(BufferIndex::ONE, node_property::COLOR)
            .unwrap(),
        PropertyValue::Vector4([0.5; 4])
    );
}

#[test]
fn lifecycle_observer_slot_is_last_registered_wins() {
    let mut c = Constraint::new(
        PropertyTarget {
            owner: OwnerKey(PoolKey::from_raw(0)),
            property: PropertyIndex(0),
        },
        [],
        Box::new(|v: &PropertyValue, _: &[PropertyValue]| *v),
    );
    c.add_lifecycle_observer(PoolKey::from_raw(1));
    c.add_lifecycle_observer(PoolKey::from_raw(2));
    c.remove_lifecycle_observer(PoolKey::from_raw(1));
    assert_eq!(c.take_lifecycle_observer(), Some(PoolKey::from_raw(2)));
    assert_eq!(c.take_lifecycle_observer(), None);
}
