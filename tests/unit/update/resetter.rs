use super::*;
use crate::common::memory_pool::PoolCounters;
use crate::update::node::{NodeId, SceneGraph, node_property};
use crate::update::property::PropertyValue;

const B0: BufferIndex = BufferIndex::ZERO;
const B1: BufferIndex = BufferIndex::ONE;

fn graph_with_node() -> (SceneGraph, OwnerKey) {
    let mut g = SceneGraph::new(PoolCounters::new()).unwrap();
    let n = g.add_node(NodeId(1)).unwrap();
    (g, n)
}

#[test]
fn initialize_twice_is_a_contract_error() {
    let (mut g, n) = graph_with_node();
    let mut r = PropertyResetter::baker(n, node_property::POSITION, ResetterLifetime::Bake);
    r.initialize(ObserverKey::External(0), &mut g).unwrap();
    assert!(g.owner(n).unwrap().is_updated());
    let err = r.initialize(ObserverKey::External(0), &mut g).unwrap_err();
    assert!(matches!(err, TableauError::Contract(_)));
}

#[test]
fn bake_lifetime_copies_base_into_other_buffer_then_stops() {
    let (mut g, n) = graph_with_node();
    let value = PropertyValue::Vector3([3.0, 0.0, 0.0]);
    g.owner_mut(n)
        .unwrap()
        .bake(B0, node_property::POSITION, value)
        .unwrap();

    let mut r = PropertyResetter::baker(n, node_property::POSITION, ResetterLifetime::Bake);
    r.initialize(ObserverKey::External(0), &mut g).unwrap();

    r.request_reset_to_base_values(B1, &mut g);
    assert_eq!(
        g.owner(n).unwrap().get(B1, node_property::POSITION).unwrap(),
        value
    );
    assert_eq!(r.running(), STOPPED);
    assert!(r.is_finished());
}

#[test]
fn set_lifetime_runs_two_frames() {
    let (mut g, n) = graph_with_node();
    let mut r = PropertyResetter::baker(n, node_property::SIZE, ResetterLifetime::Set);
    r.initialize(ObserverKey::External(0), &mut g).unwrap();

    r.request_reset_to_base_values(B1, &mut g);
    assert!(!r.is_finished());
    r.request_reset_to_base_values(B0, &mut g);
    assert!(r.is_finished());
}

#[test]
fn modifier_resetter_ages_after_modifier_is_destroyed() {
    let (mut g, n) = graph_with_node();
    let modifier = ModifierKey::Constraint(PoolKey::from_raw(3));
    let mut r = PropertyResetter::for_modifier(n, node_property::COLOR, modifier);
    r.initialize(ObserverKey::External(0), &mut g).unwrap();
    assert_eq!(r.modifier(), Some(modifier));

    g.owner_mut(n)
        .unwrap()
        .set(B0, node_property::COLOR, PropertyValue::Vector4([0.0; 4]))
        .unwrap();
    r.request_reset_to_base_values(B0, &mut g);
    assert_eq!(
        g.owner(n).unwrap().get(B0, node_property::COLOR).unwrap(),
        PropertyValue::Vector4([1.0; 4])
    );
    assert!(!r.is_finished());

    r.object_destroyed();
    assert_eq!(r.modifier(), None);
    assert_eq!(r.running(), AGING);
    assert!(!r.is_finished());
    assert!(r.is_finished());
}

#[test]
fn destroyed_owner_stops_immediately() {
    let (mut g, n) = graph_with_node();
    let mut r = PropertyResetter::for_modifier(
        n,
        node_property::POSITION,
        ModifierKey::Animation(PoolKey::from_raw(0)),
    );
    r.initialize(ObserverKey::External(0), &mut g).unwrap();

    r.property_owner_destroyed(n, &mut g);
    assert_eq!(r.owner(), None);
    assert!(r.is_finished());
    // Nothing to reset any more.
    r.request_reset_to_base_values(B0, &mut g);
}

#[test]
fn disconnected_owner_makes_modifier_resetter_age() {
    let (mut g, n) = graph_with_node();
    let mut r = PropertyResetter::for_modifier(
        n,
        node_property::POSITION,
        ModifierKey::Animation(PoolKey::from_raw(0)),
    );
    r.initialize(ObserverKey::External(0), &mut g).unwrap();

    let verdict = r.property_owner_disconnected(B0, n, &mut g);
    assert_eq!(verdict, NotifyReturn::KeepObserving);
    r.request_reset_to_base_values(B0, &mut g);
    r.request_reset_to_base_values(B1, &mut g);
    assert_eq!(r.active, STOPPED);

    r.property_owner_connected(n);
    assert_eq!(r.active, ACTIVE);
}

#[test]
fn release_unregisters_from_owner() {
    let (mut g, n) = graph_with_node();
    let mut r = PropertyResetter::baker(n, node_property::POSITION, ResetterLifetime::Bake);
    r.initialize(ObserverKey::External(5), &mut g).unwrap();
    assert_eq!(g.owner(n).unwrap().observers().len(), 1);

    r.release(ObserverKey::External(5), &mut g);
    assert!(g.owner(n).unwrap().observers().is_empty());
}
