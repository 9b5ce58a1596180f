use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::*;
use crate::update::animation::AnimationConfig;
use crate::update::constraint::RemoveAction;
use crate::update::ease::Ease;
use crate::update::frame_callback::{
    FrameCallbackInterface, FrameCallbackLink, InterfaceId, SharedFrameCallbackInterface,
};
use crate::update::node::NodeId;
use crate::update::property_notification::{NotifyCondition, NotifyMode};
use crate::update::update_proxy::UpdateProxy;

const DT: f32 = 1.0 / 60.0;

fn manager() -> UpdateManager {
    UpdateManager::new(PoolCounters::new()).unwrap()
}

fn pos(node: u32) -> NodeProperty {
    NodeProperty::new(NodeId(node), node_property::POSITION)
}

fn x(m: &UpdateManager, node: u32) -> f32 {
    m.current_value(pos(node)).unwrap().as_scalar()
}

fn add_connected(m: &mut UpdateManager, id: u32, parent: NodeId) {
    m.queue(UpdateMessage::AddNode(NodeId(id)));
    m.queue(UpdateMessage::ConnectNode {
        parent,
        child: NodeId(id),
    });
}

fn bake_x(m: &mut UpdateManager, node: u32, value: f32) {
    m.queue(UpdateMessage::BakeProperty {
        target: pos(node),
        value: PropertyValue::Vector3([value, 0.0, 0.0]),
    });
}

#[test]
fn set_lasts_one_frame_and_bake_persists() {
    let mut m = manager();
    add_connected(&mut m, 1, NodeId::ROOT);
    m.queue(UpdateMessage::SetProperty {
        target: pos(1),
        value: PropertyValue::Vector3([5.0, 0.0, 0.0]),
    });
    m.update(DT).unwrap();
    assert_eq!(x(&m, 1), 5.0);
    assert_eq!(m.resetter_count(), 1);

    m.update(DT).unwrap();
    assert_eq!(x(&m, 1), 0.0);
    m.update(DT).unwrap();
    assert_eq!(x(&m, 1), 0.0);
    assert_eq!(m.resetter_count(), 0);

    bake_x(&mut m, 1, 7.0);
    m.update(DT).unwrap();
    assert_eq!(x(&m, 1), 7.0);
    m.update(DT).unwrap();
    assert_eq!(x(&m, 1), 7.0);
    assert_eq!(m.resetter_count(), 0);
}

#[test]
fn rejected_messages_do_not_stop_the_frame() {
    let mut m = manager();
    m.queue(UpdateMessage::ConnectNode {
        parent: NodeId::ROOT,
        child: NodeId(42),
    });
    add_connected(&mut m, 1, NodeId::ROOT);
    let out = m.update(DT).unwrap();
    assert_eq!(out.render.draw_list.len(), 1);
    assert_eq!(m.frame(), 1);
    assert_eq!(m.buffer(), BufferIndex::ONE);
}

#[test]
fn draw_list_walks_connected_nodes_depth_first() {
    let mut m = manager();
    add_connected(&mut m, 1, NodeId::ROOT);
    add_connected(&mut m, 2, NodeId(1));
    m.queue(UpdateMessage::AddNode(NodeId(3)));
    add_connected(&mut m, 4, NodeId::ROOT);
    bake_x(&mut m, 1, 10.0);
    bake_x(&mut m, 2, 1.0);

    let out = m.update(DT).unwrap();
    let ids: Vec<NodeId> = out.render.draw_list.iter().map(|d| d.node).collect();
    assert_eq!(ids, vec![NodeId(1), NodeId(2), NodeId(4)]);
    assert_eq!(out.render.draw_list[1].world_position, [11.0, 0.0, 0.0]);
    assert_eq!(out.render.draw_list[0].color, [1.0; 4]);
}

#[test]
fn constraint_follows_its_source_and_bakes_on_removal() {
    let mut m = manager();
    add_connected(&mut m, 1, NodeId::ROOT);
    add_connected(&mut m, 2, NodeId::ROOT);
    bake_x(&mut m, 1, 3.0);
    m.queue(UpdateMessage::AddConstraint {
        id: ConstraintId(1),
        target: pos(2),
        sources: vec![pos(1)],
        function: Box::new(|_: &PropertyValue, inputs: &[PropertyValue]| inputs[0]),
        remove_action: RemoveAction::Bake,
    });
    m.update(DT).unwrap();
    assert_eq!(x(&m, 2), 3.0);
    assert_eq!(m.constraint_count(), 1);

    m.queue(UpdateMessage::RemoveConstraint(ConstraintId(1)));
    m.update(DT).unwrap();
    assert_eq!(x(&m, 2), 3.0);
    assert_eq!(m.constraint_count(), 0);

    m.update(DT).unwrap();
    assert_eq!(x(&m, 2), 3.0);
    assert_eq!(m.resetter_count(), 0);
}

#[test]
fn discarded_constraint_falls_back_to_the_base_value() {
    let mut m = manager();
    add_connected(&mut m, 1, NodeId::ROOT);
    add_connected(&mut m, 2, NodeId::ROOT);
    bake_x(&mut m, 1, 3.0);
    m.queue(UpdateMessage::AddConstraint {
        id: ConstraintId(1),
        target: pos(2),
        sources: vec![pos(1)],
        function: Box::new(|_: &PropertyValue, inputs: &[PropertyValue]| inputs[0]),
        remove_action: RemoveAction::Discard,
    });
    m.update(DT).unwrap();
    m.queue(UpdateMessage::RemoveConstraint(ConstraintId(1)));
    m.update(DT).unwrap();
    m.update(DT).unwrap();
    assert_eq!(x(&m, 2), 0.0);
}

#[test]
fn duplicate_constraint_ids_are_rejected() {
    let mut m = manager();
    m.process_message(UpdateMessage::AddNode(NodeId(1))).unwrap();
    let add = || UpdateMessage::AddConstraint {
        id: ConstraintId(9),
        target: pos(1),
        sources: Vec::new(),
        function: Box::new(|current: &PropertyValue, _: &[PropertyValue]| *current),
        remove_action: RemoveAction::Discard,
    };
    m.process_message(add()).unwrap();
    assert!(matches!(
        m.process_message(add()),
        Err(TableauError::Validation(_))
    ));
}

#[test]
fn destroying_a_source_node_disconnects_the_constraint() {
    let mut m = manager();
    add_connected(&mut m, 1, NodeId::ROOT);
    add_connected(&mut m, 2, NodeId::ROOT);
    m.queue(UpdateMessage::AddConstraint {
        id: ConstraintId(1),
        target: pos(2),
        sources: vec![pos(1)],
        function: Box::new(|_: &PropertyValue, inputs: &[PropertyValue]| inputs[0]),
        remove_action: RemoveAction::Bake,
    });
    m.update(DT).unwrap();
    m.queue(UpdateMessage::DestroyNode(NodeId(1)));
    m.update(DT).unwrap();
    m.update(DT).unwrap();
    assert_eq!(m.node_count(), 2);
    assert!(m.current_value(pos(1)).is_err());
    assert_eq!(x(&m, 2), 0.0);
}

#[test]
fn animation_runs_to_completion_and_reports_once() {
    let mut m = manager();
    add_connected(&mut m, 1, NodeId::ROOT);
    let id = NotifyId(7);
    m.queue(UpdateMessage::AddAnimation {
        id,
        config: AnimationConfig {
            progress_marker: Some(0.25),
            ..AnimationConfig::default()
        },
    });
    m.queue(UpdateMessage::AddAnimator {
        animation: id,
        target: pos(1),
        to: PropertyValue::Vector3([10.0, 0.0, 0.0]),
        ease: Ease::Linear,
    });
    m.queue(UpdateMessage::PlayAnimation(id));

    let out = m.update(0.5).unwrap();
    assert!((x(&m, 1) - 5.0).abs() < 1e-4);
    assert_eq!(out.notifications, vec![Notification::AnimationProgressReached(id)]);

    let out = m.update(0.6).unwrap();
    assert_eq!(x(&m, 1), 10.0);
    assert_eq!(
        out.notifications,
        vec![Notification::AnimationsCompleted(vec![id])]
    );
    assert_eq!(m.animation_state(id), Some(AnimationState::Stopped));

    let out = m.update(DT).unwrap();
    assert!(out.notifications.is_empty());
    assert_eq!(x(&m, 1), 10.0);
}

#[test]
fn animator_kind_must_match_the_property() {
    let mut m = manager();
    m.process_message(UpdateMessage::AddNode(NodeId(1))).unwrap();
    m.process_message(UpdateMessage::AddAnimation {
        id: NotifyId(1),
        config: AnimationConfig::default(),
    })
    .unwrap();
    let err = m
        .process_message(UpdateMessage::AddAnimator {
            animation: NotifyId(1),
            target: pos(1),
            to: PropertyValue::Float(1.0),
            ease: Ease::Linear,
        })
        .unwrap_err();
    assert!(matches!(err, TableauError::Validation(_)));
    assert_eq!(m.resetter_count(), 0);
}

#[test]
fn stopping_reports_completion_and_destroy_releases_resetters() {
    let mut m = manager();
    add_connected(&mut m, 1, NodeId::ROOT);
    let id = NotifyId(3);
    m.queue(UpdateMessage::AddAnimation {
        id,
        config: AnimationConfig {
            duration: 10.0,
            ..AnimationConfig::default()
        },
    });
    m.queue(UpdateMessage::AddAnimator {
        animation: id,
        target: pos(1),
        to: PropertyValue::Vector3([10.0, 0.0, 0.0]),
        ease: Ease::Linear,
    });
    m.queue(UpdateMessage::PlayAnimation(id));
    m.update(1.0).unwrap();
    assert_eq!(m.resetter_count(), 1);

    m.queue(UpdateMessage::StopAnimation(id));
    let out = m.update(DT).unwrap();
    assert_eq!(
        out.notifications,
        vec![Notification::AnimationsCompleted(vec![id])]
    );

    m.queue(UpdateMessage::DestroyAnimation(id));
    m.update(DT).unwrap();
    m.update(DT).unwrap();
    assert_eq!(m.animation_count(), 0);
    assert_eq!(m.resetter_count(), 0);
}

struct Counting(Arc<AtomicUsize>);

impl FrameCallbackInterface for Counting {
    fn update(&mut self, proxy: &mut UpdateProxy<'_>, _elapsed_seconds: f32) -> bool {
        self.0.fetch_add(1, Ordering::SeqCst);
        proxy.set_position(NodeId(1), [2.0, 0.0, 0.0]);
        true
    }
}

#[test]
fn frame_callbacks_write_through_the_proxy_until_removed() {
    let mut m = manager();
    add_connected(&mut m, 1, NodeId::ROOT);
    let calls = Arc::new(AtomicUsize::new(0));
    let iface: SharedFrameCallbackInterface = Arc::new(Mutex::new(Counting(Arc::clone(&calls))));
    m.queue(UpdateMessage::AddFrameCallback {
        link: FrameCallbackLink::new(Arc::clone(&iface)),
        root: None,
    });

    let out = m.update(DT).unwrap();
    assert!(out.render.keep_rendering);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(x(&m, 1), 2.0);

    m.queue(UpdateMessage::RemoveFrameCallback(InterfaceId::of(&iface)));
    let out = m.update(DT).unwrap();
    assert!(!out.render.keep_rendering);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(m.frame_callback_count(), 0);
}

#[test]
fn property_notifications_report_validity_changes() {
    let mut m = manager();
    add_connected(&mut m, 1, NodeId::ROOT);
    let id = NotifyId(5);
    m.queue(UpdateMessage::AddPropertyNotification {
        id,
        target: pos(1),
        condition: NotifyCondition::GreaterThan(5.0),
        mode: NotifyMode::NotifyOnChanged,
    });
    bake_x(&mut m, 1, 6.0);
    let out = m.update(DT).unwrap();
    assert_eq!(
        out.notifications,
        vec![Notification::PropertyNotified { id, validity: true }]
    );

    assert!(m.update(DT).unwrap().notifications.is_empty());

    bake_x(&mut m, 1, 1.0);
    let out = m.update(DT).unwrap();
    assert_eq!(
        out.notifications,
        vec![Notification::PropertyNotified { id, validity: false }]
    );

    m.queue(UpdateMessage::RemovePropertyNotification(id));
    m.update(DT).unwrap();
    assert_eq!(m.property_notification_count(), 0);
}

#[test]
fn render_commands_and_frame_ids_are_forwarded_once() {
    let mut m = manager();
    m.queue(UpdateMessage::Render(RenderCommand::DestroyTexture {
        key: PoolKey::from_raw(0),
    }));
    m.queue(UpdateMessage::FrameRendered(FrameId(4)));
    m.queue(UpdateMessage::FramePresented(FrameId(4)));
    let out = m.update(DT).unwrap();
    assert_eq!(out.render.commands.len(), 1);
    assert_eq!(out.render.frame_rendered, vec![FrameId(4)]);
    assert_eq!(out.render.frame_presented, vec![FrameId(4)]);

    let out = m.update(DT).unwrap();
    assert!(out.render.commands.is_empty());
    assert!(out.render.frame_rendered.is_empty());
}
