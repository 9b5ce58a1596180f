use super::*;
use crate::event::core::{CoreChannels, CoreOptions};
use crate::update::node::{NodeId, node_property};

fn watch(core: &Core) -> PropertyNotification {
    PropertyNotification::new(
        core,
        NodeProperty::new(NodeId::ROOT, node_property::SIZE),
        NotifyCondition::Inside(0.0, 10.0),
        NotifyMode::NotifyOnTrue,
    )
    .unwrap()
}

fn kinds(channels: &CoreChannels) -> Vec<&'static str> {
    channels.messages.try_iter().map(|m| m.kind()).collect()
}

#[test]
fn handle_reports_its_settings() {
    let (core, channels) = Core::new(CoreOptions::default());
    kinds(&channels);
    let notification = watch(&core);
    assert_eq!(kinds(&channels), vec!["add_property_notification"]);
    assert_eq!(
        notification.target().unwrap(),
        NodeProperty::new(NodeId::ROOT, node_property::SIZE)
    );
    assert_eq!(
        notification.condition().unwrap(),
        NotifyCondition::Inside(0.0, 10.0)
    );
    assert_eq!(notification.mode().unwrap(), NotifyMode::NotifyOnTrue);
    assert!(!notification.validity().unwrap());
    assert_eq!(notification.notify_count(), 0);
}

#[test]
fn reports_reach_the_callbacks() {
    let (core, _channels) = Core::new(CoreOptions::default());
    let notification = watch(&core);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    notification
        .on_notify(move |valid| sink.lock().unwrap().push(valid))
        .unwrap();

    let id = notification.id().unwrap();
    let target = core
        .shared()
        .property_notifications()
        .notify_property(id, true)
        .unwrap();
    target.emit(true);
    assert_eq!(notification.notify_count(), 1);
    assert!(notification.validity().unwrap());
    assert_eq!(*seen.lock().unwrap(), vec![true]);
}

#[test]
fn dropping_the_last_clone_unregisters() {
    let (core, channels) = Core::new(CoreOptions::default());
    let notification = watch(&core);
    let id = notification.id().unwrap();
    let clone = notification.clone();
    drop(notification);
    assert_eq!(core.shared().property_notifications().len(), 1);

    kinds(&channels);
    drop(clone);
    assert_eq!(kinds(&channels), vec!["remove_property_notification"]);
    let mut manager = core.shared().property_notifications();
    assert!(manager.notify_property(id, true).is_none());
    assert!(manager.is_empty());
}

#[test]
fn empty_handle_is_rejected() {
    let notification = PropertyNotification::default();
    assert_eq!(notification.id(), None);
    assert_eq!(notification.notify_count(), 0);
    assert!(matches!(
        notification.on_notify(|_| {}),
        Err(TableauError::InvalidHandle(_))
    ));
    assert!(notification.validity().is_err());
}

#[test]
fn ids_are_unique_per_core() {
    let (core, _channels) = Core::new(CoreOptions::default());
    let a = watch(&core);
    let b = watch(&core);
    assert_ne!(a.id(), b.id());
}
