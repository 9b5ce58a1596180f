use super::*;

#[test]
fn ids_are_monotonic_and_start_at_one() {
    let mut mapper = NotifierMapper::<u32>::new();
    let a = Arc::new(1);
    let b = Arc::new(2);
    let ia = mapper.register(&a);
    let ib = mapper.register(&b);
    assert_eq!(ia, NotifyId(1));
    assert!(ib > ia);
}

#[test]
fn lookup_after_unregister_is_silent_none() {
    let mut mapper = NotifierMapper::<String>::new();
    let obj = Arc::new("owner".to_string());
    let id = mapper.register(&obj);
    assert_eq!(mapper.lookup(id).as_deref().map(String::as_str), Some("owner"));

    assert!(mapper.unregister(id));
    assert!(mapper.lookup(id).is_none());
    assert!(!mapper.unregister(id));
}

#[test]
fn dropped_target_is_pruned_on_lookup() {
    let mut mapper = NotifierMapper::<u32>::new();
    let obj = Arc::new(5);
    let id = mapper.register(&obj);
    drop(obj);

    assert!(mapper.contains(id));
    assert!(mapper.lookup(id).is_none());
    assert!(!mapper.contains(id));
}

#[test]
fn mapper_never_keeps_targets_alive() {
    let mut mapper = NotifierMapper::<u32>::new();
    let obj = Arc::new(1);
    mapper.register(&obj);
    assert_eq!(Arc::strong_count(&obj), 1);
}

#[test]
fn live_targets_follow_registration_order() {
    let mut mapper = NotifierMapper::<u32>::new();
    let a = Arc::new(10);
    let b = Arc::new(20);
    let c = Arc::new(30);
    mapper.register(&a);
    mapper.register(&b);
    mapper.register(&c);
    drop(b);

    let values: Vec<u32> = mapper.live_targets().map(|(_, t)| *t).collect();
    assert_eq!(values, vec![10, 30]);

    mapper.prune();
    assert_eq!(mapper.len(), 2);
}
