use super::*;

#[derive(Debug, Default, PartialEq)]
struct Payload {
    a: u64,
    b: u32,
}

#[test]
fn key_round_trips_through_value_address() {
    let mut pool = FixedSizeMemoryPool::<Payload>::new();
    let keys: Vec<_> = (0..100)
        .map(|i| pool.allocate_with(Payload { a: i, b: 0 }).unwrap())
        .collect();

    for key in keys {
        let value = pool.get(key).unwrap();
        assert_eq!(pool.key_of(value), Some(key));
    }
}

#[test]
fn key_of_rejects_foreign_values() {
    let mut pool = FixedSizeMemoryPool::<Payload>::new();
    pool.allocate().unwrap();
    let outside = Payload::default();
    assert_eq!(pool.key_of(&outside), None);
}

#[test]
fn blocks_double_from_initial_capacity() {
    let mut pool = FixedSizeMemoryPool::<u32>::new();
    pool.allocate().unwrap();
    assert_eq!(pool.capacity(), 32);
    assert_eq!(pool.block_count(), 1);

    for _ in 0..32 {
        pool.allocate().unwrap();
    }
    assert_eq!(pool.block_count(), 2);
    assert_eq!(pool.capacity(), 32 + 64);
}

#[test]
fn block_capacity_is_capped() {
    assert_eq!(next_block_capacity(0), 32);
    assert_eq!(next_block_capacity(15), MAX_BLOCK_CAPACITY as usize);
    assert_eq!(next_block_capacity(26), MAX_BLOCK_CAPACITY as usize);
}

#[test]
fn freed_slot_is_reused_without_touching_neighbours() {
    let mut pool = FixedSizeMemoryPool::<Payload>::new();
    let a = pool.allocate_with(Payload { a: 1, b: 1 }).unwrap();
    let b = pool.allocate_with(Payload { a: 2, b: 2 }).unwrap();
    let c = pool.allocate_with(Payload { a: 3, b: 3 }).unwrap();

    assert!(pool.destroy(b));
    let d = pool.allocate_with(Payload { a: 4, b: 4 }).unwrap();
    assert_eq!(d, b);

    assert_eq!(pool.get(a), Some(&Payload { a: 1, b: 1 }));
    assert_eq!(pool.get(c), Some(&Payload { a: 3, b: 3 }));
    assert_eq!(pool.get(d), Some(&Payload { a: 4, b: 4 }));
}

#[test]
fn free_hands_value_back_without_dropping() {
    let mut pool = FixedSizeMemoryPool::<String>::new();
    let key = pool.allocate_with("kept".to_string()).unwrap();
    assert_eq!(pool.free(key).as_deref(), Some("kept"));
    assert_eq!(pool.get(key), None);
    assert_eq!(pool.free(key), None);
}

#[test]
fn destroy_drops_value() {
    let marker = std::sync::Arc::new(());
    let mut pool = FixedSizeMemoryPool::new();
    let key = pool.allocate_with(std::sync::Arc::clone(&marker)).unwrap();
    assert_eq!(std::sync::Arc::strong_count(&marker), 2);
    assert!(pool.destroy(key));
    assert_eq!(std::sync::Arc::strong_count(&marker), 1);
    assert!(!pool.destroy(key));
}

#[test]
fn raw_allocation_is_filled_by_emplace() {
    let mut pool = FixedSizeMemoryPool::<Payload>::new();
    let key = pool.allocate_raw().unwrap();
    assert_eq!(pool.get(key), None);
    assert_eq!(pool.len(), 1);

    pool.emplace(key, Payload { a: 7, b: 8 }).unwrap();
    assert_eq!(pool.get(key).map(|p| p.a), Some(7));
    assert!(pool.emplace(key, Payload::default()).is_err());
}

#[test]
fn reset_discards_all_blocks() {
    let counters = PoolCounters::new();
    let mut pool = FixedSizeMemoryPool::<u8>::with_counters(counters.clone());
    for _ in 0..40 {
        pool.allocate().unwrap();
    }
    assert_eq!(counters.live(), 40);

    pool.reset();
    assert_eq!(pool.capacity(), 0);
    assert!(pool.is_empty());
    assert_eq!(counters.live(), 0);
    assert_eq!(counters.allocations(), 40);
}

#[test]
fn injected_counters_are_shared_between_pools() {
    let counters = PoolCounters::new();
    let mut a = FixedSizeMemoryPool::<u8>::with_counters(counters.clone());
    let b = SharedMemoryPool::<u8>::with_counters(counters.clone());

    let ka = a.allocate().unwrap();
    let kb = b.allocate_thread_safe().unwrap();
    assert_eq!(counters.live(), 2);

    a.destroy(ka);
    b.destroy_thread_safe(kb);
    assert_eq!(counters.live(), 0);
    assert_eq!(counters.releases(), 2);
}

#[test]
fn iteration_skips_vacant_and_reserved() {
    let mut pool = FixedSizeMemoryPool::<u32>::new();
    let a = pool.allocate_with(1).unwrap();
    let b = pool.allocate_with(2).unwrap();
    let _reserved = pool.allocate_raw().unwrap();
    pool.destroy(a);

    let live: Vec<_> = pool.iter().map(|(k, v)| (k, *v)).collect();
    assert_eq!(live, vec![(b, 2)]);

    for (_, v) in pool.iter_mut() {
        *v += 10;
    }
    assert_eq!(pool.get(b), Some(&12));
}

#[test]
fn thread_safe_entry_points_from_many_threads() {
    let pool = std::sync::Arc::new(SharedMemoryPool::<u64>::new());
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let pool = std::sync::Arc::clone(&pool);
            std::thread::spawn(move || {
                let mut keys = Vec::new();
                for i in 0..100 {
                    keys.push(pool.allocate_with_thread_safe(t * 1000 + i).unwrap());
                }
                for key in keys.iter().step_by(2) {
                    assert!(pool.destroy_thread_safe(*key));
                }
                keys.into_iter().skip(1).step_by(2).collect::<Vec<_>>()
            })
        })
        .collect();

    let survivors: Vec<PoolKey> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    let guard = pool.lock();
    assert_eq!(guard.len(), survivors.len());
    for key in survivors {
        assert!(guard.contains(key));
    }
}

#[test]
fn pool_key_debug_shows_block_and_entry() {
    let key = PoolKey::new(2, 5);
    assert_eq!(format!("{key:?}"), "PoolKey(2:5)");
    assert_eq!(PoolKey::from_raw(key.to_raw()), key);
}
