//! Tests for the event pool

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::EventPool;

#[test]
fn test_capacity_invariant() {
    let pool = EventPool::new(4);
    assert_eq!(pool.free_events_count(), 4);

    let a = pool.get();
    let b = pool.get();
    assert_eq!(pool.in_use() + pool.free_events_count(), 4);
    assert_eq!(pool.in_use(), 2);

    pool.back(a);
    pool.back(b);
    assert_eq!(pool.free_events_count(), 4);
}

#[test]
fn test_seq_ids_are_assigned_at_checkout() {
    let pool = EventPool::new(2);

    let a = pool.get();
    let b = pool.get();
    assert_eq!(a.seq_id(), 1);
    assert_eq!(b.seq_id(), 2);

    // a recycled event gets a fresh id
    pool.back(a);
    let c = pool.get();
    assert_eq!(c.seq_id(), 3);
}

#[test]
fn test_get_blocks_until_back() {
    let pool = Arc::new(EventPool::new(1));
    let held = pool.get();

    let waiter = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || {
            let event = pool.get();
            event.seq_id()
        })
    };

    // the waiter should be parked on the drained pool
    thread::sleep(Duration::from_millis(50));
    assert!(!waiter.is_finished());

    pool.back(held);
    let seq = waiter.join().unwrap();
    assert_eq!(seq, 2);
}

#[test]
fn test_back_resets_event() {
    let pool = EventPool::new(1);

    let mut event = pool.get();
    event.root = serde_json::json!({"k": "v"});
    event.offset = 10;
    pool.back(event);

    let event = pool.get();
    assert_eq!(event.root, serde_json::Value::Null);
    assert_eq!(event.offset, 0);
}

#[test]
fn test_dump_mentions_fill() {
    let pool = EventPool::new(8);
    let _held = pool.get();

    let dump = pool.dump();
    assert!(dump.contains("capacity=8"));
    assert!(dump.contains("in use=1"));
}
