//! Unit tests for dispose_queue.rs

use std::sync::Arc;
use crate::backend::dispose_queue::DisposeQueue;

#[test]
fn test_new_queue_is_empty() {
    let queue: DisposeQueue<u32> = DisposeQueue::new();
    assert!(queue.is_empty());
    assert_eq!(queue.pending_len(), 0);
    assert_eq!(queue.in_flight_len(), 0);
}

#[test]
fn test_unsealed_items_are_never_retired() {
    let mut queue = DisposeQueue::new();
    queue.push(1);
    queue.push(2);

    assert!(queue.retire(u64::MAX).is_empty());
    assert_eq!(queue.pending_len(), 2);
}

#[test]
fn test_retire_only_at_or_after_sealed_value() {
    let mut queue = DisposeQueue::new();
    queue.push("staging");
    queue.seal(5);
    assert_eq!(queue.pending_len(), 0);
    assert_eq!(queue.in_flight_len(), 1);

    assert!(queue.retire(4).is_empty());
    assert_eq!(queue.in_flight_len(), 1);

    assert_eq!(queue.retire(5), vec!["staging"]);
    assert!(queue.is_empty());
}

#[test]
fn test_retire_in_submission_order() {
    let mut queue = DisposeQueue::new();
    queue.push(10);
    queue.seal(1);
    queue.push(20);
    queue.push(21);
    queue.seal(2);
    queue.push(30);
    queue.seal(3);

    assert_eq!(queue.retire(2), vec![10, 20, 21]);
    assert_eq!(queue.in_flight_len(), 1);
    assert_eq!(queue.retire(10), vec![30]);
}

#[test]
fn test_seal_without_pending_items_adds_no_batch() {
    let mut queue: DisposeQueue<u8> = DisposeQueue::new();
    queue.seal(1);
    assert!(queue.is_empty());
}

#[test]
fn test_retired_items_are_released() {
    let resource = Arc::new(());
    let mut queue = DisposeQueue::new();
    queue.push(Arc::clone(&resource));
    queue.seal(1);
    assert_eq!(Arc::strong_count(&resource), 2);

    drop(queue.retire(0));
    assert_eq!(Arc::strong_count(&resource), 2);

    drop(queue.retire(1));
    assert_eq!(Arc::strong_count(&resource), 1);
}

#[test]
fn test_drain_all_returns_sealed_and_pending() {
    let mut queue = DisposeQueue::new();
    queue.push(1);
    queue.seal(7);
    queue.push(2);

    let mut drained = queue.drain_all();
    drained.sort();
    assert_eq!(drained, vec![1, 2]);
    assert!(queue.is_empty());
}
