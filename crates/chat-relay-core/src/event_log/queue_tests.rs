//! Tests for the bounded event queue.

use super::*;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_items_are_dequeued_in_fifo_order() {
    let queue = BoundedQueue::new(4);
    queue.try_enqueue("a").unwrap();
    queue.try_enqueue("b").unwrap();
    queue.try_enqueue("c").unwrap();

    assert_eq!(queue.dequeue_blocking(), Some("a"));
    assert_eq!(queue.dequeue_blocking(), Some("b"));
    assert_eq!(queue.dequeue_blocking(), Some("c"));
}

#[test]
fn test_try_enqueue_rejects_when_full() {
    let queue = BoundedQueue::new(2);
    assert!(queue.try_enqueue(1).is_ok());
    assert!(queue.try_enqueue(2).is_ok());

    assert_eq!(queue.try_enqueue(3), Err(EnqueueError::Full));

    queue.close_for_writes();
    assert_eq!(queue.dequeue_blocking(), Some(1));
    assert_eq!(queue.dequeue_blocking(), Some(2));
    assert_eq!(queue.dequeue_blocking(), None);
}

#[test]
fn test_space_is_reclaimed_after_dequeue() {
    let queue = BoundedQueue::new(1);
    queue.try_enqueue(1).unwrap();
    assert_eq!(queue.try_enqueue(2), Err(EnqueueError::Full));

    assert_eq!(queue.dequeue_blocking(), Some(1));
    assert!(queue.try_enqueue(2).is_ok());
}

#[test]
fn test_closed_queue_rejects_writes_but_drains_buffered_items() {
    let queue = BoundedQueue::new(3);
    queue.try_enqueue("kept").unwrap();
    queue.close_for_writes();

    assert_eq!(queue.try_enqueue("late"), Err(EnqueueError::Closed));
    assert_eq!(queue.dequeue_blocking(), Some("kept"));
    assert_eq!(queue.dequeue_blocking(), None);
}

#[test]
fn test_close_twice_is_harmless() {
    let queue = BoundedQueue::new(1);
    queue.close_for_writes();
    queue.close_for_writes();

    assert_eq!(queue.try_enqueue(1), Err(EnqueueError::Closed));
    assert_eq!(queue.dequeue_blocking(), None);
}

#[test]
fn test_close_wakes_blocked_consumers() {
    let queue: Arc<BoundedQueue<String>> = Arc::new(BoundedQueue::new(1));

    let consumers: Vec<_> = (0..3)
        .map(|_| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.dequeue_blocking())
        })
        .collect();

    thread::sleep(Duration::from_millis(50));
    queue.close_for_writes();

    for consumer in consumers {
        assert_eq!(consumer.join().unwrap(), None);
    }
}

#[test]
fn test_blocked_consumer_receives_later_item() {
    let queue: Arc<BoundedQueue<u32>> = Arc::new(BoundedQueue::new(1));
    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.dequeue_blocking())
    };

    thread::sleep(Duration::from_millis(20));
    queue.try_enqueue(42).unwrap();

    assert_eq!(consumer.join().unwrap(), Some(42));
}

#[test]
fn test_every_item_is_consumed_exactly_once() {
    let queue: Arc<BoundedQueue<usize>> = Arc::new(BoundedQueue::new(1000));
    for i in 0..1000 {
        queue.try_enqueue(i).unwrap();
    }
    queue.close_for_writes();

    let consumers: Vec<_> = (0..4)
        .map(|_| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut seen = Vec::new();
                while let Some(item) = queue.dequeue_blocking() {
                    seen.push(item);
                }
                seen
            })
        })
        .collect();

    let mut all: Vec<usize> = consumers
        .into_iter()
        .flat_map(|c| c.join().unwrap())
        .collect();
    all.sort_unstable();

    assert_eq!(all, (0..1000).collect::<Vec<_>>());
}
