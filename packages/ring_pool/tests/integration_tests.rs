//! Integration tests for the `ring_pool` package.
//!
//! These tests drive `RingPool` and `Slot` through the public API only, covering exhaustion,
//! overflow slots, tracing across threads and the background leak monitor.

use std::collections::HashSet;
use std::num::NonZero;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use ring_pool::{Error, Payload, RingPool, Slot};

/// A minimal packet buffer, standing in for whatever a pipeline would pool.
#[derive(Debug)]
struct Packet {
    content: Vec<u8>,
}

impl Packet {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            content: Vec::with_capacity(capacity),
        }
    }
}

impl Payload for Packet {
    fn reset(&mut self) {
        self.content.clear();
    }

    fn describe(&self) -> String {
        format!("content: {}", String::from_utf8_lossy(&self.content))
    }
}

fn packet_pool(capacity: usize) -> RingPool<Packet> {
    RingPool::new(NonZero::new(capacity).unwrap(), || Packet::with_capacity(100))
}

#[test]
fn exhaustion_scenario() {
    let pool = packet_pool(10);

    let held: Vec<_> = (0..10).map(|_| pool.allocate()).collect();
    assert_eq!(pool.available_count(), 0);

    let overflow = pool.allocate();
    assert_eq!(overflow.index(), 11);
    assert!(overflow.is_overflow());
    assert_eq!(pool.available_count(), 0);

    for slot in held {
        pool.release(slot);
    }
    assert_eq!(pool.available_count(), 10);

    pool.release(overflow);
    assert_eq!(pool.available_count(), 10);

    let stats = pool.stats();
    assert_eq!(stats.overflow_allocations, 1);
    assert_eq!(stats.discarded_releases, 1);
    assert_eq!(stats.outstanding, 0);
}

#[test]
fn available_count_is_capacity_minus_outstanding() {
    let pool = packet_pool(6);
    let mut held = Vec::new();

    // An arbitrary interleaving that never exceeds capacity.
    for step in [true, true, false, true, true, true, false, false, true, false, true, true] {
        if step {
            held.push(pool.allocate());
        } else if let Some(slot) = held.pop() {
            pool.release(slot);
        }

        assert_eq!(pool.available_count(), 6 - held.len());
        assert_eq!(pool.stats().outstanding, held.len());
    }

    for slot in held {
        pool.release(slot);
    }
    assert_eq!(pool.available_count(), 6);
}

#[test]
fn round_trips_restore_availability() {
    let pool = packet_pool(5);
    let _long_lived = pool.allocate();
    let before = pool.available_count();

    for _ in 0..before {
        let slot = pool.allocate();
        pool.release(slot);
    }

    assert_eq!(pool.available_count(), before);
}

#[test]
fn payload_is_cleared_between_uses() {
    let pool = packet_pool(1);

    let slot = pool.allocate();
    slot.payload().content.extend_from_slice(b"Hohoho");
    assert_eq!(slot.payload().describe(), "content: Hohoho");
    pool.release(slot);

    let slot = pool.allocate();
    assert!(slot.payload().content.is_empty());
    assert!(slot.payload().content.capacity() >= 100);
    pool.release(slot);
}

#[test]
fn trace_follows_slot_through_stages() {
    let pool = packet_pool(1);
    let slot = pool.allocate();

    let receive = slot.append_trace("receive");
    slot.mark_done(receive);
    slot.mark_channel_entry("decoder");
    slot.mark_channel_done().unwrap();
    slot.append_trace("forward");

    assert_eq!(
        slot.trace_labels(),
        vec!["receive✓", "(decoder)✓", "forward"]
    );

    let rendered = slot.render_trace();
    assert!(rendered.contains("receive✓"));
    assert!(rendered.contains("(decoder)✓"));
    assert!(rendered.contains("content: "));

    slot.print_trace();
    pool.release(slot);

    // The same ring slot comes back without its old trace.
    let slot = pool.allocate();
    assert_eq!(slot.index(), 0);
    assert!(slot.trace_labels().is_empty());
    pool.release(slot);
}

#[test]
fn channel_done_without_trace_fails() {
    let pool = packet_pool(1);
    let slot = pool.allocate();

    let error = slot.mark_channel_done().unwrap_err();

    assert!(matches!(error, Error::NoActiveTrace { slot_index: 0 }));
    pool.release(slot);
}

#[test]
fn overflow_slots_are_fully_usable() {
    let pool = packet_pool(1);
    let held = pool.allocate();

    let overflow = pool.allocate();
    overflow.payload().content.extend_from_slice(b"extra");
    let position = overflow.append_trace("spill");
    overflow.mark_done(position);

    assert!(overflow.is_allocated());
    assert_eq!(overflow.trace_labels(), vec!["spill✓"]);
    assert_eq!(overflow.payload().describe(), "content: extra");

    pool.release(overflow);
    pool.release(held);
    assert_eq!(pool.available_count(), 1);
}

#[cfg_attr(miri, ignore)]
#[test]
fn concurrent_allocation_yields_distinct_slots() {
    const CAPACITY: usize = 32;

    let pool = Arc::new(packet_pool(CAPACITY));
    let barrier = Arc::new(Barrier::new(CAPACITY));

    let handles: Vec<_> = (0..CAPACITY)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let barrier = Arc::clone(&barrier);

            thread::spawn(move || {
                barrier.wait();
                pool.allocate()
            })
        })
        .collect();

    let slots: Vec<Slot<Packet>> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    let indices: HashSet<_> = slots.iter().map(Slot::index).collect();
    assert_eq!(indices.len(), CAPACITY);
    assert!(indices.iter().all(|index| *index < CAPACITY));
    assert_eq!(pool.available_count(), 0);

    for slot in slots {
        pool.release(slot);
    }
    assert_eq!(pool.available_count(), CAPACITY);
}

#[cfg_attr(miri, ignore)]
#[test]
fn concurrent_churn_settles_to_full_ring() {
    const CAPACITY: usize = 8;
    const THREADS: usize = 4;
    const ITERATIONS: usize = 500;

    let pool = Arc::new(packet_pool(CAPACITY));

    let handles: Vec<_> = (0..THREADS)
        .map(|thread_index| {
            let pool = Arc::clone(&pool);

            thread::spawn(move || {
                for iteration in 0..ITERATIONS {
                    let first = pool.allocate();
                    let second = pool.allocate();

                    first.append_trace(format!("thread {thread_index} iteration {iteration}"));
                    second.payload().content.push(1);

                    pool.release(second);
                    pool.release(first);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let stats = pool.stats();
    assert_eq!(stats.available, CAPACITY);
    assert_eq!(stats.outstanding, 0);
}

#[cfg_attr(miri, ignore)]
#[test]
fn slot_can_travel_between_threads() {
    let pool = Arc::new(packet_pool(2));
    let slot = pool.allocate();
    slot.append_trace("producer");

    let pool_clone = Arc::clone(&pool);
    thread::spawn(move || {
        slot.mark_channel_entry("consumer");
        slot.mark_channel_done().unwrap();
        assert_eq!(slot.trace_labels(), vec!["producer", "(consumer)✓"]);
        pool_clone.release(slot);
    })
    .join()
    .unwrap();

    assert_eq!(pool.available_count(), 2);
}

#[cfg_attr(miri, ignore)]
#[test]
fn leak_monitor_reports_overdue_slots() {
    let pool = RingPool::builder(NonZero::new(4).unwrap(), || Packet::with_capacity(8))
        .leak_monitor(true)
        .leak_scan_interval(Duration::from_millis(5))
        .leak_threshold(Duration::from_millis(10))
        .build();

    let held = pool.allocate();
    held.append_trace("stuck stage");

    let deadline = Instant::now() + Duration::from_secs(10);
    while pool.stats().last_overdue == 0 {
        assert!(Instant::now() < deadline, "leak monitor never reported the held slot");
        thread::sleep(Duration::from_millis(5));
    }

    assert_eq!(pool.stats().last_overdue, 1);
    assert!(held.is_stale(Duration::from_millis(10)));

    pool.release(held);

    // Wait for a scan that starts after the release.
    let scans_after_release = pool.stats().leak_scans;
    while pool.stats().leak_scans < scans_after_release + 2 {
        assert!(Instant::now() < deadline, "leak monitor stopped scanning");
        thread::sleep(Duration::from_millis(5));
    }

    assert_eq!(pool.stats().last_overdue, 0);
}

#[cfg_attr(miri, ignore)]
#[test]
fn dropping_pool_stops_monitor_promptly() {
    let pool = RingPool::builder(NonZero::new(2).unwrap(), || Packet::with_capacity(8))
        .leak_monitor(true)
        .build();
    assert!(pool.is_monitored());

    let started = Instant::now();
    drop(pool);

    // The default interval is 5 seconds, the drop must not wait for it.
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn slot_outlives_its_pool() {
    let pool = packet_pool(1);
    let slot = pool.allocate();
    drop(pool);

    slot.append_trace("after pool");
    assert_eq!(slot.trace_labels(), vec!["after pool"]);
}
