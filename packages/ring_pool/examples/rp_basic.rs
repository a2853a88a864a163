//! Basic usage of the `ring_pool` crate:
//!
//! * Creating a pool with the leak monitor enabled.
//! * Allocating slots and tracing them through processing stages.
//! * Exhausting the pool to see an overflow slot.
//! * Holding a slot long enough for the leak monitor to report it.
//!
//! Run with `RUST_LOG=debug` to also see the monitor scans that found nothing.

use std::num::NonZero;
use std::thread;
use std::time::Duration;

use ring_pool::{Payload, RingPool};
use tracing_subscriber::EnvFilter;

/// A fixed-size byte buffer with a fill level, as a packet pipeline might use.
struct Frame {
    content: Vec<u8>,
    len: usize,
}

impl Frame {
    fn new(size: usize) -> Self {
        Self {
            content: vec![0; size],
            len: 0,
        }
    }

    fn set_content(&mut self, value: &str) {
        let bytes = value.as_bytes();
        let len = bytes.len().min(self.content.len());

        if let (Some(target), Some(source)) = (self.content.get_mut(..len), bytes.get(..len)) {
            target.copy_from_slice(source);
        }

        self.len = len;
    }
}

impl Payload for Frame {
    fn reset(&mut self) {
        self.len = 0;
    }

    fn describe(&self) -> String {
        let used = self.content.get(..self.len).unwrap_or_default();
        format!("content: {}", String::from_utf8_lossy(used))
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let frame_size = 100;
    let pool = RingPool::builder(NonZero::new(10).unwrap(), move || Frame::new(frame_size))
        .leak_monitor(true)
        .leak_scan_interval(Duration::from_secs(1))
        .leak_threshold(Duration::from_secs(2))
        .build();

    let slot = pool.allocate();
    println!("Available slots after allocating one: {}", pool.available_count());

    let ingress = slot.mark_channel_entry("ingress");
    slot.payload().set_content("Hohoho");
    slot.mark_done(ingress);
    slot.append_trace("parse");
    slot.print_trace();

    pool.release(slot);
    println!("Available slots after releasing it: {}", pool.available_count());

    // Exhaust the ring. The eleventh allocation is an overflow slot.
    let held: Vec<_> = (0..10).map(|_| pool.allocate()).collect();
    let overflow = pool.allocate();
    println!(
        "Overflow slot {} allocated, available slots: {}",
        overflow.index(),
        pool.available_count()
    );
    pool.release(overflow);

    for slot in held {
        pool.release(slot);
    }

    // Hold a slot past the leak threshold so the monitor reports it with its trace.
    let forgotten = pool.allocate();
    forgotten.mark_channel_entry("never-returned");
    forgotten.payload().set_content("stuck");

    thread::sleep(Duration::from_secs(4));

    println!("{:?}", pool.stats());
    pool.release(forgotten);
}
