#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! This package provides [`RingPool`], a fixed-capacity pool of reusable objects arranged as a
//! circular buffer, intended for high-churn pipelines that would otherwise allocate and free a
//! short-lived buffer per packet or per request.
//!
//! Each pooled object is wrapped in a [`Slot`], which pairs a [`Payload`] with bookkeeping used
//! for diagnostics: when the slot was allocated and a trace of the processing stages it has
//! passed through. An optional background leak monitor periodically reports slots that have been
//! held for too long, together with their trace.
//!
//! # Features
//!
//! - **Fixed capacity**: All ring slots are created up front and reused indefinitely. Only the
//!   payload contents are reset between uses.
//! - **Total allocation**: [`RingPool::allocate()`] never blocks and never fails. When the ring is
//!   exhausted, an overflow slot is created outside the ring and a warning is logged.
//! - **Move-only handles**: [`RingPool::release()`] consumes the [`Slot`], so a released slot cannot
//!   be touched again by the caller.
//! - **Call-path tracing**: Slots record labelled trace entries as they travel through the
//!   pipeline, with warnings when two consecutive stages are too far apart.
//! - **Leak detection**: An opt-in background monitor reports overdue slots, stopped
//!   deterministically when the pool is dropped.
//!
//! # Example
//!
//! ```rust
//! use std::num::NonZero;
//!
//! use ring_pool::{Payload, RingPool};
//!
//! #[derive(Debug)]
//! struct Packet {
//!     bytes: Vec<u8>,
//! }
//!
//! impl Payload for Packet {
//!     fn reset(&mut self) {
//!         self.bytes.clear();
//!     }
//!
//!     fn describe(&self) -> String {
//!         format!("{} bytes", self.bytes.len())
//!     }
//! }
//!
//! let pool = RingPool::new(NonZero::new(4).unwrap(), || Packet {
//!     bytes: Vec::with_capacity(1500),
//! });
//!
//! let slot = pool.allocate();
//! let stage = slot.append_trace("decode");
//! slot.payload().bytes.extend_from_slice(b"hello");
//! slot.mark_done(stage);
//!
//! assert_eq!(pool.available_count(), 3);
//!
//! pool.release(slot);
//! assert_eq!(pool.available_count(), 4);
//! ```
//!
//! # Thread safety
//!
//! [`RingPool`] is thread-safe. All pool state is guarded by a single lock, held for the full
//! duration of every pool operation. Share the pool across threads by reference or via `Arc`.

mod builder;
mod constants;
mod error;
#[cfg(test)]
mod log_capture;
mod monitor;
mod payload;
mod pool;
mod slot;
mod stats;

pub use builder::*;
pub use error::*;
pub use payload::*;
pub use pool::*;
pub use slot::*;
pub use stats::*;
