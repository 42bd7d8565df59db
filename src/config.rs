//! Compile-time kernel tunables.
//!
//! Every bound here sizes a static structure, so the values are consts
//! rather than runtime configuration. Together they fix the kernel's
//! worst-case RAM footprint at link time, which is what a tens-of-KB
//! sensor hub needs.

/// Maximum number of hosted apps. The task table never grows past this;
/// registration stops (with a log line) once it fills.
pub const MAX_TASKS: usize = 16;

/// Subscription entries stored inline in each task descriptor before the
/// set is promoted to a heap buffer. Most apps subscribe to a handful of
/// events, so the common case never touches the allocator.
pub const MAX_EMBEDDED_SUBS: usize = 6;

/// Capacity of the internal (self-originated) event queue. This queue
/// also carries every subscription/defer/private-event intent, so it is
/// the larger of the two.
pub const INTERNAL_EVTQ_CAP: usize = 512;

/// Capacity of the external queue drained by the host-interface driver.
pub const EXTERNAL_EVTQ_CAP: usize = 256;

/// Slots in the deferred-action pool. Bounds the number of outstanding
/// subscription/defer/private-event intents; producers get backpressure
/// (`false`) past this.
pub const DEFERRED_POOL_CAP: usize = 32;
