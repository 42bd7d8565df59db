//! hubos — cooperative event-dispatch kernel core for sensor hubs.
//!
//! A single dispatch context hosts statically registered apps, routes
//! events through two bounded queues, and exposes a syscall surface for
//! subscribing, enqueueing, deferring work and logging. Every mutation
//! of task/subscription state travels the internal queue, which is what
//! makes the producer paths safe from interrupt context without locks.
//!
//! The hardware collaborators (CPU bring-up, sensor manager, host
//! transport, app loader) sit behind the port traits in [`ports`]; the
//! [`adapters`] module satisfies them on a host so the whole kernel runs
//! and tests off-target.

#![deny(unused_must_use)]

pub mod adapters;
pub mod config;
pub mod error;
pub mod events;
pub mod kernel;
pub mod keys;
pub mod logging;
pub mod pool;
pub mod ports;
pub mod subs;
pub mod syscall;
pub mod task;

pub use error::{Error, Result};
pub use events::{EVT_APP_START, Event, EventData, EventPayload, FIRST_USER_EVENT};
pub use kernel::{Kernel, KernelHandle};
